pub mod config;
pub mod logging;

pub mod bundle;
pub mod checksum;
pub mod classify;
pub mod cloud;
pub mod error;
pub mod extensions;
pub mod http;
pub mod pipeline;
pub mod resolver;
pub mod retry;
pub mod rewrite;
pub mod storage;
pub mod url_model;
pub mod workbook;
