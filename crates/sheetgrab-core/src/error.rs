//! Why a URL token could not be turned into local assets.

use thiserror::Error;

use crate::retry::FetchError;

/// Failure to resolve one token. Always recoverable: the token is logged and
/// dropped, processing continues with the next one.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The cloud API reported an error in its metadata response.
    #[error("cloud API error for {key}: {message}")]
    RemoteApi { key: String, message: String },

    /// The token matched no classification rule.
    #[error("unknown URL type")]
    UnrecognizedUrl,

    /// A folder bundle contained no entry with an allowed extension.
    #[error("folder bundle has no matching files")]
    EmptyBundle,

    /// Connection failure or unexpected HTTP status.
    #[error("request failed: {0}")]
    Transport(#[from] FetchError),

    /// The cloud API answered with something we cannot use.
    #[error("unexpected API response: {0}")]
    InvalidResponse(String),

    /// The folder bundle is not a readable ZIP archive.
    #[error("bad folder bundle: {0}")]
    Bundle(#[from] zip::result::ZipError),

    /// Writing into the assets directory failed.
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}
