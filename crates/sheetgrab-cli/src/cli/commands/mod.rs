//! CLI command handlers. Each command is in its own file.

mod checksum;
mod normalize;
mod resolve;
mod run;

pub use checksum::run_checksum;
pub use normalize::run_normalize;
pub use resolve::run_resolve;
pub use run::{run_pipeline, RunOverrides};

use sheetgrab_core::config::SheetgrabConfig;
use sheetgrab_core::http::CurlFetcher;
use sheetgrab_core::retry::RetryPolicy;

/// libcurl transport configured from the `[http]` and `[retry]` sections.
fn fetcher(cfg: &SheetgrabConfig) -> CurlFetcher {
    let retry = cfg
        .retry
        .as_ref()
        .map(RetryPolicy::from)
        .unwrap_or_default();
    CurlFetcher::new(&cfg.http, retry)
}
