//! Retry and backoff policy for HTTP fetches.
//!
//! Classifies transport faults and HTTP statuses (timeouts, throttling,
//! connection failures) and computes exponential backoff so that the cloud
//! API client and the asset downloader share one policy.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use error::FetchError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
