//! libcurl-backed [`Fetch`] implementation.

use std::time::Duration;

use super::{Fetch, HttpResponse};
use crate::config::HttpConfig;
use crate::retry::{classify_http_status, run_with_retry, FetchError, RetryPolicy};

const MAX_REDIRECTIONS: u32 = 10;
const USER_AGENT: &str = concat!("sheetgrab/", env!("CARGO_PKG_VERSION"));

/// Single-stream GET over a libcurl Easy handle. Runs in the calling thread.
#[derive(Debug, Clone)]
pub struct CurlFetcher {
    connect_timeout: Duration,
    timeout: Duration,
    retry: RetryPolicy,
}

impl Default for CurlFetcher {
    fn default() -> Self {
        Self::new(&HttpConfig::default(), RetryPolicy::default())
    }
}

impl CurlFetcher {
    pub fn new(http: &HttpConfig, retry: RetryPolicy) -> Self {
        Self {
            connect_timeout: Duration::from_secs(http.connect_timeout_secs),
            timeout: Duration::from_secs(http.timeout_secs),
            retry,
        }
    }

    fn get_once(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let mut body = Vec::new();

        // Tokens are percent-decoded; re-encode spaces and non-ASCII for the wire.
        let wire_url = url::Url::parse(url)
            .map(String::from)
            .unwrap_or_else(|_| url.to_string());

        let mut easy = curl::easy::Easy::new();
        easy.url(&wire_url)?;
        easy.follow_location(true)?;
        easy.max_redirections(MAX_REDIRECTIONS)?;
        easy.useragent(USER_AGENT)?;
        easy.connect_timeout(self.connect_timeout)?;
        easy.timeout(self.timeout)?;

        {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform()?;
        }

        let status = easy.response_code()?;
        tracing::debug!(url, status, bytes = body.len(), "GET finished");
        Ok(HttpResponse { status, body })
    }
}

impl Fetch for CurlFetcher {
    /// Retries transport faults, 429/503 and 5xx; other statuses are returned as-is.
    fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        run_with_retry(&self.retry, || {
            let response = self.get_once(url)?;
            if classify_http_status(response.status).is_transient() {
                return Err(FetchError::Http(response.status));
            }
            Ok(response)
        })
    }
}
