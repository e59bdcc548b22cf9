//! Blocking HTTP GET used for cloud API calls and asset downloads.
//!
//! The resolver only depends on the [`Fetch`] trait; [`CurlFetcher`] is the
//! libcurl implementation used by the binary.

mod curl_fetcher;

pub use curl_fetcher::CurlFetcher;

use crate::retry::FetchError;

/// Status and body of a completed GET.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u32,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs GET requests. Implementations follow redirects.
pub trait Fetch {
    /// Returns the response whatever its status; only transport failures are errors.
    fn get(&self, url: &str) -> Result<HttpResponse, FetchError>;

    /// Returns the body of a 2xx response; other statuses become [`FetchError::Http`].
    fn get_ok(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.get(url)?;
        if !response.is_success() {
            return Err(FetchError::Http(response.status));
        }
        Ok(response.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(u32);

    impl Fetch for Fixed {
        fn get(&self, _url: &str) -> Result<HttpResponse, FetchError> {
            Ok(HttpResponse {
                status: self.0,
                body: b"body".to_vec(),
            })
        }
    }

    #[test]
    fn get_ok_returns_body_on_2xx() {
        assert_eq!(Fixed(200).get_ok("x").unwrap(), b"body");
        assert_eq!(Fixed(204).get_ok("x").unwrap(), b"body");
    }

    #[test]
    fn get_ok_rejects_other_status() {
        assert!(matches!(Fixed(404).get_ok("x"), Err(FetchError::Http(404))));
        assert!(matches!(Fixed(302).get_ok("x"), Err(FetchError::Http(302))));
    }
}
