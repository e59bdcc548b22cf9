//! Cloud disk public-resource client.
//!
//! Turns a public link (optionally plus a path inside a public folder) into a
//! direct download link via the resource-resolution endpoint, then fetches
//! the file, or the folder as a ZIP bundle.

mod parse;

use url::Url;

use crate::bundle;
use crate::error::ResolveError;
use crate::extensions::AssetExtensions;
use crate::http::Fetch;
use crate::retry::FetchError;
use crate::storage::AssetStore;
use crate::url_model::{asset_filename, base_name};

use parse::ApiReply;

/// Default resource-resolution endpoint.
pub const DEFAULT_API_URL: &str = "https://cloud-api.yandex.net/v1/disk/public/resources/download";

/// Client for the public resources API. Borrows the transport for one resolution.
pub struct CloudDiskClient<'a> {
    api_url: &'a Url,
    fetch: &'a dyn Fetch,
}

impl<'a> CloudDiskClient<'a> {
    pub fn new(api_url: &'a Url, fetch: &'a dyn Fetch) -> Self {
        Self { api_url, fetch }
    }

    /// Asks the API for the direct download link of `public_key` (and `path` inside it).
    pub fn resource_link(&self, public_key: &str, path: Option<&str>) -> Result<String, ResolveError> {
        let mut request = self.api_url.clone();
        {
            let mut query = request.query_pairs_mut();
            query.append_pair("public_key", public_key);
            if let Some(path) = path {
                query.append_pair("path", path);
            }
        }

        let response = self.fetch.get(request.as_str())?;
        match parse::parse_reply(&response.body) {
            Ok(ApiReply::Error { message }) => Err(ResolveError::RemoteApi {
                key: public_key.to_string(),
                message,
            }),
            Ok(ApiReply::Link(href)) if response.is_success() => Ok(href),
            Ok(ApiReply::Link(_)) => Err(FetchError::Http(response.status).into()),
            Err(_) if !response.is_success() => Err(FetchError::Http(response.status).into()),
            Err(reason) => Err(ResolveError::InvalidResponse(reason)),
        }
    }

    /// Downloads one public file (or a file inside a public folder) into `store`.
    ///
    /// The stored name comes from the `filename` field of the download link,
    /// falling back to the base name of `path`.
    pub fn resolve_single_file(
        &self,
        public_key: &str,
        path: Option<&str>,
        store: &AssetStore,
    ) -> Result<String, ResolveError> {
        let href = self.resource_link(public_key, path)?;
        let raw_name = parse::filename_from_href(&href)
            .or_else(|| {
                path.map(base_name)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
            })
            .ok_or_else(|| {
                ResolveError::InvalidResponse("download link carries no filename".to_string())
            })?;

        let bytes = self.fetch.get_ok(&href)?;
        let stored = store.save(&asset_filename(&raw_name), &bytes)?;
        Ok(stored)
    }

    /// Downloads a public folder as a bundle and extracts its assets into `store`.
    pub fn resolve_folder(
        &self,
        public_key: &str,
        extensions: &AssetExtensions,
        store: &AssetStore,
    ) -> Result<Vec<String>, ResolveError> {
        let href = self.resource_link(public_key, None)?;
        let bundle = self.fetch.get_ok(&href)?;
        tracing::debug!(public_key, bytes = bundle.len(), "fetched folder bundle");
        bundle::extract(&bundle, extensions, store)
    }
}
