//! Turns one URL token into local asset files.
//!
//! The resolver owns everything a token needs: classification inputs, the
//! HTTP transport, the cloud API endpoint and the assets directory.

use anyhow::Context;
use url::Url;

use crate::classify::{classify, CloudHost, UrlKind, UrlToken};
use crate::cloud::CloudDiskClient;
use crate::config::SheetgrabConfig;
use crate::error::ResolveError;
use crate::extensions::AssetExtensions;
use crate::http::Fetch;
use crate::storage::AssetStore;
use crate::url_model::{asset_filename, filename_from_url, last_segment, DEFAULT_FILENAME};

/// Stored filenames in resolution order, or why nothing was stored.
pub type DownloadOutcome = Result<Vec<String>, ResolveError>;

pub struct UrlResolver {
    fetch: Box<dyn Fetch>,
    host: CloudHost,
    api_url: Url,
    extensions: AssetExtensions,
    store: AssetStore,
}

impl UrlResolver {
    pub fn new(
        fetch: Box<dyn Fetch>,
        host: CloudHost,
        api_url: Url,
        extensions: AssetExtensions,
        store: AssetStore,
    ) -> Self {
        Self {
            fetch,
            host,
            api_url,
            extensions,
            store,
        }
    }

    /// Builds a resolver writing into `cfg.assets_dir()` with the default extension set.
    pub fn from_config(fetch: Box<dyn Fetch>, cfg: &SheetgrabConfig) -> anyhow::Result<Self> {
        let api_url = Url::parse(&cfg.cloud.api_url)
            .with_context(|| format!("invalid cloud api_url {:?}", cfg.cloud.api_url))?;
        Ok(Self::new(
            fetch,
            CloudHost::new(&cfg.cloud.public_url),
            api_url,
            AssetExtensions::default(),
            AssetStore::new(cfg.assets_dir(), cfg.collision),
        ))
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    pub fn classify(&self, token: &UrlToken) -> UrlKind {
        classify(token, &self.host, &self.extensions)
    }

    /// Resolves one token. Unrecognized tokens fail without any network call.
    pub fn resolve(&self, token: &UrlToken) -> DownloadOutcome {
        let kind = self.classify(token);
        tracing::debug!(token = %token, ?kind, "classified token");

        let cloud = CloudDiskClient::new(&self.api_url, self.fetch.as_ref());
        let names = match kind {
            UrlKind::DirectAsset => vec![self.download_direct(token.as_str())?],
            UrlKind::CloudSingleFile { public_key } => {
                vec![cloud.resolve_single_file(&public_key, None, &self.store)?]
            }
            UrlKind::CloudFileInFolder { public_key, path } => {
                vec![cloud.resolve_single_file(&public_key, Some(&path), &self.store)?]
            }
            UrlKind::CloudFolder { public_key } => {
                cloud.resolve_folder(&public_key, &self.extensions, &self.store)?
            }
            UrlKind::Unrecognized => return Err(ResolveError::UnrecognizedUrl),
        };

        for name in &names {
            tracing::info!(token = %token, file = %name, "saved asset");
        }
        Ok(names)
    }

    fn download_direct(&self, url: &str) -> Result<String, ResolveError> {
        // Without an allowed extension in the path, the query usually names the file.
        let raw = filename_from_url(url)
            .filter(|name| self.extensions.ends(name))
            .or_else(|| last_segment(url))
            .unwrap_or_else(|| DEFAULT_FILENAME.to_string());
        let name = asset_filename(&raw);
        let bytes = self.fetch.get_ok(url)?;
        Ok(self.store.save(&name, &bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::tests::zip_bytes;
    use crate::config::CollisionPolicy;
    use crate::http::testing::FakeFetcher;
    use crate::retry::FetchError;
    use std::rc::Rc;

    const API: &str = "http://api.test/download";

    /// Shares one fake between the resolver and the test body.
    struct Shared(Rc<FakeFetcher>);

    impl Fetch for Shared {
        fn get(&self, url: &str) -> Result<crate::http::HttpResponse, FetchError> {
            self.0.get(url)
        }
    }

    fn resolver(fetch: FakeFetcher, dir: &std::path::Path) -> (UrlResolver, Rc<FakeFetcher>) {
        let fetch = Rc::new(fetch);
        let resolver = UrlResolver::new(
            Box::new(Shared(Rc::clone(&fetch))),
            CloudHost::default(),
            Url::parse(API).unwrap(),
            AssetExtensions::default(),
            AssetStore::new(dir, CollisionPolicy::HashSuffix),
        );
        (resolver, fetch)
    }

    #[test]
    fn direct_asset_is_saved_byte_exact() {
        let dir = tempfile::tempdir().unwrap();
        let body: Vec<u8> = (0u8..=255).collect();
        let (r, _) = resolver(
            FakeFetcher::new().route("https://example.com/", 200, body.clone()),
            dir.path(),
        );
        let names = r
            .resolve(&UrlToken::decode("https://example.com/images/Photo%20Final.PNG"))
            .unwrap();
        assert_eq!(names, vec!["Photo_Final.PNG"]);
        assert_eq!(std::fs::read(dir.path().join("Photo_Final.PNG")).unwrap(), body);
    }

    #[test]
    fn direct_asset_http_error_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (r, _) = resolver(
            FakeFetcher::new().route("https://example.com/", 404, "missing"),
            dir.path(),
        );
        let err = r
            .resolve(&UrlToken::decode("https://example.com/a.png"))
            .unwrap_err();
        assert!(matches!(err, ResolveError::Transport(FetchError::Http(404))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn direct_asset_named_by_query_when_path_has_no_extension() {
        let dir = tempfile::tempdir().unwrap();
        let (r, _) = resolver(
            FakeFetcher::new().route("https://example.com/", 200, "pdf"),
            dir.path(),
        );
        let names = r
            .resolve(&UrlToken::decode("https://example.com/get?file=scan.pdf"))
            .unwrap();
        assert_eq!(names, vec!["get_file_scan.pdf"]);

        let names = r
            .resolve(&UrlToken::decode("https://example.com/img/a.png?size=large"))
            .unwrap();
        assert_eq!(names, vec!["a.png"]);
    }

    #[test]
    fn unrecognized_makes_no_request() {
        let dir = tempfile::tempdir().unwrap();
        let (r, fetch) = resolver(FakeFetcher::new(), dir.path());
        let err = r.resolve(&UrlToken::decode("not a url")).unwrap_err();
        assert!(matches!(err, ResolveError::UnrecognizedUrl));
        assert_eq!(fetch.request_count(), 0);
    }

    #[test]
    fn file_in_folder_passes_path_to_api() {
        let dir = tempfile::tempdir().unwrap();
        let (r, fetch) = resolver(
            FakeFetcher::new()
                .route(API, 200, r#"{"href":"http://dl.test/get?filename=cover.png"}"#)
                .route("http://dl.test/", 200, "img"),
            dir.path(),
        );
        let names = r
            .resolve(&UrlToken::decode("https://disk.yandex.ru/d/Fold/art/cover.png"))
            .unwrap();
        assert_eq!(names, vec!["cover.png"]);
        let requests = fetch.requests.borrow();
        assert_eq!(
            requests[0],
            "http://api.test/download?public_key=https%3A%2F%2Fdisk.yandex.ru%2Fd%2FFold&path=%2Fart%2Fcover.png"
        );
        assert_eq!(requests[1], "http://dl.test/get?filename=cover.png");
    }

    #[test]
    fn folder_returns_all_bundle_names() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = zip_bytes(&[("F/1.png", b"1"), ("F/2.bmp", b"2")]);
        let (r, _) = resolver(
            FakeFetcher::new()
                .route(API, 200, r#"{"href":"http://dl.test/zip"}"#)
                .route("http://dl.test/zip", 200, bundle),
            dir.path(),
        );
        let names = r
            .resolve(&UrlToken::decode("https://disk.yandex.ru/d/F"))
            .unwrap();
        assert_eq!(names, vec!["1.png", "2.bmp"]);
    }

    #[test]
    fn from_config_rejects_bad_api_url() {
        let mut cfg = SheetgrabConfig::default();
        cfg.cloud.api_url = "not a url".to_string();
        assert!(UrlResolver::from_config(Box::new(FakeFetcher::new()), &cfg).is_err());
    }

    #[test]
    fn from_config_uses_assets_dir() {
        let mut cfg = SheetgrabConfig::default();
        cfg.output_dir = "out".into();
        let r = UrlResolver::from_config(Box::new(FakeFetcher::new()), &cfg).unwrap();
        assert_eq!(r.store().dir(), std::path::Path::new("out/images"));
    }
}
