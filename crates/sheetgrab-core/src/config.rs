use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::classify::DEFAULT_PUBLIC_URL;
use crate::cloud::DEFAULT_API_URL;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per request (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 0.5,
            max_delay_secs: 10,
        }
    }
}

/// HTTP timeouts applied to every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    /// Upper bound for a whole request, body included.
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 15,
            timeout_secs: 300,
        }
    }
}

/// Cloud disk endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Host prefix of public links (`<public_url>/i/...`, `<public_url>/d/...`).
    pub public_url: String,
    /// Resource-resolution endpoint returning a direct download link.
    pub api_url: String,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            public_url: DEFAULT_PUBLIC_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

/// What to do when a stored asset name is already taken by different content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    /// Replace the existing file.
    Overwrite,
    /// Keep both: the new asset gets a short content-hash suffix.
    #[default]
    HashSuffix,
}

/// Global configuration loaded from `~/.config/sheetgrab/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetgrabConfig {
    /// Directory scanned for input workbooks.
    pub input_dir: PathBuf,
    /// Directory receiving rewritten workbooks.
    pub output_dir: PathBuf,
    /// Name of the assets directory inside `output_dir`.
    pub assets_dir_name: String,
    /// Save a checkpoint of the workbook after every N rewritten cells (None = save once at the end).
    #[serde(default)]
    pub checkpoint_every: Option<usize>,
    #[serde(default)]
    pub collision: CollisionPolicy,
    #[serde(default)]
    pub http: HttpConfig,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub cloud: CloudConfig,
}

impl Default for SheetgrabConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("result"),
            assets_dir_name: "images".to_string(),
            checkpoint_every: None,
            collision: CollisionPolicy::default(),
            http: HttpConfig::default(),
            retry: None,
            cloud: CloudConfig::default(),
        }
    }
}

impl SheetgrabConfig {
    /// Directory that downloaded assets are written to.
    pub fn assets_dir(&self) -> PathBuf {
        self.output_dir.join(&self.assets_dir_name)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("sheetgrab")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<SheetgrabConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = SheetgrabConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: SheetgrabConfig = toml::from_str(&data)?;
    Ok(cfg)
}
