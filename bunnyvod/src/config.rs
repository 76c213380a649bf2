use std::path::{Path, PathBuf};
use std::time::Duration;

use dirs::{config_dir, home_dir, video_dir};
use serde::Deserialize;
use tokio::fs;
use tracing::debug;

use crate::error::{Error, Result};

const CONFIG_FILE: &str = "bunnyvod/config.toml";
const DEFAULT_SUBDIR: &str = "Bunny CDN";
pub const DEFAULT_REFERER: &str = "https://iframe.mediadelivery.net/";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    pub binary: String,
    pub concurrent_fragments: u32,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        FetcherConfig {
            binary: "yt-dlp".to_string(),
            concurrent_fragments: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output_dir: Option<PathBuf>,
    pub referer: String,
    pub request_timeout_secs: u64,
    /// Space the warm-up pings 4s apart like a real player. Turning it off
    /// makes negotiation about 30s faster but looks less like playback.
    pub pace_warmup: bool,
    pub use_fzf: bool,
    pub fetcher: FetcherConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            output_dir: None,
            referer: DEFAULT_REFERER.to_string(),
            request_timeout_secs: 10,
            pace_warmup: true,
            use_fzf: false,
            fetcher: FetcherConfig::default(),
        }
    }
}

impl Config {
    /// Load `explicit`, or the per-user config file when it exists.
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match config_dir().map(|dir| dir.join(CONFIG_FILE)) {
                Some(path) if path.exists() => path,
                _ => return Ok(Config::default()),
            },
        };
        debug!("Reading config from {:?}", path);
        let raw = fs::read_to_string(&path)
            .await
            .map_err(|e| Error::Config(format!("can't read {}: {}", path.display(), e)))?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Configured directory, or `~/Videos/Bunny CDN`.
    pub fn output_dir(&self) -> PathBuf {
        match &self.output_dir {
            Some(dir) => expand_home(dir),
            None => default_output_dir(),
        }
    }
}

pub fn default_output_dir() -> PathBuf {
    video_dir()
        .or_else(|| home_dir().map(|home| home.join("Videos")))
        .unwrap_or_else(|| PathBuf::from("Videos"))
        .join(DEFAULT_SUBDIR)
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
