use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Global configuration loaded from `~/.config/jobrun/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobrunConfig {
    /// Maximum number of concurrently executing jobs per runner.
    pub max_concurrent: usize,
    /// Base URL of the search feed queried by the fetch helper.
    pub search_feed_url: String,
    /// Upper bound for the `max` field of a search request.
    pub search_max_results: usize,
    /// Connection timeout for fetch requests, in seconds. Too long and the
    /// caller waits forever for feedback; too short and bad networks fail.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout for fetch requests, in seconds.
    pub request_timeout_secs: u64,
    /// Connection attempts per fetch request, including the first.
    pub network_retry: u32,
}

impl Default for JobrunConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            search_feed_url: "https://feeds.example.org/api/search".to_string(),
            search_max_results: 25,
            connect_timeout_secs: 5,
            request_timeout_secs: 30,
            network_retry: 3,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("jobrun")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<JobrunConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = JobrunConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}

/// Load configuration from an explicit path.
pub fn load_from(path: &Path) -> Result<JobrunConfig> {
    let data = fs::read_to_string(path)?;
    let cfg: JobrunConfig = toml::from_str(&data)?;
    Ok(cfg)
}
