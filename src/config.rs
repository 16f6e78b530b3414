use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const BASE_URL_VAR: &str = "MATHMENTOR_BASE_URL";
pub const DATA_DIR_VAR: &str = "MATHMENTOR_DATA_DIR";
pub const REDIRECT_DELAY_VAR: &str = "MATHMENTOR_REDIRECT_DELAY_MS";

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_REDIRECT_DELAY_MS: u64 = 2000;

/// Runtime settings for the client, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend origin, without a trailing slash.
    pub base_url: String,
    /// Where the local settings database lives.
    pub data_dir: PathBuf,
    /// Pause between a successful login/registration message and the redirect.
    pub redirect_delay: Duration,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source; unset and blank values
    /// take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let base_url = var(BASE_URL_VAR)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            anyhow::bail!("{} must be an http(s) URL, got '{}'", BASE_URL_VAR, base_url);
        }

        let data_dir = match var(DATA_DIR_VAR) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_local_dir()
                .context("Failed to resolve the local data directory")?
                .join("mathmentor"),
        };

        let redirect_delay = match var(REDIRECT_DELAY_VAR) {
            Some(ms) => Duration::from_millis(ms.trim().parse().with_context(|| {
                format!("{} must be a number of milliseconds, got '{}'", REDIRECT_DELAY_VAR, ms)
            })?),
            None => Duration::from_millis(DEFAULT_REDIRECT_DELAY_MS),
        };

        log::debug!("Using backend {} and data dir {}", base_url, data_dir.display());
        Ok(Self {
            base_url,
            data_dir,
            redirect_delay,
        })
    }
}
