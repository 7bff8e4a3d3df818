use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TMDB_BASE: &str = "https://api.themoviedb.org/3";
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_BIND: &str = "0.0.0.0:3147";
const DEFAULT_DEBOUNCE_MS: u64 = 300;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub tmdb_base: String,
    pub data_dir: PathBuf,
    pub bind: SocketAddr,
    pub debounce: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("TMDB_API_KEY").ok_or(ConfigError::Missing("TMDB_API_KEY"))?;
        let tmdb_base = get("TMDB_BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_TMDB_BASE.to_string());
        let data_dir = get("CINEFAV_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let bind_raw = get("CINEFAV_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw
            .parse()
            .map_err(|_| ConfigError::Invalid("CINEFAV_BIND", bind_raw.clone()))?;
        let debounce_ms = match get("CINEFAV_DEBOUNCE_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::Invalid("CINEFAV_DEBOUNCE_MS", raw.clone()))?,
            None => DEFAULT_DEBOUNCE_MS,
        };

        Ok(Self {
            api_key,
            tmdb_base,
            data_dir,
            bind,
            debounce: Duration::from_millis(debounce_ms),
        })
    }
}
