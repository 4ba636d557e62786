use log::{info, warn};
use std::{env, fmt::Display, path::PathBuf, str::FromStr};
use thiserror::Error;

/// The cookie policy refuses shorter keys.
pub const MIN_COOKIE_KEY_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {key} value: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    /// `None` runs on a temporary database.
    pub db_path: Option<PathBuf>,
    pub cookie_key: Vec<u8>,
    pub secure_cookie: bool,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cookie_key = match lookup("MOVIESHELF_COOKIE_KEY") {
            Some(key) if key.len() >= MIN_COOKIE_KEY_LEN => key.into_bytes(),
            Some(key) => {
                return Err(ConfigError::Invalid {
                    key: "MOVIESHELF_COOKIE_KEY",
                    message: format!(
                        "need at least {} bytes, got {}",
                        MIN_COOKIE_KEY_LEN,
                        key.len()
                    ),
                })
            }
            None => {
                warn!("MOVIESHELF_COOKIE_KEY not set, sessions use an all-zero key");
                vec![0u8; MIN_COOKIE_KEY_LEN]
            }
        };
        Ok(Config {
            bind: try_load(&lookup, "MOVIESHELF_BIND", "127.0.0.1:8080")?,
            db_path: lookup("MOVIESHELF_DB").map(PathBuf::from),
            cookie_key,
            secure_cookie: try_load(&lookup, "MOVIESHELF_SECURE_COOKIE", "false")?,
        })
    }

    pub fn open_db(&self) -> sled::Result<sled::Db> {
        match &self.db_path {
            Some(path) => {
                info!("opening database at {}", path.display());
                sled::open(path)
            }
            None => {
                info!("MOVIESHELF_DB not set, using a temporary database");
                sled::Config::new().temporary(true).open()
            }
        }
    }
}

fn try_load<F, T>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    lookup(key)
        .unwrap_or_else(|| {
            info!("{} not set, using default: {}", key, default);
            default.to_owned()
        })
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: e.to_string(),
        })
}
