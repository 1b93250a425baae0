//! Server configuration.
//!
//! Read from the environment after `.env` has been loaded. Every setting
//! has a default, so an empty environment is a valid configuration.
//!
//! | Variable                  | Default | Meaning                       |
//! |---------------------------|---------|-------------------------------|
//! | `CADASTRO_PORT`           | 3000    | HTTP port                     |
//! | `CADASTRO_CACHE_TTL_SECS` | 300     | list/detail cache lifetime    |
//! | `CADASTRO_MAX_UPLOAD_MB`  | 10      | import upload size limit      |

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_MAX_UPLOAD_MB: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub cache_ttl: Duration,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
        }
    }
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load from any variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = read(&lookup, "CADASTRO_PORT", DEFAULT_PORT)?;
        let ttl_secs = read(&lookup, "CADASTRO_CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)?;
        let upload_mb = read(&lookup, "CADASTRO_MAX_UPLOAD_MB", DEFAULT_MAX_UPLOAD_MB)?;

        Ok(Self {
            port,
            cache_ttl: Duration::from_secs(ttl_secs),
            max_upload_bytes: upload_mb * 1024 * 1024,
        })
    }
}

fn read<T, F>(lookup: &F, var: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) if value.trim().is_empty() => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            var: var.to_string(),
            value,
        }),
    }
}
