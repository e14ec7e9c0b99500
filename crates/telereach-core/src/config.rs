use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Delivery pacing knobs consumed by the delivery queue.
///
/// Defaults are deliberately conservative: 30-120s between messages is what
/// keeps an account out of the platform's flood detection.
#[derive(Clone, Copy, Debug)]
pub struct DeliveryConfig {
    /// Lower bound of the random inter-message delay.
    pub min_delay: Duration,
    /// Upper bound of the random inter-message delay.
    pub max_delay: Duration,
    /// How many times a failed job is retried before it is dropped with a
    /// terminal-failure report.
    pub max_retries: u32,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(120),
            max_retries: 3,
        }
    }
}

/// Typed configuration for the application.
#[derive(Clone, Debug)]
pub struct Config {
    /// Platform application id, handed to the wire adapter.
    pub api_id: i32,
    /// Platform application hash, handed to the wire adapter.
    pub api_hash: String,

    /// Encrypted credential-blob store location.
    pub sessions_file: PathBuf,
    /// Symmetric key file for the session store (generated on first use).
    pub session_key_file: PathBuf,

    pub delivery: DeliveryConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let api_id = env_str("API_ID")
            .and_then(|s| s.trim().parse::<i32>().ok())
            .ok_or_else(|| Error::Config("API_ID must be set to a numeric app id".to_string()))?;

        let api_hash = env_str("API_HASH")
            .and_then(non_empty)
            .ok_or_else(|| Error::Config("API_HASH must be set".to_string()))?;

        let sessions_file =
            PathBuf::from(env_str("SESSIONS_FILE").unwrap_or("sessions.json".to_string()));
        let session_key_file =
            PathBuf::from(env_str("SESSION_KEY_FILE").unwrap_or("session.key".to_string()));

        let delivery = DeliveryConfig {
            min_delay: Duration::from_secs(env_u64("MIN_DELAY").unwrap_or(30)),
            max_delay: Duration::from_secs(env_u64("MAX_DELAY").unwrap_or(120)),
            max_retries: env_u32("MAX_RETRIES").unwrap_or(3),
        };
        validate_delivery(&delivery)?;

        Ok(Self {
            api_id,
            api_hash,
            sessions_file,
            session_key_file,
            delivery,
        })
    }
}

fn validate_delivery(cfg: &DeliveryConfig) -> Result<()> {
    if cfg.min_delay > cfg.max_delay {
        return Err(Error::Config(format!(
            "MIN_DELAY ({}s) must not exceed MAX_DELAY ({}s)",
            cfg.min_delay.as_secs(),
            cfg.max_delay.as_secs()
        )));
    }
    Ok(())
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
