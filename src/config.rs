//! Process configuration — environment variables and PIN bootstrap.
//!
//! DESIGN
//! ======
//! Everything has a default so the server runs with zero configuration.
//! The teacher PIN comes from `ROOMCAST_PIN`, else from a local bootstrap
//! file that is generated once on first run. The file lives outside the
//! static site root, so no public route can ever serve it.

use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::services::access;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_SITE_DIR: &str = "site";
const DEFAULT_PIN_FILE: &str = ".roomcast_pin";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("pin bootstrap failed at {path}: {source}")]
    PinBootstrap { path: PathBuf, source: io::Error },
}

/// Parse an environment variable, falling back to a default.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Parse a boolean-ish environment variable.
pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

/// Resolved process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub site_dir: PathBuf,
    pub pin: String,
    /// Legacy query-token privilege path; `None` disables it.
    pub legacy_token: Option<String>,
}

impl Config {
    /// Load configuration from the environment, bootstrapping the PIN file
    /// if no PIN is supplied externally.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::PinBootstrap`] if the PIN file can neither be
    /// read nor created.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = env_parse("PORT", DEFAULT_PORT);
        let site_dir = std::env::var("SITE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_SITE_DIR));

        let pin = match std::env::var("ROOMCAST_PIN") {
            Ok(pin) if !pin.trim().is_empty() => pin.trim().to_owned(),
            _ => {
                let pin_file = std::env::var("ROOMCAST_PIN_FILE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_PIN_FILE));
                load_or_create_pin(&pin_file)
                    .map_err(|source| ConfigError::PinBootstrap { path: pin_file, source })?
            }
        };

        let legacy_token = std::env::var("ROOMCAST_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        Ok(Self { port, site_dir, pin, legacy_token })
    }
}

/// Read the PIN from `path`, generating and persisting a fresh one on the
/// first run. The file is private bootstrap state, never served.
pub fn load_or_create_pin(path: &Path) -> io::Result<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let pin = contents.trim().to_owned();
            if !pin.is_empty() {
                return Ok(pin);
            }
            // Empty file: fall through and regenerate.
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let pin = access::generate_pin();
    std::fs::write(path, format!("{pin}\n"))?;
    info!(path = %path.display(), "generated teacher PIN");
    Ok(pin)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
