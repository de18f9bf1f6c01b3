//! Application configuration management.
//!
//! Settings are merged from three layers, later layers winning:
//!
//! 1. built-in defaults
//! 2. `config.toml` in the platform configuration directory, or the file
//!    given with `--config`
//! 3. `PACKRAT_*` environment variables (e.g. `PACKRAT_THREADS=8`)
//!
//! Command-line flags are applied on top by the caller.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::actions::pack::{DEFAULT_REMOVAL_POLL_ATTEMPTS, DEFAULT_REMOVAL_POLL_INTERVAL};
use crate::actions::PackConfig;
use crate::scanner::MatcherConfig;

/// Prefix of the environment variables read by [`Config::load`].
pub const ENV_PREFIX: &str = "PACKRAT_";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Worker threads for fingerprinting and group processing (0 = auto).
    pub threads: usize,
    /// Follow symbolic links while resolving patterns.
    pub follow_symlinks: bool,
    /// Polls performed while waiting for a cleared destination to vanish.
    pub removal_poll_attempts: u32,
    /// Milliseconds between two removal polls.
    pub removal_poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threads: 0,
            follow_symlinks: false,
            removal_poll_attempts: DEFAULT_REMOVAL_POLL_ATTEMPTS,
            removal_poll_interval_ms: DEFAULT_REMOVAL_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

impl Config {
    /// Load the configuration.
    ///
    /// `path` overrides the platform-specific location. A missing file means
    /// defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path(),
        };

        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(ref path) = path {
            log::debug!("Reading configuration from {}", path.display());
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX));

        figment.extract().with_context(|| match path {
            Some(path) => format!("Invalid configuration in {}", path.display()),
            None => "Invalid configuration".to_string(),
        })
    }

    /// Load the configuration from a TOML file only, ignoring the environment.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .extract()
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Get the default platform-specific configuration path.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "packrat", "packrat")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Pattern resolution settings.
    #[must_use]
    pub fn matcher_config(&self) -> MatcherConfig {
        MatcherConfig {
            follow_symlinks: self.follow_symlinks,
        }
    }

    /// Pack engine settings, without a progress callback.
    #[must_use]
    pub fn pack_config(&self) -> PackConfig {
        PackConfig {
            threads: self.threads,
            removal_poll_attempts: self.removal_poll_attempts,
            removal_poll_interval: Duration::from_millis(self.removal_poll_interval_ms),
            progress_callback: None,
        }
    }
}
