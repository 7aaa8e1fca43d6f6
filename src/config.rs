// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Configuration for the plugin runtime, read from TOML:
//!
//! ```toml
//! [plugin]
//! backend = "go-plugin"
//!
//! [go-plugin]
//! dir = "/usr/lib/veraison/plugins"
//! handshake-timeout-ms = 5000
//! call-timeout-ms = 30000
//! close-timeout-ms = 2000
//! on-handshake-failure = "exclude"
//! ```

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Syntax error: {0}")]
    Syntax(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) | Error::Syntax(e) | Error::Invalid(e) => {
                write!(f, "{}", e)
            }
        }
    }
}

/// Which plugin manager implementation to use
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// plugins are separate processes found in a directory
    #[default]
    GoPlugin,
    /// plugins are compiled into the host
    Builtin,
}

/// What to do when a discovered plugin fails to launch or handshake
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HandshakeFailurePolicy {
    /// log the failure and carry on without the plugin
    #[default]
    Exclude,
    /// fail the whole discovery
    Abort,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginConfig {
    #[serde(default)]
    pub backend: Backend,
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoaderConfig {
    /// directory scanned for `*.plugin` executables
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "handshake-timeout-ms", default = "default_handshake_timeout")]
    pub handshake_timeout: Duration,
    /// zero disables the per-call deadline
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "call-timeout-ms", default = "default_call_timeout")]
    pub call_timeout: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "close-timeout-ms", default = "default_close_timeout")]
    pub close_timeout: Duration,
    #[serde(default)]
    pub on_handshake_failure: HandshakeFailurePolicy,
}

fn default_handshake_timeout() -> Duration {
    Duration::from_millis(5000)
}

fn default_call_timeout() -> Duration {
    Duration::from_millis(30000)
}

fn default_close_timeout() -> Duration {
    Duration::from_millis(2000)
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            dir: None,
            handshake_timeout: default_handshake_timeout(),
            call_timeout: default_call_timeout(),
            close_timeout: default_close_timeout(),
            on_handshake_failure: HandshakeFailurePolicy::default(),
        }
    }
}

impl LoaderConfig {
    /// Loader settings for the given plugin directory, defaults elsewhere
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub plugin: PluginConfig,
    #[serde(rename = "go-plugin", default)]
    pub go_plugin: LoaderConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Io(format!("reading {:?}: {e}", path.as_ref())))?;

        Self::from_toml(&contents)
    }

    pub fn from_toml(s: &str) -> Result<Self, Error> {
        let config: Config = toml::from_str(s).map_err(|e| Error::Syntax(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.plugin.backend == Backend::GoPlugin && self.go_plugin.dir.is_none() {
            return Err(Error::Invalid(
                "the go-plugin backend needs go-plugin.dir".to_string(),
            ));
        }
        Ok(())
    }
}
