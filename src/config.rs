// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the user configuration file to simplify the process
//! of serialization and deserialization. Every setting has a default, so a
//! missing file, or a file that only overrides a few fields, is valid. File
//! I/O is left to the caller to figure out.
//!
//! # General Layout
//!
//! ```toml
//! [site]
//! template = "https://github.com/Uinelj/tibl.git"
//!
//! [remote]
//! name = "tibl"
//! branch = "main"
//!
//! [sync]
//! commit_message = "Update site content ({count} changes)"
//!
//! [serve]
//! port = 8080
//!
//! [log]
//! level = "info"
//! ```

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Template repository that new sites are cloned from.
pub const DEFAULT_TEMPLATE: &str = "https://github.com/Uinelj/tibl.git";

/// Full settings of tibl.
///
/// Passed down to every component that needs it at construction time.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub site: SiteSettings,
    pub remote: RemoteSettings,
    pub sync: SyncSettings,
    pub serve: ServeSettings,
    pub log: LogSettings,
}

impl Settings {
    /// Load settings from configuration file at `path`.
    ///
    /// Falls back to defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if the file exists but cannot be read.
    /// - Return [`ConfigError::Deserialize`] if the file is not valid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            debug!("no configuration file at {:?}, using defaults", path.display());
            return Ok(Self::default());
        }

        debug!("load configuration file at {:?}", path.display());
        read_to_string(path)
            .map_err(|err| ConfigError::Read {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?
            .parse()
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on template source.
        settings.site.template = shellexpand::full(settings.site.template.as_str())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned();

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Site creation settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteSettings {
    /// URL or path of template repository to clone new sites from.
    pub template: String,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.into(),
        }
    }
}

/// Remote binding settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteSettings {
    /// Name of the single remote a site can be linked to.
    pub name: String,

    /// Branch to pull from and push to.
    pub branch: String,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            name: "tibl".into(),
            branch: "main".into(),
        }
    }
}

/// Content synchronization settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Commit message template, `{count}` expands to number of changed paths.
    pub commit_message: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            commit_message: "Update site content ({count} changes)".into(),
        }
    }
}

impl SyncSettings {
    /// Expand commit message template.
    pub fn commit_message(&self, count: usize) -> String {
        self.commit_message.replace("{count}", &count.to_string())
    }
}

/// Local server settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServeSettings {
    pub port: u16,
}

impl Default for ServeSettings {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// Logging settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogSettings {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Failed to read configuration file.
    #[error("failed to read configuration file at {path:?}: {message}")]
    Read { path: PathBuf, message: String },
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
