//! JSON configuration files read through a capability-scoped directory.

use crate::mcp_client::domain::{
    ClientDomainError, ClientSettings, CommandSecrets, McpCommandsConfig, ServerDescriptor,
};
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors returned while loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// A file or the base directory could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path relative to the base directory.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A file is not valid JSON for the expected shape.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// Path relative to the base directory.
        path: Utf8PathBuf,
        /// Parser message.
        message: String,
    },

    /// The parsed configuration is invalid.
    #[error(transparent)]
    Domain(#[from] ClientDomainError),
}

/// Loads agent configuration from files under one base directory.
///
/// Paths are resolved inside the directory handle, so `..` and absolute
/// paths cannot escape it.
#[derive(Debug)]
pub struct ConfigFileLoader {
    dir: Dir,
    base: Utf8PathBuf,
}

impl ConfigFileLoader {
    /// Opens `base` as the configuration root.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigFileError::Io`] when the directory cannot be opened.
    pub fn open(base: impl Into<Utf8PathBuf>) -> Result<Self, ConfigFileError> {
        let base_path = base.into();
        let dir = Dir::open_ambient_dir(&base_path, ambient_authority()).map_err(|source| {
            ConfigFileError::Io {
                path: base_path.clone(),
                source,
            }
        })?;
        Ok(Self {
            dir,
            base: base_path,
        })
    }

    /// Returns the configuration root.
    #[must_use]
    pub fn base_dir(&self) -> &Utf8Path {
        &self.base
    }

    /// Reads an `mcp_commands` document.
    ///
    /// # Errors
    ///
    /// Returns I/O or parse errors.
    pub fn load_commands(&self, path: &Utf8Path) -> Result<McpCommandsConfig, ConfigFileError> {
        self.read_json(path)
    }

    /// Reads a secrets document keyed by server name or launch target.
    ///
    /// # Errors
    ///
    /// Returns I/O or parse errors.
    pub fn load_secrets(&self, path: &Utf8Path) -> Result<CommandSecrets, ConfigFileError> {
        self.read_json(path)
    }

    /// Reads client settings; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns I/O or parse errors.
    pub fn load_settings(&self, path: &Utf8Path) -> Result<ClientSettings, ConfigFileError> {
        self.read_json(path)
    }

    /// Reads commands and optional secrets and translates them into
    /// descriptors.
    ///
    /// # Errors
    ///
    /// Returns I/O, parse, or validation errors.
    pub fn load_descriptors(
        &self,
        commands: &Utf8Path,
        secrets: Option<&Utf8Path>,
    ) -> Result<Vec<ServerDescriptor>, ConfigFileError> {
        let config = self.load_commands(commands)?;
        let resolved = secrets
            .map(|path| self.load_secrets(path))
            .transpose()?
            .unwrap_or_default();
        Ok(config.to_descriptors(&resolved)?)
    }

    fn read_json<T: DeserializeOwned>(&self, path: &Utf8Path) -> Result<T, ConfigFileError> {
        let text = self
            .dir
            .read_to_string(path)
            .map_err(|source| ConfigFileError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        serde_json::from_str(&text).map_err(|err| ConfigFileError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }
}
