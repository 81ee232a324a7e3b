//! Reading and writing the INI file behind [`ConfigFile`].
//!
//! A missing file is not an error: holdfast runs on defaults until the user
//! writes one. Parsing lives in [`super::parser`], rendering in
//! [`super::writer`].

use super::defaults::config_file_path;
use super::settings::ConfigFile;
use ini::Ini;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// The file exists but is not valid INI, or could not be read.
    #[error("cannot read config: {0}")]
    Read(#[from] ini::Error),

    #[error("cannot write config: {0}")]
    Write(std::io::Error),

    /// A key parsed as INI but its value is out of range or malformed.
    #[error("[{section}] {key} = '{value}': {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error("cannot create config directory: {0}")]
    CreateDirectory(std::io::Error),
}

impl ConfigFile {
    /// Reads `~/.holdfast/config.ini`.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Reads `path`, or returns [`ConfigFile::default`] when it is absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        super::parser::parse_ini(&Ini::load_from_file(path)?)
    }

    pub fn save(&self) -> Result<(), ConfigFileError> {
        self.save_to(&config_file_path())
    }

    /// Writes the commented INI rendering to `path`, creating parent
    /// directories as needed. Any existing file is replaced.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigFileError::CreateDirectory)?;
        }
        fs::write(path, super::writer::to_config_string(self)).map_err(ConfigFileError::Write)
    }

    /// Writes a default file at the standard location unless one exists,
    /// and returns that location.
    pub fn ensure_exists() -> Result<PathBuf, ConfigFileError> {
        let path = config_file_path();
        if !path.exists() {
            Self::default().save_to(&path)?;
        }
        Ok(path)
    }
}
