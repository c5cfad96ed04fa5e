//! Settings loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ClientSettings;
use crate::config::validation::{validate_settings, ValidationError};

/// Error type for settings loading.
#[derive(Debug)]
pub enum LoadError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "IO error: {}", e),
            LoadError::Parse(e) => write!(f, "Parse error: {}", e),
            LoadError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Io(e) => Some(e),
            LoadError::Parse(e) => Some(e),
            LoadError::Validation(_) => None,
        }
    }
}

/// Load and validate client settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<ClientSettings, LoadError> {
    let content = fs::read_to_string(path).map_err(LoadError::Io)?;
    let settings: ClientSettings = toml::from_str(&content).map_err(LoadError::Parse)?;

    validate_settings(&settings).map_err(LoadError::Validation)?;

    tracing::debug!(path = %path.display(), "Client settings loaded");
    Ok(settings)
}
