//! Declaration loading
//!
//! The declaration is JSON by default; a `.toml` extension selects TOML with
//! the same schema.

use declarative::{Declaration, Error};
use std::fs;
use std::path::{Path, PathBuf};

/// Declaration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Toml,
}

impl Format {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

/// Expand `~` in a user supplied path
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).as_ref())
}

/// Read and decode a declaration file
pub fn load(path: &Path) -> Result<Declaration, Error> {
    let path = expand_path(path);
    let content = fs::read_to_string(&path).map_err(|e| Error::ConfigLoad {
        path: path.clone(),
        message: e.to_string(),
    })?;

    let declaration = parse(&content, Format::from_path(&path)).map_err(|message| {
        Error::ConfigLoad {
            path: path.clone(),
            message,
        }
    })?;

    log::debug!(
        "loaded {} task(s) from {}",
        declaration.tasks.len(),
        path.display()
    );
    Ok(declaration)
}

/// Decode declaration text in the given format
pub fn parse(content: &str, format: Format) -> Result<Declaration, String> {
    match format {
        Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        Format::Toml => toml::from_str(content).map_err(|e| e.to_string()),
    }
}
