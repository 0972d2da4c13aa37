//! Resource configuration files.
//!
//! A manifest is a JSON document holding one resource configuration. It is
//! read through a capability-scoped handle on its parent directory.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

/// Errors raised while loading a manifest.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ManifestError {
    /// Raised when the file cannot be read.
    #[error("failed to read {path}: {message}")]
    Read {
        /// Path that could not be read.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when the file is not a valid configuration.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// Path that could not be parsed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
}

/// Reads the raw contents of `path`.
///
/// # Errors
///
/// Returns [`ManifestError::Read`] when the parent directory cannot be opened,
/// the path has no file name, or the file cannot be read.
pub fn read_manifest(path: &Utf8Path) -> Result<String, ManifestError> {
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path.file_name().ok_or_else(|| ManifestError::Read {
        path: path.to_path_buf(),
        message: String::from("manifest path is missing a file name"),
    })?;

    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| {
        ManifestError::Read {
            path: parent.to_path_buf(),
            message: err.to_string(),
        }
    })?;

    dir.read_to_string(file_name)
        .map_err(|err| ManifestError::Read {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
}

/// Parses manifest `contents` into a resource configuration.
///
/// # Errors
///
/// Returns [`ManifestError::Parse`] when the JSON is malformed or does not
/// match `T`.
pub fn parse_manifest<T: DeserializeOwned>(
    path: &Utf8Path,
    contents: &str,
) -> Result<T, ManifestError> {
    serde_json::from_str(contents).map_err(|err| ManifestError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

/// Reads and parses the manifest at `path`.
///
/// # Errors
///
/// See [`read_manifest`] and [`parse_manifest`].
pub fn load_manifest<T: DeserializeOwned>(path: &Utf8Path) -> Result<T, ManifestError> {
    let contents = read_manifest(path)?;
    debug!(%path, bytes = contents.len(), "loaded manifest");
    parse_manifest(path, &contents)
}

#[cfg(test)]
mod tests;
