//! Scratch-file persistence. The on-disk format is exactly the document
//! text, markers included, so a file round-trips byte-for-byte.

use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("failed to read scratch file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write scratch file {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("scratch file {path} is not valid UTF-8")]
    InvalidUtf8 { path: PathBuf },
}

/// Read the scratch file; a missing file is an empty document, not an
/// error.
pub fn load_scratch(path: &Path) -> Result<String, IoError> {
    match std::fs::read(path) {
        Ok(bytes) => String::from_utf8(bytes).map_err(|_| IoError::InvalidUtf8 {
            path: path.to_path_buf(),
        }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(IoError::Read {
            path: path.to_path_buf(),
            source: err,
        }),
    }
}

/// Write the scratch file, creating parent directories on first save.
pub fn save_scratch(path: &Path, content: &str) -> Result<(), IoError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|err| IoError::Write {
            path: path.to_path_buf(),
            source: err,
        })?;
    }
    std::fs::write(path, content).map_err(|err| IoError::Write {
        path: path.to_path_buf(),
        source: err,
    })
}
