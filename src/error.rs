//! Processing errors.
//!
//! Only failures that stop a file (or a whole folder run) surface here.
//! Stylesheet and markup problems degrade to "nothing detected" instead, and
//! patch failures are folded into the file's report row.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort processing of a file or folder.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("cannot decode {path} as UTF-8 or Windows-1252")]
    Decode { path: PathBuf },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("report error: {0}")]
    Report(#[from] serde_json::Error),

    #[error("folder walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type Result<T> = std::result::Result<T, ProcessError>;

/// Errors raised while writing a patched source file.
#[derive(Error, Debug)]
pub enum PatchError {
    #[error("cannot write backup {path}: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
