//! Crate-level error type and `Result` alias for stable, structured error handling.
//! Converts underlying I/O, GDAL, engine and HTTP errors, and provides semantic
//! variants for the archive-level and per-item failure classes of a batch run.
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Synthesis failed: {0}")]
    Synthesis(#[from] crate::engine::SynthesisError),

    /// A filename token that does not parse as a `YYYYMMDD` acquisition date.
    #[error("Malformed timestamp in {name:?}: {reason}")]
    MalformedTimestamp { name: String, reason: String },

    /// Archive root missing or unreadable. Aborts the run.
    #[error("Archive unavailable: {path:?}: {source}")]
    ArchiveUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Composite assembly failed for {product:?}: {reason}")]
    RasterAssembly { product: PathBuf, reason: String },

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Invalid argument: {arg}={value}")]
    InvalidArgument { arg: &'static str, value: String },

    #[error("Invalid preset file {path:?}: {reason}")]
    Preset { path: PathBuf, reason: String },
}

impl Error {
    pub fn malformed<S: Into<String>, R: std::fmt::Display>(name: S, reason: R) -> Self {
        Error::MalformedTimestamp {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn assembly<P: Into<PathBuf>, R: std::fmt::Display>(product: P, reason: R) -> Self {
        Error::RasterAssembly {
            product: product.into(),
            reason: reason.to_string(),
        }
    }

    pub fn upload<E: std::fmt::Display>(e: E) -> Self {
        Error::Upload(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Upload(e.to_string())
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::Io(std::io::Error::other(e))
    }
}
