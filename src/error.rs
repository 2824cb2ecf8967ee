//! Centralized error handling for peer-study.
//!
//! Every fallible operation in the library returns [`Result<T>`], whose error
//! type is [`PeerStudyError`]. The variants follow the failure taxonomy of the
//! pipeline:
//!
//! - [`PeerStudyError::InputMissing`]: the raw survey file does not exist.
//!   Reported before any processing starts.
//! - [`PeerStudyError::DegenerateFit`]: the scaler was asked to fit an empty
//!   or column-less matrix.
//! - [`PeerStudyError::SchemaMismatch`]: a persisted schema, scaler or cluster
//!   model is applied to a matrix whose columns disagree with the ones it was
//!   built for.
//!
//! Columns dropped by the classifier are *not* errors; they are reported as
//! warnings through `tracing`.
//!
//! ## Context Extension Trait
//!
//! ```no_run
//! use peer_study::error::ResultExt;
//! use std::fs;
//!
//! fn load_schema() -> peer_study::error::Result<String> {
//!     let text = fs::read_to_string("feature_map.json")
//!         .context("Failed to read feature schema")?;
//!     Ok(text)
//! }
//! ```

use std::fmt;

/// Main error type for peer-study operations.
#[derive(Debug)]
pub enum PeerStudyError {
    /// I/O errors (file operations)
    Io(std::io::Error),

    /// The raw input table could not be found
    InputMissing(String),

    /// Data processing errors (Polars, encoding)
    DataProcessing(String),

    /// Scaler fit attempted on an empty or column-less matrix
    DegenerateFit(String),

    /// Persisted state applied to a matrix with different columns
    SchemaMismatch(String),

    /// K-means failures
    Clustering(String),

    /// Configuration and serialization errors
    Config(String),

    /// Generic error with context
    Other(String),
}

impl fmt::Display for PeerStudyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::InputMissing(msg) => write!(f, "Input not found: {msg}"),
            Self::DataProcessing(msg) => write!(f, "Data processing error: {msg}"),
            Self::DegenerateFit(msg) => write!(f, "Degenerate fit: {msg}"),
            Self::SchemaMismatch(msg) => write!(f, "Schema mismatch: {msg}"),
            Self::Clustering(msg) => write!(f, "Clustering error: {msg}"),
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for PeerStudyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PeerStudyError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<anyhow::Error> for PeerStudyError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<serde_json::Error> for PeerStudyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("JSON error: {err}"))
    }
}

impl From<polars::error::PolarsError> for PeerStudyError {
    fn from(err: polars::error::PolarsError) -> Self {
        Self::DataProcessing(err.to_string())
    }
}

impl From<linfa_clustering::KMeansError> for PeerStudyError {
    fn from(err: linfa_clustering::KMeansError) -> Self {
        Self::Clustering(err.to_string())
    }
}

/// Result type alias for peer-study operations.
pub type Result<T> = std::result::Result<T, PeerStudyError>;

/// Extension trait to add context to results.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<PeerStudyError>,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| wrap(msg.into(), e.into()))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| wrap(f(), e.into()))
    }
}

// Typed failures keep their variant so callers can still match on them.
fn wrap(msg: String, err: PeerStudyError) -> PeerStudyError {
    match err {
        PeerStudyError::InputMissing(m) => PeerStudyError::InputMissing(format!("{msg}: {m}")),
        PeerStudyError::DegenerateFit(m) => PeerStudyError::DegenerateFit(format!("{msg}: {m}")),
        PeerStudyError::SchemaMismatch(m) => {
            PeerStudyError::SchemaMismatch(format!("{msg}: {m}"))
        }
        other => PeerStudyError::Other(format!("{msg}: {other}")),
    }
}
