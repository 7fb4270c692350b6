//! Error types
//!
//! Only construction-time failures are errors. Per-frame conditions (a marker
//! out of sight, a missed objective) are game flow and never leave `update`.

use std::path::PathBuf;

/// Failure while reading or parsing a `.patt` pattern file.
#[derive(thiserror::Error, Debug)]
pub enum PatternError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("expected 4 orientations x 3 channels of a square grid, found {found} values")]
    ValueCount { found: usize },
    #[error("value {value} at position {index} is outside 0..=255")]
    ValueOutOfRange { index: usize, value: i64 },
    #[error("not a number: {token:?}")]
    NotANumber { token: String },
}

/// A required board marker could not be constructed. Fatal to the match.
#[derive(thiserror::Error, Debug)]
pub enum SetupError {
    #[error("failed to load pattern {path}: {source}")]
    Pattern {
        path: PathBuf,
        #[source]
        source: PatternError,
    },
    #[error("marker {path} has invalid width {width} mm")]
    InvalidWidth { path: PathBuf, width: f64 },
}

/// Failure while loading or validating [`crate::Settings`].
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid settings: {0}")]
    Invalid(String),
}
