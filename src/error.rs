//! # Error Types
//!
//! Custom error types for the symbolic regression engine. Only genuinely
//! fatal conditions are errors: bad configuration, malformed training data,
//! and checkpoint failures in resume mode. Infeasible candidates and
//! optimizer non-convergence are values, not errors (see
//! [`crate::fitness::Fitness`] and [`crate::local_opt::LevenbergMarquardt`]).
//!
//! ## Examples
//!
//! Using the `Result` type:
//!
//! ```rust
//! use gpsr::error::{GpsrError, Result};
//!
//! fn validate_population(size: usize) -> Result<()> {
//!     if size == 0 {
//!         return Err(GpsrError::Configuration(
//!             "population size cannot be zero".to_string(),
//!         ));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Using the `ResultExt` trait to add context to errors:
//!
//! ```rust
//! use gpsr::error::{Result, ResultExt};
//! use std::fs::File;
//!
//! fn open_data_file(path: &str) -> Result<File> {
//!     File::open(path).context("failed to open training data file")
//! }
//! ```

use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Represents fatal errors that can occur while setting up or running
/// a symbolic regression search.
#[derive(Error, Debug)]
pub enum GpsrError {
    /// Error that occurs when an invalid configuration is provided.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error that occurs when training data is malformed or cannot be loaded.
    #[error("Training data error: {0}")]
    Data(String),

    /// Error that occurs when the generator cannot produce a valid genotype.
    #[error("Generation error: {0}")]
    Generation(String),

    /// Error that occurs when a checkpoint cannot be written or restored.
    /// Restoring from a missing or corrupt checkpoint is fatal in resume
    /// mode; fresh-start mode never touches existing checkpoints.
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Error that occurs when an I/O operation fails.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A generic error with a custom message.
    #[error("{0}")]
    Other(String),
}

/// A specialized Result type for symbolic regression operations.
pub type Result<T> = std::result::Result<T, GpsrError>;

/// Extension trait for Result to add context to errors.
///
/// This trait provides a convenient way to add context to errors when
/// converting from another error type to `GpsrError`.
///
/// ## Examples
///
/// ```rust
/// use gpsr::error::ResultExt;
/// use std::fs::File;
///
/// fn read_file(path: &str) -> gpsr::error::Result<()> {
///     File::open(path).context("failed to open file")?;
///     Ok(())
/// }
/// ```
pub trait ResultExt<T, E> {
    /// Adds context to an error, converting it to a `GpsrError`.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static;
}

impl<T, E> ResultExt<T, E> for std::result::Result<T, E>
where
    E: StdError + Send + Sync + 'static,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| GpsrError::Other(format!("{}: {}", context, e)))
    }
}
