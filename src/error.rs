//! Error handling for confclient.
//! Defines the typed error taxonomy and result alias used throughout the crate.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Namespace a key lives in on the configuration service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    String,
    List,
    Hash,
    /// Admin lookups that are not tied to one namespace
    Any,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyKind::String => write!(f, "string"),
            KeyKind::List => write!(f, "list"),
            KeyKind::Hash => write!(f, "hash"),
            KeyKind::Any => write!(f, "any"),
        }
    }
}

/// Custom error types for confclient operations.
///
/// Lookup failures are split into [`Error::NotFound`] (the service answered and
/// the key is absent) and [`Error::SourceUnavailable`] (the service could not
/// be asked, or answered with something unusable).
#[derive(Error, Debug)]
pub enum Error {
    /// Represents errors that occur during file system operations
    #[error("IO error: {0}.")]
    IoError(#[from] io::Error),

    /// The key does not exist in the requested namespace
    #[error("Key '{key}' not found ({kind}).")]
    NotFound { kind: KeyKind, key: String },

    /// Transport or protocol failure while talking to the configuration source
    #[error("Configuration source unavailable: {reason}.")]
    SourceUnavailable { reason: String },

    /// Template parse or execution failure
    #[error("Template error in '{}': {source}.", .path.display())]
    TemplateError {
        path: PathBuf,
        #[source]
        source: minijinja::Error,
    },

    /// The check command rejected the staged output
    #[error("Validation error: `{command}` failed with {status}. Output: {output}")]
    ValidationError {
        command: String,
        status: ExitStatus,
        output: String,
    },

    /// Filesystem failure while staging or installing a rendered file
    #[error("Install error: cannot {operation} '{}': {source}.", .path.display())]
    InstallError {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Represents errors in command line or runtime configuration
    #[error("Configuration error: {0}.")]
    ConfigError(String),

    /// A job descriptor could not be read or parsed
    #[error("Cannot load descriptor '{}': {reason}.", .path.display())]
    DescriptorError { path: PathBuf, reason: String },

    /// Admin operation refused by the client
    #[error("Admin error: {0}.")]
    AdminError(String),

    /// A template job failed; wraps the underlying cause
    #[error("Job '{name}' failed")]
    JobFailed {
        name: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn not_found<S: Into<String>>(kind: KeyKind, key: S) -> Self {
        Error::NotFound { kind, key: key.into() }
    }

    pub fn unavailable<S: Into<String>>(reason: S) -> Self {
        Error::SourceUnavailable { reason: reason.into() }
    }

    pub fn install<P: Into<PathBuf>>(operation: &'static str, path: P, source: io::Error) -> Self {
        Error::InstallError { operation, path: path.into(), source }
    }

    /// Returns true when the error means "the key is absent".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

/// Convenience type alias for Results with [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Default error handler that prints the error and exits the program.
///
/// # Behavior
/// Prints the error message to stderr and exits with status code 1
pub fn default_error_handler(err: anyhow::Error) -> ! {
    eprintln!("ERROR: {err:#}");
    std::process::exit(1);
}
