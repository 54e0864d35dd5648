//! Stderr logging with a small verbosity ladder.
//!
//! Library internals trace through the `log` facade; this module is the
//! user-facing side, gating what a consuming tool prints to stderr.

use std::env;
use std::fmt;

use crate::error::{Error, Result};

/// Environment variable consulted when no explicit verbosity is given.
pub const LOG_MODE_VAR: &str = "STRATA_LOG_MODE";

/// Output verbosity, ordered from quietest to loudest.
///
/// # Examples
///
/// ```
/// use strata::LogLevel;
///
/// assert!(LogLevel::Quiet < LogLevel::Normal);
/// assert!(LogLevel::Normal < LogLevel::Verbose);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Suppress all non-essential output.
    Quiet,
    /// Errors and warnings.
    Normal,
    /// Everything, including debug traces.
    Verbose,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quiet => write!(f, "quiet"),
            Self::Normal => write!(f, "normal"),
            Self::Verbose => write!(f, "verbose"),
        }
    }
}

impl LogLevel {
    /// Parse a verbosity name, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns a validation error for anything other than "quiet",
    /// "normal", or "verbose".
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "quiet" => Ok(Self::Quiet),
            "normal" => Ok(Self::Normal),
            "verbose" => Ok(Self::Verbose),
            _ => Err(Error::Validation {
                field: "log level".to_string(),
                message: format!("unrecognized level '{s}'"),
            }),
        }
    }
}

/// A stderr logger gated by a [`LogLevel`].
///
/// # Examples
///
/// ```
/// use strata::{LogLevel, Logger};
///
/// let logger = Logger::new(LogLevel::Normal);
/// logger.warn("store file is world-writable");
/// logger.debug("not printed at Normal");
/// ```
pub struct Logger {
    level: LogLevel,
}

impl Logger {
    /// Create a logger at the given verbosity.
    #[must_use]
    pub const fn new(level: LogLevel) -> Self {
        Self { level }
    }

    /// The configured verbosity.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        self.level
    }

    /// Print an error message, unless Quiet.
    pub fn error(&self, message: &str) {
        if self.level >= LogLevel::Normal {
            eprintln!("ERROR: {message}");
        }
    }

    /// Print a warning, unless Quiet.
    pub fn warn(&self, message: &str) {
        if self.level >= LogLevel::Normal {
            eprintln!("WARN: {message}");
        }
    }

    /// Print an informational message at Verbose only.
    pub fn info(&self, message: &str) {
        if self.level >= LogLevel::Verbose {
            eprintln!("INFO: {message}");
        }
    }

    /// Print a debug trace at Verbose only.
    pub fn debug(&self, message: &str) {
        if self.level >= LogLevel::Verbose {
            eprintln!("DEBUG: {message}");
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(LogLevel::Normal)
    }
}

/// Build a logger from explicit flags, falling back to [`LOG_MODE_VAR`]
/// and finally to Normal.
///
/// `verbose` wins over `quiet` when both are set; either flag wins over
/// the environment variable. An unparseable variable is ignored.
#[must_use]
pub fn init_logger(verbose: bool, quiet: bool) -> Logger {
    if verbose {
        return Logger::new(LogLevel::Verbose);
    }
    if quiet {
        return Logger::new(LogLevel::Quiet);
    }

    if let Ok(mode) = env::var(LOG_MODE_VAR) {
        if let Ok(level) = LogLevel::parse(&mode) {
            return Logger::new(level);
        }
    }

    Logger::new(LogLevel::Normal)
}
