//!
//! src/errors.rs  Oct 16th, 2026
//!
//! Defines the error enum for the migrator and conversions from the
//! crates it talks to. Per-item match failures are not errors and live
//! in plan.rs instead.
//!

use std::fmt;
use thiserror::Error;

/// What was left behind in the target when a playlist write broke half way
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialWrite {
    pub playlist_id: Option<String>,
    pub written: usize,
    pub expected: usize,
    pub cleaned_up: bool,
}

impl fmt::Display for PartialWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.playlist_id {
            Some(id) => write!(
                f,
                "playlist {id} holds {}/{} items, {}",
                self.written,
                self.expected,
                if self.cleaned_up { "removed again" } else { "left in place" }
            ),
            None => write!(f, "{}/{} items written", self.written, self.expected),
        }
    }
}

fn fmt_partial(partial: &Option<PartialWrite>) -> String {
    partial.as_ref().map(|p| format!(" ({p})")).unwrap_or_default()
}

#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("config error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("auth error: {0}")]
    Auth(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    // run-fatal, see migrator.rs
    #[error("source playlist not found: {0}")]
    SourceNotFound(String),
    #[error("source catalog unavailable: {0}")]
    SourceUnavailable(String),
    #[error("target catalog unavailable: {0}")]
    TargetUnavailable(String),
    #[error("target playlist write failed: {reason}{}", fmt_partial(.partial))]
    TargetWriteFailed {
        reason: String,
        partial: Option<PartialWrite>,
    },
}

impl MigrateError {
    pub fn write_failed(reason: impl Into<String>) -> Self {
        MigrateError::TargetWriteFailed { reason: reason.into(), partial: None }
    }

    /// Folds a collaborator error into SourceUnavailable unless it already
    /// carries a run-fatal meaning
    pub fn into_source(self) -> Self {
        match self {
            e @ (MigrateError::SourceNotFound(_) | MigrateError::SourceUnavailable(_)) => e,
            other => MigrateError::SourceUnavailable(other.to_string()),
        }
    }

    pub fn into_target(self) -> Self {
        match self {
            e @ (MigrateError::TargetUnavailable(_)
                | MigrateError::TargetWriteFailed { .. }) => e,
            other => MigrateError::TargetUnavailable(other.to_string()),
        }
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) => 2,
            _ => 1,
        }
    }
}

impl From<reqwest::Error> for MigrateError {
    fn from(e: reqwest::Error) -> Self { MigrateError::Http(e.to_string()) }
}

impl From<serde_json::Error> for MigrateError {
    fn from(e: serde_json::Error) -> Self { MigrateError::Parse(e.to_string()) }
}

impl From<url::ParseError> for MigrateError {
    fn from(e: url::ParseError) -> Self { MigrateError::Config(e.to_string()) }
}
