// src/error.rs
// =============================================================================
// Typed errors for the audit library.
//
// There are three families:
// - AuditError: fatal. The primary page could not be fetched or parsed, or
//   the caller handed us something unusable. No Report is produced.
// - CheckError: raised by a single check collaborator. It is always caught
//   at the call boundary and recorded as "not run", never propagated.
// - RuleTableError: the static rule table is inconsistent. Raised once when
//   the table is first loaded.
//
// Individual probe failures are NOT errors at all; they are classified into
// `FailureKind` and stored as data (see checker/probe.rs).
// =============================================================================

use thiserror::Error;

use crate::checker::FailureKind;

/// Errors that abort an audit run.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The URL handed to the audit could not be parsed or is not http(s)
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The audit options are out of range (zero caps, zero timeouts...)
    #[error("invalid audit options: {0}")]
    InvalidOptions(String),

    /// The primary page request failed before a response arrived
    #[error("failed to fetch {url} ({kind}): {message}")]
    Fetch {
        url: String,
        kind: FailureKind,
        message: String,
    },

    /// The primary page answered with a non-2xx status
    #[error("{url} answered with HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// The primary page is not an HTML document
    #[error("{url} is not an HTML page (content-type: {content_type})")]
    NotHtml { url: String, content_type: String },

    /// The primary page answered with an empty body
    #[error("{url} returned an empty body")]
    EmptyBody { url: String },

    /// The overall deadline elapsed before the primary page arrived
    #[error("deadline exceeded before {url} could be fetched")]
    DeadlineExceeded { url: String },

    /// The run was cancelled before the primary page arrived
    #[error("audit of {url} was cancelled")]
    Cancelled { url: String },

    /// The HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// The rule table failed validation
    #[error("rule table error: {0}")]
    Rules(#[from] RuleTableError),
}

/// Errors a check collaborator may return. Recorded as "not run".
#[derive(Debug, Error)]
pub enum CheckError {
    /// An optional capability (dictionary, browser, API key) is missing
    #[error("capability unavailable: {0}")]
    Unavailable(String),

    /// The collaborator's own network call failed
    #[error("HTTP error: {0}")]
    Http(String),

    /// The collaborator received data it could not interpret
    #[error("parse error: {0}")]
    Parse(String),

    /// The overall deadline left no time for this collaborator
    #[error("deadline exceeded")]
    Deadline,

    /// The collaborator panicked
    #[error("check panicked: {0}")]
    Panicked(String),

    /// The collaborator has nothing to look at (e.g. no target keyword)
    #[error("skipped: {0}")]
    Skipped(String),
}

impl From<reqwest::Error> for CheckError {
    fn from(e: reqwest::Error) -> Self {
        CheckError::Http(e.to_string())
    }
}

impl From<serde_json::Error> for CheckError {
    fn from(e: serde_json::Error) -> Self {
        CheckError::Parse(e.to_string())
    }
}

impl From<std::io::Error> for CheckError {
    fn from(e: std::io::Error) -> Self {
        CheckError::Unavailable(e.to_string())
    }
}

/// Inconsistencies in the static rule table.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuleTableError {
    /// Two rules share one finding key
    #[error("duplicate rule for finding key '{0}'")]
    DuplicateKey(String),

    /// A finding key has no rule describing it
    #[error("finding key '{0}' has no rule")]
    MissingRule(String),

    /// A rule has an empty message or remediation text
    #[error("rule '{0}' has an empty message or remediation")]
    EmptyText(String),
}

/// Result type alias for audit operations.
pub type Result<T> = std::result::Result<T, AuditError>;

/// Result type alias for check collaborators.
pub type CheckResult<T> = std::result::Result<T, CheckError>;
