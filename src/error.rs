//! Defines the application's primary error type `AppError` and a convenience `Result` alias.
//!
//! Uses the `thiserror` crate for ergonomic error definition and provides `From`
//! implementations to convert common external errors into `AppError` variants.
//! Errors that do not implement `Clone` are wrapped in `Arc` to allow `AppError` to be cloneable.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::models::JobState;

/// The primary error enumeration for all application-specific errors.
#[derive(Error, Debug, Clone)]
pub enum AppError {
    /// The grade sheet (or another input file) does not exist.
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The grade sheet has a column outside the allow-list, or a duplicated column.
    #[error("Invalid grade sheet: {0}")]
    Schema(String),

    /// An attachment referenced from the grade sheet does not exist on disk.
    #[error("Attachment file '{}' doesn't exist", .0.display())]
    AttachmentNotFound(PathBuf),

    /// An attachment's extension does not match the kind its column declares.
    #[error("Invalid {expected} attachment: {}", .path.display())]
    InvalidAttachmentType { path: PathBuf, expected: String },

    /// Markdown to PDF conversion failed.
    #[error("Cannot convert '{}': {reason}", .path.display())]
    Conversion { path: PathBuf, reason: String },

    /// A grade sheet row names a student that is not on the course roster.
    #[error("Student ID {0} not found in course")]
    UnknownStudent(String),

    /// The remote API answered with a non-2xx status.
    #[error("Remote API error ({status}): {body}")]
    RemoteApi { status: u16, body: String },

    /// Network-level failure (timeout, DNS, connection reset, ...).
    #[error("Transport error: {0}")]
    Transport(Arc<reqwest::Error>),

    /// The batch grade job reached a terminal state other than `completed`.
    #[error("Grade submission job {job_id} ended as {state}")]
    SubmissionFailed { job_id: u64, state: JobState },

    /// The batch grade job did not reach a terminal state in time.
    #[error("Grade submission job {job_id} still pending after {}s", .waited.as_secs())]
    SubmissionTimeout { job_id: u64, waited: Duration },

    /// A file exceeds the configured upload size limit.
    #[error("File too large: {} ({size} bytes, max {max} bytes)", .path.display())]
    FileTooLarge { path: PathBuf, size: u64, max: u64 },

    /// A file's extension is not on the upload allow-list.
    #[error("File type not allowed: {} ({extension})", .path.display())]
    FileTypeNotAllowed { path: PathBuf, extension: String },

    /// A course-scoped command ran without a selected course.
    #[error("No course selected. Use: use course <course_id>")]
    NoCourseSelected,

    /// A course, assignment or quiz could not be found.
    #[error("{0}")]
    NotFound(String),

    /// Error during JSON parsing (`serde_json`). Wrapped in Arc as serde_json::Error is not Clone.
    #[error("JSON Parsing Error: {0}")]
    JsonParse(Arc<serde_json::Error>),

    /// Error while reading or writing CSV documents.
    #[error("CSV Error: {0}")]
    Csv(Arc<csv::Error>),

    /// Error related to accessing environment variables.
    #[error("Environment Error: {0}")]
    Env(#[from] std::env::VarError),

    /// A configuration value is present but malformed.
    #[error("Configuration Error: {0}")]
    Config(String),

    /// Error related to standard I/O operations.
    #[error("I/O Error: {0}")]
    Io(Arc<std::io::Error>),

    /// Error specific to CLI logic or argument handling.
    #[error("CLI Error: {0}")]
    Cli(String),

    /// Error originating from user interaction prompts (`dialoguer`).
    #[error("Dialoguer Error: {0}")]
    Dialoguer(Arc<dialoguer::Error>),

    /// Error related to progress bar style templating (`indicatif`).
    #[error("Progress Style Template Error: {0}")]
    Template(Arc<indicatif::style::TemplateError>),
}

impl AppError {
    /// True for a `RemoteApi` error carrying the given HTTP status.
    pub fn is_status(&self, code: u16) -> bool {
        matches!(self, AppError::RemoteApi { status, .. } if *status == code)
    }
}

/// A specialized `Result` type using the application's `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

// --- From implementations ---
// These allow easy conversion from external error types into AppError
// using the `?` operator. Arc is used for non-Clone error types.

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Transport(Arc::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(Arc::new(err))
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Csv(Arc::new(err))
    }
}

impl From<dialoguer::Error> for AppError {
    fn from(err: dialoguer::Error) -> Self {
        AppError::Dialoguer(Arc::new(err))
    }
}

impl From<indicatif::style::TemplateError> for AppError {
    fn from(err: indicatif::style::TemplateError) -> Self {
        AppError::Template(Arc::new(err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::JsonParse(Arc::new(err))
    }
}
