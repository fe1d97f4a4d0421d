use thiserror::Error;

/// Failures of a single statement extraction attempt.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("The extraction service returned an empty response")]
    EmptyResponse,

    #[error("The extraction service returned malformed JSON: {0}")]
    MalformedJson(String),

    #[error("Could not reach the extraction service: {0}")]
    Network(String),

    #[error("The extraction service rejected the API key: {0}")]
    Auth(String),

    #[error("The extraction service failed with status {status}: {message}")]
    Service { status: u16, message: String },
}

#[derive(Error, Debug)]
pub enum FinError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Please upload a valid PDF bank statement ({0})")]
    FileTypeRejected(String),

    #[error("File read failed: {0}")]
    FileRead(String),

    #[error("AI extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Sync failed, verify the script URL and deployment settings: {0}")]
    SyncTransport(String),

    #[error("Invalid endpoint URL '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("Unknown transaction: {0}")]
    UnknownTransaction(String),

    #[error("Unknown tag: {0} (add it with `fintrack tags add`)")]
    UnknownTag(String),

    #[error("Invalid edit: {0}")]
    InvalidEdit(String),

    #[error("This statement has already been processed (use --force to extract it again)")]
    DuplicateStatement,

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, FinError>;
