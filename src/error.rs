use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Redb(#[from] redb::Error),

    #[error("database storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("database transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("database table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("database commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("index file {path} is corrupt: {reason}")]
    CorruptState { path: PathBuf, reason: String },

    #[error("transcription of {file} failed: {reason}")]
    Transcription { file: String, reason: String },

    #[error("translation failed: {0}")]
    Translation(#[from] TranslationError),

    #[error("playback failed: {0}")]
    Playback(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),

    #[error("no video folder selected")]
    NoFolder,

    #[error("indexing worker failed: {0}")]
    Worker(String),
}

/// Why a translation request produced no text.
#[derive(Debug, thiserror::Error)]
pub enum TranslationError {
    #[error("translation service is not reachable at {0}")]
    Unavailable(String),

    #[error("translation request timed out after {0}s")]
    Timeout(u64),

    #[error("translation service answered with status {0}")]
    Status(u16),

    #[error("malformed translation response: {0}")]
    MalformedResponse(String),

    #[error("nothing to translate")]
    EmptyInput,

    #[error("translation service returned an empty translation")]
    EmptyTranslation,
}
