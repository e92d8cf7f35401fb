use thiserror::Error;

use crate::api::client::ApiError;
use crate::api::models::Role;
use crate::workflow::TransitionError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures of local storage: the credential file and the conversation cache.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no config or data directory available")]
    NoDir,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("invalid credentials file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("could not write credentials file: {0}")]
    TomlWrite(#[from] toml::ser::Error),
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything a user action can end in.
#[derive(Debug, Error)]
pub enum Error {
    /// Client-side check failed before anything was sent.
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },
    /// Remote call failed; the string is what the user should see.
    #[error("{0}")]
    Remote(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("not signed in")]
    NotSignedIn,
    #[error("only a {} can do that", .required.label())]
    WrongRole { required: Role },
    /// Unknown id; views show an empty state for this.
    #[error("{0} not found")]
    NotFound(String),
    #[error("no conversation is open")]
    NoActiveConversation,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("push channel: {0}")]
    Socket(String),
}

impl Error {
    pub(crate) fn remote(err: &ApiError, fallback: &str) -> Self {
        Error::Remote(err.user_message(fallback))
    }
}
