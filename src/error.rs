// Error type shared by every network and file operation of the library.
// The UI layer wraps these in `anyhow` for display; library callers can
// match on the variant to decide whether a fresh login is needed.

use thiserror::Error;

/// Failures surfaced by login, upload and credential persistence.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection-level failure talking to a remote endpoint.
    #[error("network error: {0}")]
    Transport(String),

    /// The remote answered with something we could not interpret, or a
    /// login session reached a state it cannot recover from.
    #[error("unexpected response: {0}")]
    Protocol(String),

    /// Non-zero status while exchanging login codes or probing a credential.
    #[error("login rejected: {0}")]
    Auth(String),

    /// The storage host refused the transfer.
    #[error("storage rejected upload: {0}")]
    Storage(String),

    /// The metadata service refused the upload record (or the history lookup).
    #[error("upload record rejected: {0}")]
    Record(String),

    /// Local file missing or unreadable.
    #[error("file error: {0}")]
    Io(#[from] std::io::Error),

    /// QR code was never confirmed within the allowed number of polls.
    #[error("login not confirmed after {attempts} polls")]
    LoginTimeout { attempts: u32 },

    /// The client was built with unusable settings, e.g. an empty key pool.
    #[error("configuration error: {0}")]
    Config(String),

    /// Credential file could not be written.
    #[error("credential store: {0}")]
    Store(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Protocol(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
