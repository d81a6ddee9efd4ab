use surveyflow_session::StoreError;
use thiserror::Error;

/// Engine operation failures. `SessionNotFound` is recoverable (the caller
/// surfaces "invalid session"); `Store` means backend I/O failed and the
/// caller may retry.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("unknown survey: {0}")]
    UnknownSurvey(String),

    #[error("unknown session: {0}")]
    SessionNotFound(String),

    #[error("session store failure: {0}")]
    Store(#[from] StoreError),
}
