use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriftwatchError {
    #[error("Reference error: {0}")]
    Reference(String),

    #[error("Procedure error: {0}")]
    Procedure(String),

    #[error("Invalid transition: {0}")]
    Transition(String),

    #[error("Reasoning service error: {0}")]
    Reasoning(String),

    #[error("Frame error: {0}")]
    Frame(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl From<DriftwatchError> for String {
    fn from(err: DriftwatchError) -> Self {
        err.to_string()
    }
}
