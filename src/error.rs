use thiserror::Error;

/// Everything that can go wrong between pressing Enter and the scene changing.
/// None of these are fatal; they all end up as a status-line notification.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("missing credentials: {0}")]
    MissingCredentials(&'static str),

    #[error("OpenAI request failed: {0}")]
    Provider(String),

    #[error("No code generated.")]
    NoCode,

    #[error("execution error: {0}")]
    Execution(String),
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Provider(err.to_string())
    }
}
