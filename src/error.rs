use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // local input
    #[error("failed to parse context: {0}")]
    ContextParse(String),
    #[error("failed to parse context: input value {0}")]
    InputValueParse(String),
    #[error("Default context is not valid JSON: {0}")]
    InvalidDefaultContext(String),

    // transport
    #[error("could not reach evaluation service: {0}")]
    Transport(String),
    #[error("evaluation service did not answer within {0} ms")]
    Timeout(u128),
    #[error("evaluation service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response from evaluation service: {0}")]
    Decode(String),

    // share state
    #[error("Share state error: {0}")]
    ShareState(String),

    #[error("Config error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type PlaygroundResult<T> = Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Error::Decode(err.to_string())
        } else {
            Error::Transport(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::ShareState(format!("invalid URL: {}", err))
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::ShareState(format!("invalid Base64: {}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(format!("JSON serialization error: {}", err))
    }
}

impl Error {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Error::Internal(message.into())
    }

    /// Whether the error happened before the evaluation service was reached.
    pub fn is_local_input(&self) -> bool {
        matches!(self, Error::ContextParse(_) | Error::InputValueParse(_))
    }

    /// Whether the error means the evaluation service could not be used.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::Timeout(_) | Error::Status { .. } | Error::Decode(_)
        )
    }
}
