use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a response (network, DNS, TLS).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-2xx status; `message` is its `{error}`
    /// body verbatim.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Not signed in")]
    Unauthenticated,

    #[error("Gateway connection failed: {0}")]
    Connection(String),

    #[error("Gateway protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthenticated) || self.status() == Some(401)
    }
}
