use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Connection to {url} failed")]
    Connection {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Unknown {kind} \"{name}\"")]
    Lookup { kind: &'static str, name: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    WebSocket(#[from] tungstenite::Error),
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No samples for field \"{0}\"")]
    EmptySequence(&'static str),

    #[error("Unexpected {0} frame")]
    UnexpectedFrame(&'static str),

    #[error("Connection closed before a reply was received")]
    Closed,
}

impl Error {
    pub fn connection(url: &str, source: impl Into<TransportError>) -> Self {
        Error::Connection {
            url: url.to_owned(),
            source: source.into(),
        }
    }

    pub fn lookup(kind: &'static str, name: &str) -> Self {
        Error::Lookup {
            kind,
            name: name.to_owned(),
        }
    }
}
