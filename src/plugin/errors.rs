// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

#[derive(thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Launch error: {0}")]
    Launch(String),
    #[error("Handshake error: {0}")]
    Handshake(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Codec error: {0}")]
    Codec(String),
    #[error("{method} timed out after {millis}ms")]
    Timeout { method: String, millis: u128 },
    #[error("{method}: {message}")]
    Remote { method: String, message: String },
    #[error("Unknown method: {0}")]
    UnknownMethod(String),
    #[error("Registration error: {0}")]
    Registration(String),
    #[error("Discovery error: {0}")]
    Discovery(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Close error: {0}")]
    Close(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Config(e)
            | Error::Launch(e)
            | Error::Handshake(e)
            | Error::Transport(e)
            | Error::Codec(e)
            | Error::UnknownMethod(e)
            | Error::Registration(e)
            | Error::Discovery(e)
            | Error::NotFound(e)
            | Error::Close(e) => {
                write!(f, "{}", e)
            }
            Error::Timeout { .. } | Error::Remote { .. } => write!(f, "{}", self),
        }
    }
}
