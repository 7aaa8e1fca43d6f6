// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

const BAD_EVIDENCE_PREFIX: &str = "bad evidence: ";

#[derive(thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// The evidence itself is at fault: malformed, unsupported or failing
    /// verification.  Callers may report this back to the attester.
    #[error("bad evidence: {0}")]
    BadEvidence(String),
    #[error("Endorsement error: {0}")]
    Endorsement(String),
    #[error("Trust anchor error: {0}")]
    TrustAnchor(String),
    #[error("Crypto error: {0}")]
    Crypto(String),
    #[error("Trust error: {0}")]
    Trust(String),
    #[error("{0}")]
    Rpc(String),
}

impl Error {
    pub fn is_bad_evidence(&self) -> bool {
        matches!(self, Error::BadEvidence(_))
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::BadEvidence(e) => write!(f, "{BAD_EVIDENCE_PREFIX}{e}"),
            Error::Endorsement(e)
            | Error::TrustAnchor(e)
            | Error::Crypto(e)
            | Error::Trust(e)
            | Error::Rpc(e) => {
                write!(f, "{}", e)
            }
        }
    }
}

/// Rebuild a scheme error from the message a plugin returned for `method`.
/// Bad-evidence errors keep their kind across the process boundary.
pub fn parse_remote_error(method: &str, message: &str) -> Error {
    match message.strip_prefix(BAD_EVIDENCE_PREFIX) {
        Some(reason) => Error::BadEvidence(reason.to_string()),
        None => Error::Rpc(format!("{method} RPC call failed: {message}")),
    }
}

impl From<crate::plugin::Error> for Error {
    fn from(e: crate::plugin::Error) -> Self {
        match e {
            crate::plugin::Error::Remote { method, message } => {
                parse_remote_error(&method, &message)
            }
            other => Error::Rpc(other.to_string()),
        }
    }
}

impl From<crate::trust::Error> for Error {
    fn from(e: crate::trust::Error) -> Self {
        Error::Trust(e.to_string())
    }
}
