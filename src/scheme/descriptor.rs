// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use crate::proto::AttestationToken;

/// Static identity of a scheme implementation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemeDescriptor {
    pub name: &'static str,
    pub attestation_scheme: &'static str,
    pub version_major: u32,
    pub version_minor: u32,
    pub evidence_media_types: &'static [&'static str],
}

impl SchemeDescriptor {
    pub fn version(&self) -> String {
        format!("{}.{}", self.version_major, self.version_minor)
    }

    pub fn media_types(&self) -> Vec<String> {
        self.evidence_media_types
            .iter()
            .map(|m| m.to_string())
            .collect()
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.name.is_empty() {
            return Err(Error::Rpc("scheme descriptor has no name".to_string()));
        }
        if self.attestation_scheme.is_empty() {
            return Err(Error::Rpc(format!("{}: no attestation scheme", self.name)));
        }
        if self.evidence_media_types.is_empty() {
            return Err(Error::Rpc(format!("{}: no evidence media types", self.name)));
        }
        Ok(())
    }

    /// Reject tokens whose media type this scheme does not handle
    pub fn evidence_is_supported(&self, token: &AttestationToken) -> Result<(), Error> {
        if self.evidence_media_types.contains(&token.format.as_str()) {
            Ok(())
        } else {
            Err(Error::BadEvidence(format!(
                "wrong media type: expect one of {:?}, got {:?}",
                self.evidence_media_types, token.format
            )))
        }
    }
}
