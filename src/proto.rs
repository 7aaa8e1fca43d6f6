// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Data exchanged between the verifier and attestation scheme
//! implementations.  Every type here travels as JSON across the plugin
//! boundary.

use crate::bytes::Bytes;
use crate::trust::AttestationResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Evidence as submitted by an attester, tagged with its media type
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AttestationToken {
    pub tenant_id: String,
    /// media type of `data`
    pub format: String,
    pub data: Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<Bytes>,
}

/// Evidence claims extracted by a scheme, together with the keys the verifier
/// needs to fetch trust anchors and endorsements
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EvidenceContext {
    pub tenant_id: String,
    pub trust_anchor_id: String,
    pub software_id: String,
    pub evidence: Map<String, Value>,
}

/// Output of a complete verification
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppraisalContext {
    pub evidence: EvidenceContext,
    pub result: AttestationResult,
}

/// Provisioned endorsement (reference value or verification key material)
/// as handed to a scheme for key synthesis, and as stored by the
/// endorsement store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Endorsement {
    pub scheme: String,
    #[serde(rename = "type")]
    pub endorsement_type: String,
    #[serde(rename = "subType", default, skip_serializing_if = "String::is_empty")]
    pub sub_type: String,
    pub attributes: Value,
}

pub const ENDORSEMENT_TYPE_REFERENCE_VALUE: &str = "reference-value";

impl Endorsement {
    /// String value of the attribute `name`, if present
    pub fn attribute_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MediaTypeList {
    pub media_types: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn token_json() {
        let t = AttestationToken {
            tenant_id: "0".into(),
            format: "application/vnd.example".into(),
            data: Bytes::from(vec![0xde, 0xad]),
            nonce: None,
        };
        let j = serde_json::to_value(&t).unwrap();
        assert_eq!(
            j,
            json!({"tenant-id": "0", "format": "application/vnd.example", "data": "3q0"})
        );
    }

    #[test]
    fn endorsement_json() {
        let j = json!({
            "scheme": "DIGEST",
            "type": "reference-value",
            "attributes": { "digest.node-id": "n1" }
        });
        let e: Endorsement = serde_json::from_value(j).unwrap();
        assert_eq!(e.endorsement_type, ENDORSEMENT_TYPE_REFERENCE_VALUE);
        assert_eq!(e.sub_type, "");
        assert_eq!(e.attribute_str("digest.node-id"), Some("n1"));
        assert_eq!(e.attribute_str("digest.missing"), None);
    }
}
