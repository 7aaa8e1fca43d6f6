// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use crate::plugin::Pluggable;
use crate::proto::{AttestationToken, Endorsement, EvidenceContext};
use crate::trust::AttestationResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claims decoded from evidence, plus the key under which the matching
/// endorsements are stored
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExtractedClaims {
    pub claims_set: Map<String, Value>,
    #[serde(default)]
    pub software_id: String,
}

/// Contract for attestation scheme implementations.  A verifier drives a
/// scheme through trust anchor lookup, claim extraction, integrity checking
/// and appraisal; the provisioning side uses the key synthesis methods.
pub trait Scheme: Pluggable {
    /// Store key of the trust anchor needed to verify `token`
    fn get_trust_anchor_id(&self, token: &AttestationToken) -> Result<String, Error>;

    fn extract_claims(
        &self,
        token: &AttestationToken,
        trust_anchor: &str,
    ) -> Result<ExtractedClaims, Error>;

    /// Check that `token` is authentic and has not been tampered with
    fn validate_evidence_integrity(
        &self,
        token: &AttestationToken,
        trust_anchor: &str,
        endorsements: &[String],
    ) -> Result<(), Error>;

    fn appraise_evidence(
        &self,
        ec: &EvidenceContext,
        endorsements: &[String],
    ) -> Result<AttestationResult, Error>;

    /// Store keys for a software component endorsement
    fn synth_keys_from_sw_component(
        &self,
        tenant_id: &str,
        endorsement: &Endorsement,
    ) -> Result<Vec<String>, Error>;

    /// Store keys for a trust anchor endorsement
    fn synth_keys_from_trust_anchor(
        &self,
        tenant_id: &str,
        endorsement: &Endorsement,
    ) -> Result<Vec<String>, Error>;
}
