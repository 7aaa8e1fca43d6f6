// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use super::status::ARStatus;
use super::tier::TrustTier;
use super::vector::{Claim, TrustVector};
use crate::proto::EvidenceContext;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Outcome of appraising one piece of evidence
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AttestationResult {
    pub status: TrustTier,
    pub trust_vector: TrustVector,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub processed_evidence: Map<String, Value>,
}

impl AttestationResult {
    /// Fresh result for the given evidence: every claim is NO_CLAIM, the
    /// overall status is NONE and the extracted claims are carried over.
    pub fn new(ec: &EvidenceContext) -> Self {
        Self {
            status: TrustTier::None,
            trust_vector: TrustVector::default(),
            timestamp: Utc::now(),
            processed_evidence: ec.evidence.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.trust_vector.validate()
    }

    /// Tier of each claim, keyed by claim name.  Fails if any claim is out of
    /// range.
    pub fn get_trust_vector_tiers(&self) -> Result<BTreeMap<String, TrustTier>, Error> {
        self.validate()?;

        Ok(Claim::ALL
            .iter()
            .map(|c| (c.name().to_string(), self.trust_vector.get(*c).get_tier()))
            .collect())
    }

    /// Raise the overall status to the worst tier found in the trust vector.
    /// The status is never lowered, and NONE claims are ignored.
    pub fn update_overall_status(&mut self) -> Result<(), Error> {
        self.validate()?;

        let worst = self.trust_vector.worst_tier();
        if worst > self.status {
            self.status = worst;
        }

        Ok(())
    }

    /// Mark the appraisal as not completed: status stays NONE and every claim
    /// carries VERIFIER_ERROR.
    pub fn set_verifier_error(&mut self) {
        self.status = TrustTier::None;
        self.trust_vector.set_all(ARStatus::VERIFIER_ERROR);
    }

    pub fn claim_status(&self, claim: Claim) -> ARStatus {
        self.trust_vector.get(claim)
    }

    pub fn set_claim_status(&mut self, claim: Claim, status: ARStatus) {
        self.trust_vector.set(claim, status);
    }

    /// The trust vector in EAR form, for callers that emit EAR tokens
    pub fn ear_trust_vector(&self) -> ear::TrustVector {
        ear::TrustVector::from(&self.trust_vector)
    }
}
