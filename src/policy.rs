// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Interfaces to the policy engine that may adjust an attestation result
//! after a scheme has appraised the evidence.  Policy languages and storage
//! backends live outside this crate.

use crate::proto::EvidenceContext;
use crate::trust::AttestationResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the policy looked up for every tenant and scheme
pub const DEFAULT_POLICY_NAME: &str = "default";

#[derive(thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("policy store: {0}")]
    Store(String),
    #[error("policy evaluation: {0}")]
    Evaluation(String),
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PolicyKey {
    pub tenant_id: String,
    pub scheme: String,
    pub name: String,
}

impl PolicyKey {
    pub fn new(tenant_id: &str, scheme: &str, name: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            scheme: scheme.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for PolicyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.tenant_id, self.scheme, self.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Policy {
    pub key: PolicyKey,
    /// policy source, opaque to this crate
    pub rules: String,
    pub version: u32,
    pub active: bool,
}

pub trait IPolicyStore: Send + Sync {
    /// The active policy for `key`, if any
    fn get_active(&self, key: &PolicyKey) -> Result<Option<Policy>, Error>;
}

pub trait IPolicyAgent: Send + Sync {
    fn get_backend_name(&self) -> String;

    /// Apply `policy` to `result`, returning the updated result
    fn evaluate(
        &self,
        policy: &Policy,
        result: AttestationResult,
        evidence: &EvidenceContext,
        endorsements: &[String],
    ) -> Result<AttestationResult, Error>;
}
