// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! End-to-end verification of a single attestation token: scheme routing by
//! media type, trust anchor and endorsement retrieval, integrity checking,
//! appraisal and optional policy evaluation.

use crate::plugin::{self, Manager};
use crate::policy::{self, IPolicyAgent, IPolicyStore, PolicyKey, DEFAULT_POLICY_NAME};
use crate::proto::{AppraisalContext, AttestationToken, EvidenceContext, MediaTypeList};
use crate::scheme::{self, Scheme};
use crate::store::{self, IEndorsementStore, ITrustAnchorStore};
use tracing::{debug, info, warn};

#[derive(thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("{0}")]
    Plugin(#[from] plugin::Error),
    #[error("{0}")]
    Scheme(#[from] scheme::Error),
    #[error("{0}")]
    Store(#[from] store::Error),
    #[error("{0}")]
    Policy(#[from] policy::Error),
    #[error("found {0} trust anchors, want 1")]
    TrustAnchorCount(usize),
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl Error {
    /// The attester submitted evidence the scheme rejected
    pub fn is_bad_evidence(&self) -> bool {
        matches!(self, Error::Scheme(e) if e.is_bad_evidence())
    }
}

pub struct Verifier {
    schemes: Box<dyn Manager<dyn Scheme>>,
    ta_store: Box<dyn ITrustAnchorStore>,
    en_store: Box<dyn IEndorsementStore>,
    policy: Option<(Box<dyn IPolicyStore>, Box<dyn IPolicyAgent>)>,
}

impl Verifier {
    pub fn new(
        schemes: Box<dyn Manager<dyn Scheme>>,
        ta_store: Box<dyn ITrustAnchorStore>,
        en_store: Box<dyn IEndorsementStore>,
    ) -> Self {
        Self {
            schemes,
            ta_store,
            en_store,
            policy: None,
        }
    }

    /// Evaluate each result against the tenant's active policy
    pub fn with_policy(
        mut self,
        store: Box<dyn IPolicyStore>,
        agent: Box<dyn IPolicyAgent>,
    ) -> Self {
        self.policy = Some((store, agent));
        self
    }

    pub fn supported_media_types(&self) -> MediaTypeList {
        MediaTypeList {
            media_types: self.schemes.get_registered_media_types(),
        }
    }

    pub fn is_supported_media_type(&self, media_type: &str) -> bool {
        self.schemes.is_registered_media_type(media_type)
    }

    pub fn get_attestation(&self, token: &AttestationToken) -> Result<AppraisalContext, Error> {
        let scheme = self.schemes.lookup_by_media_type(&token.format)?;

        let ta_id = scheme.get_trust_anchor_id(token)?;

        let tas = self.ta_store.get(&ta_id)?;
        let [ta] = tas.as_slice() else {
            return Err(Error::TrustAnchorCount(tas.len()));
        };

        let claims = scheme.extract_claims(token, ta)?;

        let endorsements = match self.en_store.get(&claims.software_id) {
            Ok(e) => e,
            Err(store::Error::NotFound(_)) => {
                debug!(software_id = %claims.software_id, "no endorsements");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        scheme.validate_evidence_integrity(token, ta, &endorsements)?;

        let ec = EvidenceContext {
            tenant_id: token.tenant_id.clone(),
            trust_anchor_id: ta_id,
            software_id: claims.software_id,
            evidence: claims.claims_set,
        };

        let mut result = scheme.appraise_evidence(&ec, &endorsements)?;

        if let Some((store, agent)) = &self.policy {
            let key = PolicyKey::new(
                &ec.tenant_id,
                &scheme.get_attestation_scheme(),
                DEFAULT_POLICY_NAME,
            );
            match store.get_active(&key)? {
                Some(p) => {
                    debug!(policy = %key, backend = %agent.get_backend_name(), "evaluating policy");
                    result = agent.evaluate(&p, result, &ec, &endorsements)?;
                    result.update_overall_status().map_err(scheme::Error::from)?;
                }
                None => debug!(policy = %key, "no active policy"),
            }
        }

        info!(
            tenant = %ec.tenant_id,
            media_type = %token.format,
            status = %result.status,
            "appraisal complete"
        );

        Ok(AppraisalContext {
            evidence: ec,
            result,
        })
    }

    pub fn close(&self) {
        if let Err(e) = self.schemes.close() {
            warn!(error = %e, "closing scheme plugins");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes::Bytes;
    use crate::plugin::BuiltinManager;
    use crate::policy::Policy;
    use crate::scheme::digest::{ATTR_DIGEST, ATTR_NODE_ID};
    use crate::scheme::{digest, DigestScheme};
    use crate::store::{MemoEndorsementStore, MemoTrustAnchorStore};
    use crate::trust::{ARStatus, AttestationResult, Claim, TrustTier};
    use openssl::ec::{EcGroup, EcKey};
    use openssl::nid::Nid;
    use openssl::pkey::Private;
    use serde_json::json;
    use std::sync::Arc;

    const GOOD: [u8; 32] = [0x11; 32];
    const EVIL: [u8; 32] = [0x66; 32];

    struct Fixture {
        key: EcKey<Private>,
        verifier: Verifier,
    }

    fn fixture(ta_count: usize) -> Fixture {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        let key = EcKey::generate(&group).unwrap();

        let tas = MemoTrustAnchorStore::new();
        for _ in 0..ta_count {
            tas.add("digest://acme/node-1", digest::public_jwk(&key).unwrap());
        }

        let ens = MemoEndorsementStore::new();
        ens.add(
            "digest://acme/node-1",
            json!({
                "scheme": "DIGEST",
                "type": "reference-value",
                "attributes": {
                    ATTR_NODE_ID: "node-1",
                    ATTR_DIGEST: hex::encode(GOOD),
                }
            })
            .to_string(),
        );

        let schemes =
            BuiltinManager::new(vec![Arc::new(DigestScheme::new()) as Arc<dyn Scheme>]).unwrap();

        Fixture {
            key,
            verifier: Verifier::new(Box::new(schemes), Box::new(tas), Box::new(ens)),
        }
    }

    fn token(f: &Fixture, node_id: &str, measurement: &[u8]) -> AttestationToken {
        AttestationToken {
            tenant_id: "acme".into(),
            format: digest::MEDIA_TYPE.into(),
            data: Bytes::from(digest::sign_evidence(node_id, measurement, &f.key).unwrap()),
            nonce: None,
        }
    }

    #[test]
    fn appraise_matching_digest() {
        let f = fixture(1);
        let ac = f.verifier.get_attestation(&token(&f, "node-1", &GOOD)).unwrap();
        assert_eq!(ac.result.status, TrustTier::Affirming);
        assert_eq!(ac.evidence.trust_anchor_id, "digest://acme/node-1");
        assert_eq!(ac.evidence.software_id, "digest://acme/node-1");
        assert_eq!(ac.result.processed_evidence["digest"], hex::encode(GOOD));
    }

    #[test]
    fn appraise_unknown_digest() {
        let f = fixture(1);
        let ac = f.verifier.get_attestation(&token(&f, "node-1", &EVIL)).unwrap();
        assert_eq!(ac.result.status, TrustTier::Contraindicated);
    }

    #[test]
    fn trust_anchor_must_be_unique() {
        let f = fixture(2);
        let err = f
            .verifier
            .get_attestation(&token(&f, "node-1", &GOOD))
            .unwrap_err();
        assert_eq!(err.to_string(), "found 2 trust anchors, want 1");
    }

    #[test]
    fn unknown_node() {
        let f = fixture(1);
        let err = f
            .verifier
            .get_attestation(&token(&f, "node-9", &GOOD))
            .unwrap_err();
        assert!(matches!(err, Error::Store(store::Error::NotFound(_))));
    }

    #[test]
    fn unsupported_media_type() {
        let f = fixture(1);
        let mut t = token(&f, "node-1", &GOOD);
        t.format = "application/eat+cwt".into();
        let err = f.verifier.get_attestation(&t).unwrap_err();
        assert!(matches!(err, Error::Plugin(plugin::Error::NotFound(_))));
        assert!(!f.verifier.is_supported_media_type("application/eat+cwt"));
        assert_eq!(
            f.verifier.supported_media_types().media_types,
            vec![digest::MEDIA_TYPE]
        );
    }

    #[test]
    fn bad_evidence_is_flagged() {
        let f = fixture(1);
        let t = AttestationToken {
            data: Bytes::from(vec![0x80]),
            ..token(&f, "node-1", &GOOD)
        };
        assert!(f.verifier.get_attestation(&t).unwrap_err().is_bad_evidence());
    }

    struct Store(Option<Policy>);

    impl IPolicyStore for Store {
        fn get_active(&self, key: &PolicyKey) -> Result<Option<Policy>, policy::Error> {
            Ok(self.0.clone().filter(|p| p.key == *key))
        }
    }

    // flags the hardware as unsafe whatever the evidence says
    struct Paranoid;

    impl IPolicyAgent for Paranoid {
        fn get_backend_name(&self) -> String {
            "paranoid".into()
        }

        fn evaluate(
            &self,
            _policy: &Policy,
            mut result: AttestationResult,
            _evidence: &EvidenceContext,
            _endorsements: &[String],
        ) -> Result<AttestationResult, policy::Error> {
            result.set_claim_status(Claim::Hardware, ARStatus::HW_UNSAFE);
            Ok(result)
        }
    }

    #[test]
    fn active_policy_is_applied() {
        let f = fixture(1);
        let policy = Policy {
            key: PolicyKey::new("acme", "DIGEST", DEFAULT_POLICY_NAME),
            rules: String::new(),
            version: 1,
            active: true,
        };
        let Fixture { key, verifier } = f;
        let verifier = verifier.with_policy(Box::new(Store(Some(policy))), Box::new(Paranoid));
        let f = Fixture { key, verifier };

        let ac = f.verifier.get_attestation(&token(&f, "node-1", &GOOD)).unwrap();
        assert_eq!(ac.result.status, TrustTier::Warning);
        assert_eq!(ac.result.claim_status(Claim::Hardware), ARStatus::HW_UNSAFE);
    }

    #[test]
    fn no_active_policy() {
        let Fixture { key, verifier } = fixture(1);
        let verifier = verifier.with_policy(Box::new(Store(None)), Box::new(Paranoid));
        let f = Fixture { key, verifier };

        let ac = f.verifier.get_attestation(&token(&f, "node-1", &GOOD)).unwrap();
        assert_eq!(ac.result.status, TrustTier::Affirming);
    }
}
