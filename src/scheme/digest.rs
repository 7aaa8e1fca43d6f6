// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! A minimal attestation scheme: the attester signs a measurement digest of
//! its software with a per-node P-256 key, and the verifier compares the
//! digest against provisioned reference values.
//!
//! Evidence is the CBOR array `[claims, signature]` where `claims` is a byte
//! string wrapping the CBOR map `{"node-id": tstr, "digest": bstr}` and
//! `signature` is the raw `r || s` ECDSA P-256 signature over the SHA-256 of
//! `claims`.  Trust anchors are EC public keys in JWK form.

use super::descriptor::SchemeDescriptor;
use super::errors::Error;
use super::ischeme::{ExtractedClaims, Scheme};
use crate::bytes::{self, Bytes};
use crate::plugin::Pluggable;
use crate::proto::{
    AttestationToken, Endorsement, EvidenceContext, ENDORSEMENT_TYPE_REFERENCE_VALUE,
};
use crate::trust::{ARStatus, AttestationResult, Claim};
use ciborium::Value;
use jsonwebtoken::jwk;
use openssl::bn::{BigNum, BigNumContext};
use openssl::ec::{EcGroup, EcKey, EcKeyRef};
use openssl::ecdsa::EcdsaSig;
use openssl::nid::Nid;
use openssl::pkey::{HasPrivate, HasPublic, Public};
use openssl::sha::sha256;
use serde::{Deserialize, Serialize};
use serde_json::Map;
use tracing::warn;

pub const SCHEME_NAME: &str = "DIGEST";
pub const MEDIA_TYPE: &str = "application/vnd.veraison.digest+cbor";

/// endorsement attribute carrying the node identifier
pub const ATTR_NODE_ID: &str = "digest.node-id";
/// endorsement attribute carrying a hex-encoded reference digest
pub const ATTR_DIGEST: &str = "digest.digest";

const COORD_LEN: usize = 32;

pub const DESCRIPTOR: SchemeDescriptor = SchemeDescriptor {
    name: "veraison/digest",
    attestation_scheme: SCHEME_NAME,
    version_major: 1,
    version_minor: 0,
    evidence_media_types: &[MEDIA_TYPE],
};

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct DigestClaims {
    #[serde(rename = "node-id")]
    node_id: String,
    digest: Bytes,
}

#[derive(Debug)]
struct DigestToken {
    raw_claims: Vec<u8>,
    signature: Vec<u8>,
    claims: DigestClaims,
}

impl DigestToken {
    fn decode(data: &[u8]) -> Result<Self, Error> {
        let v: Value = ciborium::de::from_reader(data)
            .map_err(|e| Error::BadEvidence(format!("decoding CBOR: {e}")))?;

        let Value::Array(items) = v else {
            return Err(Error::BadEvidence("expecting a CBOR array".to_string()));
        };

        let [Value::Bytes(raw_claims), Value::Bytes(signature)] = items.as_slice() else {
            return Err(Error::BadEvidence(
                "expecting [claims: bstr, signature: bstr]".to_string(),
            ));
        };

        let claims: DigestClaims = ciborium::de::from_reader(raw_claims.as_slice())
            .map_err(|e| Error::BadEvidence(format!("decoding claims: {e}")))?;

        if claims.node_id.is_empty() {
            return Err(Error::BadEvidence("empty node-id".to_string()));
        }

        if !is_valid_digest(claims.digest.as_slice()) {
            return Err(Error::BadEvidence(format!(
                "digest has unsupported length {}",
                claims.digest.len()
            )));
        }

        Ok(Self {
            raw_claims: raw_claims.clone(),
            signature: signature.clone(),
            claims,
        })
    }

    fn verify(&self, key: &EcKeyRef<Public>) -> Result<(), Error> {
        if self.signature.len() != 2 * COORD_LEN {
            return Err(Error::BadEvidence(format!(
                "signature has length {}, want {}",
                self.signature.len(),
                2 * COORD_LEN
            )));
        }

        let (r, s) = self.signature.split_at(COORD_LEN);
        let r = BigNum::from_slice(r).map_err(|e| Error::Crypto(e.to_string()))?;
        let s = BigNum::from_slice(s).map_err(|e| Error::Crypto(e.to_string()))?;
        let sig =
            EcdsaSig::from_private_components(r, s).map_err(|e| Error::Crypto(e.to_string()))?;

        let verified = sig
            .verify(&sha256(&self.raw_claims), key)
            .map_err(|e| Error::Crypto(e.to_string()))?;

        if verified {
            Ok(())
        } else {
            Err(Error::BadEvidence("signature verification failed".to_string()))
        }
    }
}

fn is_valid_digest(d: &[u8]) -> bool {
    matches!(d.len(), 32 | 48 | 64)
}

fn lookup_key(tenant_id: &str, node_id: &str) -> String {
    format!("digest://{tenant_id}/{node_id}")
}

/// Decode a JWK EC public key on P-256
fn parse_trust_anchor(ta: &str) -> Result<EcKey<Public>, Error> {
    let jwk: jwk::Jwk =
        serde_json::from_str(ta).map_err(|e| Error::TrustAnchor(format!("parsing JWK: {e}")))?;

    let params = match jwk.algorithm {
        jwk::AlgorithmParameters::EllipticCurve(p) => p,
        a => {
            return Err(Error::TrustAnchor(format!(
                "unsupported algorithm params {a:?}"
            )))
        }
    };

    match params.curve {
        jwk::EllipticCurve::P256 => {}
        c => return Err(Error::TrustAnchor(format!("unsupported curve {c:?}"))),
    }

    let coord = |v: &str| -> Result<BigNum, Error> {
        let raw = bytes::decode_str(v).map_err(|e| Error::TrustAnchor(e.to_string()))?;
        BigNum::from_slice(&raw).map_err(|e| Error::Crypto(e.to_string()))
    };

    let group =
        EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).map_err(|e| Error::Crypto(e.to_string()))?;

    let x: BigNum = coord(&params.x)?;
    let y: BigNum = coord(&params.y)?;
    EcKey::from_public_key_affine_coordinates(&group, &x, &y)
        .map_err(|e| Error::TrustAnchor(format!("invalid public key: {e}")))
}

/// Build signed evidence for `node_id` and `digest` with `key`
pub fn sign_evidence<T: HasPrivate>(
    node_id: &str,
    digest: &[u8],
    key: &EcKeyRef<T>,
) -> Result<Vec<u8>, Error> {
    let claims = DigestClaims {
        node_id: node_id.to_string(),
        digest: Bytes::from(digest),
    };

    let mut raw_claims = Vec::new();
    ciborium::ser::into_writer(&claims, &mut raw_claims)
        .map_err(|e| Error::Crypto(format!("encoding claims: {e}")))?;

    let sig = EcdsaSig::sign(&sha256(&raw_claims), key).map_err(|e| Error::Crypto(e.to_string()))?;

    let mut signature = sig
        .r()
        .to_vec_padded(COORD_LEN as i32)
        .map_err(|e| Error::Crypto(e.to_string()))?;
    signature.extend(
        sig.s()
            .to_vec_padded(COORD_LEN as i32)
            .map_err(|e| Error::Crypto(e.to_string()))?,
    );

    let token = Value::Array(vec![Value::Bytes(raw_claims), Value::Bytes(signature)]);
    let mut out = Vec::new();
    ciborium::ser::into_writer(&token, &mut out)
        .map_err(|e| Error::Crypto(format!("encoding evidence: {e}")))?;

    Ok(out)
}

/// The public half of `key` as a JWK, suitable for a trust anchor store
pub fn public_jwk<T: HasPublic>(key: &EcKeyRef<T>) -> Result<String, Error> {
    let mut ctx = BigNumContext::new().map_err(|e| Error::Crypto(e.to_string()))?;
    let mut x = BigNum::new().map_err(|e| Error::Crypto(e.to_string()))?;
    let mut y = BigNum::new().map_err(|e| Error::Crypto(e.to_string()))?;

    key.public_key()
        .affine_coordinates_gfp(key.group(), &mut x, &mut y, &mut ctx)
        .map_err(|e| Error::Crypto(e.to_string()))?;

    let enc = |n: &BigNum| -> Result<String, Error> {
        n.to_vec_padded(COORD_LEN as i32)
            .map(|raw| bytes::encode_str(&raw))
            .map_err(|e| Error::Crypto(e.to_string()))
    };

    let jwk = serde_json::json!({
        "kty": "EC",
        "crv": "P-256",
        "x": enc(&x)?,
        "y": enc(&y)?,
    });

    Ok(jwk.to_string())
}

#[derive(Debug, Default)]
pub struct DigestScheme;

impl DigestScheme {
    pub fn new() -> Self {
        Self
    }

    fn decode(&self, token: &AttestationToken) -> Result<DigestToken, Error> {
        DESCRIPTOR.evidence_is_supported(token)?;
        DigestToken::decode(token.data.as_slice())
    }
}

impl Pluggable for DigestScheme {
    fn get_name(&self) -> String {
        DESCRIPTOR.name.to_string()
    }

    fn get_attestation_scheme(&self) -> String {
        DESCRIPTOR.attestation_scheme.to_string()
    }

    fn get_supported_media_types(&self) -> Vec<String> {
        DESCRIPTOR.media_types()
    }

    fn get_version(&self) -> String {
        DESCRIPTOR.version()
    }
}

impl Scheme for DigestScheme {
    fn get_trust_anchor_id(&self, token: &AttestationToken) -> Result<String, Error> {
        let t = self.decode(token)?;
        Ok(lookup_key(&token.tenant_id, &t.claims.node_id))
    }

    fn extract_claims(
        &self,
        token: &AttestationToken,
        _trust_anchor: &str,
    ) -> Result<ExtractedClaims, Error> {
        let t = self.decode(token)?;

        let mut claims_set = Map::new();
        claims_set.insert("node-id".to_string(), t.claims.node_id.clone().into());
        claims_set.insert(
            "digest".to_string(),
            hex::encode(t.claims.digest.as_slice()).into(),
        );
        if let Some(nonce) = &token.nonce {
            claims_set.insert(
                "nonce".to_string(),
                bytes::encode_str(nonce.as_slice()).into(),
            );
        }

        Ok(ExtractedClaims {
            claims_set,
            software_id: lookup_key(&token.tenant_id, &t.claims.node_id),
        })
    }

    fn validate_evidence_integrity(
        &self,
        token: &AttestationToken,
        trust_anchor: &str,
        _endorsements: &[String],
    ) -> Result<(), Error> {
        let t = self.decode(token)?;
        let key = parse_trust_anchor(trust_anchor)?;
        t.verify(&key)
    }

    fn appraise_evidence(
        &self,
        ec: &EvidenceContext,
        endorsements: &[String],
    ) -> Result<AttestationResult, Error> {
        let mut result = AttestationResult::new(ec);

        let digest = ec
            .evidence
            .get("digest")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| Error::BadEvidence("missing digest claim".to_string()))?
            .to_ascii_lowercase();

        let mut reference_digests = Vec::new();
        for e in endorsements {
            let e: Endorsement = match serde_json::from_str(e) {
                Ok(e) => e,
                Err(err) => {
                    warn!(error = %err, "malformed endorsement, appraisal not completed");
                    result.set_verifier_error();
                    return Ok(result);
                }
            };
            if e.endorsement_type != ENDORSEMENT_TYPE_REFERENCE_VALUE {
                continue;
            }
            if let Some(d) = e.attribute_str(ATTR_DIGEST) {
                reference_digests.push(d.to_ascii_lowercase());
            }
        }

        // integrity was checked before appraisal
        result.set_claim_status(Claim::InstanceIdentity, ARStatus::IDENT_AFFIRMING);

        let executables = if reference_digests.is_empty() {
            ARStatus::EXE_UNRECOGNIZED
        } else if reference_digests.contains(&digest) {
            ARStatus::EXE_AFFIRMING
        } else {
            ARStatus::EXE_CONTRAINDICATED
        };
        result.set_claim_status(Claim::Executables, executables);

        result.update_overall_status()?;

        Ok(result)
    }

    fn synth_keys_from_sw_component(
        &self,
        tenant_id: &str,
        endorsement: &Endorsement,
    ) -> Result<Vec<String>, Error> {
        synth_keys(tenant_id, endorsement)
    }

    fn synth_keys_from_trust_anchor(
        &self,
        tenant_id: &str,
        endorsement: &Endorsement,
    ) -> Result<Vec<String>, Error> {
        synth_keys(tenant_id, endorsement)
    }
}

fn synth_keys(tenant_id: &str, endorsement: &Endorsement) -> Result<Vec<String>, Error> {
    let node_id = match endorsement.attributes.get(ATTR_NODE_ID) {
        None => {
            return Err(Error::Endorsement(format!(
                "mandatory {ATTR_NODE_ID} is missing"
            )))
        }
        Some(v) => v.as_str().ok_or_else(|| {
            Error::Endorsement(format!("{ATTR_NODE_ID} must be a string, got {v}"))
        })?,
    };

    if node_id.is_empty() {
        return Err(Error::Endorsement(format!("mandatory {ATTR_NODE_ID} is empty")));
    }

    Ok(vec![lookup_key(tenant_id, node_id)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::TrustTier;
    use hex_literal::hex;
    use openssl::pkey::Private;
    use serde_json::json;

    const DIGEST_0: [u8; 32] =
        hex!("87428fc522803d31065e7bce3cf03fe475096631e5e07bbd7a0fde60c4cf25c7");
    const DIGEST_1: [u8; 32] =
        hex!("0263829989b6fd954f72baaf2fc64bc2e2f01d692d4de72986ea808f6e99813f");

    fn key() -> EcKey<Private> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        EcKey::generate(&group).unwrap()
    }

    fn token(data: Vec<u8>) -> AttestationToken {
        AttestationToken {
            tenant_id: "acme".into(),
            format: MEDIA_TYPE.into(),
            data: Bytes::from(data),
            nonce: None,
        }
    }

    fn refval(digest: &[u8]) -> String {
        json!({
            "scheme": SCHEME_NAME,
            "type": ENDORSEMENT_TYPE_REFERENCE_VALUE,
            "attributes": {
                ATTR_NODE_ID: "node-1",
                ATTR_DIGEST: hex::encode(digest),
            }
        })
        .to_string()
    }

    #[test]
    fn describe() {
        let s = DigestScheme::new();
        DESCRIPTOR.validate().unwrap();
        assert_eq!(s.get_name(), "veraison/digest");
        assert_eq!(s.get_attestation_scheme(), "DIGEST");
        assert_eq!(s.get_supported_media_types(), vec![MEDIA_TYPE]);
        assert_eq!(s.get_version(), "1.0");
    }

    #[test]
    fn verify_and_appraise_ok() {
        let k = key();
        let ta = public_jwk(&k).unwrap();
        let t = token(sign_evidence("node-1", &DIGEST_0, &k).unwrap());
        let s = DigestScheme::new();

        assert_eq!(s.get_trust_anchor_id(&t).unwrap(), "digest://acme/node-1");

        let claims = s.extract_claims(&t, &ta).unwrap();
        assert_eq!(claims.software_id, "digest://acme/node-1");
        assert_eq!(claims.claims_set["node-id"], "node-1");
        assert_eq!(claims.claims_set["digest"], hex::encode(DIGEST_0));
        assert!(!claims.claims_set.contains_key("nonce"));

        s.validate_evidence_integrity(&t, &ta, &[]).unwrap();

        let ec = EvidenceContext {
            tenant_id: "acme".into(),
            trust_anchor_id: "digest://acme/node-1".into(),
            software_id: claims.software_id,
            evidence: claims.claims_set,
        };

        let r = s
            .appraise_evidence(&ec, &[refval(&DIGEST_1), refval(&DIGEST_0)])
            .unwrap();
        assert_eq!(r.status, TrustTier::Affirming);
        assert_eq!(r.claim_status(Claim::Executables), ARStatus::EXE_AFFIRMING);
        assert_eq!(r.claim_status(Claim::InstanceIdentity), ARStatus::IDENT_AFFIRMING);

        let r = s.appraise_evidence(&ec, &[refval(&DIGEST_1)]).unwrap();
        assert_eq!(r.status, TrustTier::Contraindicated);
        assert_eq!(
            r.claim_status(Claim::Executables),
            ARStatus::EXE_CONTRAINDICATED
        );

        let r = s.appraise_evidence(&ec, &[]).unwrap();
        assert_eq!(r.status, TrustTier::Warning);
        assert_eq!(r.claim_status(Claim::Executables), ARStatus::EXE_UNRECOGNIZED);
    }

    #[test]
    fn wrong_key_fails_integrity() {
        let t = token(sign_evidence("node-1", &DIGEST_0, &key()).unwrap());
        let other = public_jwk(&key()).unwrap();
        let err = DigestScheme::new()
            .validate_evidence_integrity(&t, &other, &[])
            .unwrap_err();
        assert_eq!(
            err,
            Error::BadEvidence("signature verification failed".to_string())
        );
    }

    #[test]
    fn tampered_claims_fail_integrity() {
        let k = key();
        let ta = public_jwk(&k).unwrap();
        let data = sign_evidence("node-1", &DIGEST_0, &k).unwrap();

        let decoded: Value = ciborium::de::from_reader(data.as_slice()).unwrap();
        let Value::Array(mut items) = decoded else {
            panic!("not an array")
        };
        let forged = DigestClaims {
            node_id: "node-1".into(),
            digest: Bytes::from(DIGEST_1.as_slice()),
        };
        let mut raw = Vec::new();
        ciborium::ser::into_writer(&forged, &mut raw).unwrap();
        items[0] = Value::Bytes(raw);
        let mut data = Vec::new();
        ciborium::ser::into_writer(&Value::Array(items), &mut data).unwrap();

        let err = DigestScheme::new()
            .validate_evidence_integrity(&token(data), &ta, &[])
            .unwrap_err();
        assert!(err.is_bad_evidence());
    }

    #[test]
    fn malformed_evidence_is_bad_evidence() {
        let s = DigestScheme::new();
        for data in [vec![], vec![0xa0], hex!("8241004100").to_vec()] {
            let err = s.get_trust_anchor_id(&token(data)).unwrap_err();
            assert!(err.is_bad_evidence(), "{err:?}");
        }

        let mut t = token(sign_evidence("node-1", &DIGEST_0, &key()).unwrap());
        t.format = "application/json".into();
        assert!(s.extract_claims(&t, "").unwrap_err().is_bad_evidence());
    }

    #[test]
    fn short_digest_is_rejected() {
        let t = token(sign_evidence("node-1", &[0u8; 16], &key()).unwrap());
        let err = DigestScheme::new().get_trust_anchor_id(&t).unwrap_err();
        assert_eq!(
            err,
            Error::BadEvidence("digest has unsupported length 16".to_string())
        );
    }

    #[test]
    fn bad_trust_anchor() {
        let t = token(sign_evidence("node-1", &DIGEST_0, &key()).unwrap());
        let s = DigestScheme::new();
        assert!(matches!(
            s.validate_evidence_integrity(&t, "{}", &[]),
            Err(Error::TrustAnchor(_))
        ));

        let p384 = json!({"kty": "EC", "crv": "P-384", "x": "AA", "y": "AA"}).to_string();
        assert!(matches!(
            s.validate_evidence_integrity(&t, &p384, &[]),
            Err(Error::TrustAnchor(_))
        ));
    }

    #[test]
    fn malformed_endorsement_yields_verifier_error() {
        let ec = EvidenceContext {
            evidence: Map::from_iter([("digest".to_string(), json!(hex::encode(DIGEST_0)))]),
            ..Default::default()
        };
        let r = DigestScheme::new()
            .appraise_evidence(&ec, &["not json".to_string()])
            .unwrap();
        assert_eq!(r.status, TrustTier::None);
        assert_eq!(r.claim_status(Claim::Hardware), ARStatus::VERIFIER_ERROR);
    }

    #[test]
    fn nonce_is_carried_into_claims() {
        let k = key();
        let ta = public_jwk(&k).unwrap();
        let t = AttestationToken {
            nonce: Some(Bytes::from(vec![0xfb, 0xff, 0x00])),
            ..token(sign_evidence("node-1", &DIGEST_0, &k).unwrap())
        };
        let claims = DigestScheme::new().extract_claims(&t, &ta).unwrap();
        assert_eq!(claims.claims_set["nonce"], "-__A");
    }

    #[test]
    fn missing_digest_claim() {
        let err = DigestScheme::new()
            .appraise_evidence(&EvidenceContext::default(), &[])
            .unwrap_err();
        assert!(err.is_bad_evidence());
    }

    #[test]
    fn synth_keys() {
        let s = DigestScheme::new();
        let e = Endorsement {
            scheme: SCHEME_NAME.into(),
            endorsement_type: "verification-key".into(),
            attributes: json!({ ATTR_NODE_ID: "node-7" }),
            ..Default::default()
        };
        assert_eq!(
            s.synth_keys_from_trust_anchor("acme", &e).unwrap(),
            vec!["digest://acme/node-7"]
        );
        assert_eq!(
            s.synth_keys_from_sw_component("acme", &e).unwrap(),
            vec!["digest://acme/node-7"]
        );

        let missing = Endorsement {
            attributes: json!({}),
            ..e.clone()
        };
        assert_eq!(
            s.synth_keys_from_sw_component("acme", &missing).unwrap_err(),
            Error::Endorsement("mandatory digest.node-id is missing".into())
        );

        let numeric = Endorsement {
            attributes: json!({ ATTR_NODE_ID: 7 }),
            ..e.clone()
        };
        assert_eq!(
            s.synth_keys_from_sw_component("acme", &numeric).unwrap_err(),
            Error::Endorsement("digest.node-id must be a string, got 7".into())
        );

        let empty = Endorsement {
            attributes: json!({ ATTR_NODE_ID: "" }),
            ..e
        };
        assert_eq!(
            s.synth_keys_from_trust_anchor("acme", &empty).unwrap_err(),
            Error::Endorsement("mandatory digest.node-id is empty".into())
        );
    }
}
