// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use super::ischeme::{ExtractedClaims, Scheme};
use crate::plugin::{
    decode_args, dispatch_pluggable, encode_reply, unknown_method, Client, Dispatch,
    DispatchError, Pluggable, RpcChannel,
};
use crate::proto::{AttestationToken, Endorsement, EvidenceContext};
use crate::trust::AttestationResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ExtractClaimsArgs {
    token: AttestationToken,
    trust_anchor: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ValidateEvidenceIntegrityArgs {
    token: AttestationToken,
    trust_anchor: String,
    endorsements: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct AppraiseEvidenceArgs {
    evidence_context: EvidenceContext,
    endorsements: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SynthKeysArgs {
    tenant_id: String,
    endorsement: Endorsement,
}

/// Host-side proxy for a scheme served by a plugin
pub struct SchemeRpcClient {
    client: Client,
}

impl SchemeRpcClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Pluggable for SchemeRpcClient {
    fn get_name(&self) -> String {
        self.client.get_name()
    }

    fn get_attestation_scheme(&self) -> String {
        self.client.get_attestation_scheme()
    }

    fn get_supported_media_types(&self) -> Vec<String> {
        self.client.get_supported_media_types()
    }

    fn get_version(&self) -> String {
        self.client.get_version()
    }
}

impl Scheme for SchemeRpcClient {
    fn get_trust_anchor_id(&self, token: &AttestationToken) -> Result<String, Error> {
        Ok(self.client.call("GetTrustAnchorID", token)?)
    }

    fn extract_claims(
        &self,
        token: &AttestationToken,
        trust_anchor: &str,
    ) -> Result<ExtractedClaims, Error> {
        let args = ExtractClaimsArgs {
            token: token.clone(),
            trust_anchor: trust_anchor.to_string(),
        };
        Ok(self.client.call("ExtractClaims", &args)?)
    }

    fn validate_evidence_integrity(
        &self,
        token: &AttestationToken,
        trust_anchor: &str,
        endorsements: &[String],
    ) -> Result<(), Error> {
        let args = ValidateEvidenceIntegrityArgs {
            token: token.clone(),
            trust_anchor: trust_anchor.to_string(),
            endorsements: endorsements.to_vec(),
        };
        Ok(self.client.call("ValidateEvidenceIntegrity", &args)?)
    }

    fn appraise_evidence(
        &self,
        ec: &EvidenceContext,
        endorsements: &[String],
    ) -> Result<AttestationResult, Error> {
        let args = AppraiseEvidenceArgs {
            evidence_context: ec.clone(),
            endorsements: endorsements.to_vec(),
        };
        Ok(self.client.call("AppraiseEvidence", &args)?)
    }

    fn synth_keys_from_sw_component(
        &self,
        tenant_id: &str,
        endorsement: &Endorsement,
    ) -> Result<Vec<String>, Error> {
        let args = SynthKeysArgs {
            tenant_id: tenant_id.to_string(),
            endorsement: endorsement.clone(),
        };
        Ok(self.client.call("SynthKeysFromSwComponent", &args)?)
    }

    fn synth_keys_from_trust_anchor(
        &self,
        tenant_id: &str,
        endorsement: &Endorsement,
    ) -> Result<Vec<String>, Error> {
        let args = SynthKeysArgs {
            tenant_id: tenant_id.to_string(),
            endorsement: endorsement.clone(),
        };
        Ok(self.client.call("SynthKeysFromTrustAnchor", &args)?)
    }
}

/// Plugin-side dispatcher for a scheme implementation
pub struct SchemeRpcServer {
    imp: Arc<dyn Scheme>,
}

impl SchemeRpcServer {
    pub fn new(imp: Arc<dyn Scheme>) -> Self {
        Self { imp }
    }
}

impl Dispatch for SchemeRpcServer {
    fn dispatch(&self, method: &str, args: &[u8]) -> Result<Vec<u8>, DispatchError> {
        if let Some(reply) = dispatch_pluggable(&*self.imp, method) {
            return reply;
        }

        match method {
            "Plugin.GetTrustAnchorID" => {
                let token: AttestationToken = decode_args(method, args)?;
                encode_reply(&self.imp.get_trust_anchor_id(&token)?)
            }
            "Plugin.ExtractClaims" => {
                let a: ExtractClaimsArgs = decode_args(method, args)?;
                encode_reply(&self.imp.extract_claims(&a.token, &a.trust_anchor)?)
            }
            "Plugin.ValidateEvidenceIntegrity" => {
                let a: ValidateEvidenceIntegrityArgs = decode_args(method, args)?;
                self.imp
                    .validate_evidence_integrity(&a.token, &a.trust_anchor, &a.endorsements)?;
                encode_reply(&())
            }
            "Plugin.AppraiseEvidence" => {
                let a: AppraiseEvidenceArgs = decode_args(method, args)?;
                encode_reply(&self.imp.appraise_evidence(&a.evidence_context, &a.endorsements)?)
            }
            "Plugin.SynthKeysFromSwComponent" => {
                let a: SynthKeysArgs = decode_args(method, args)?;
                encode_reply(&self.imp.synth_keys_from_sw_component(&a.tenant_id, &a.endorsement)?)
            }
            "Plugin.SynthKeysFromTrustAnchor" => {
                let a: SynthKeysArgs = decode_args(method, args)?;
                encode_reply(
                    &self
                        .imp
                        .synth_keys_from_trust_anchor(&a.tenant_id, &a.endorsement)?,
                )
            }
            _ => Err(unknown_method(method)),
        }
    }
}

fn get_scheme_client(client: Client) -> Arc<dyn Scheme> {
    Arc::new(SchemeRpcClient::new(client))
}

fn get_scheme_server(imp: Arc<dyn Scheme>) -> Box<dyn Dispatch> {
    Box::new(SchemeRpcServer::new(imp))
}

pub const SCHEME_RPC: RpcChannel<dyn Scheme> = RpcChannel {
    to_client: get_scheme_client,
    to_server: get_scheme_server,
};
