// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Attestation scheme contract and its plugin plumbing.
//!
//! A scheme implementation is written once against [`Scheme`] and can then be
//! served from a plugin executable (see [`register_scheme_implementation`])
//! or compiled into the verifier (see [`builtin_schemes`]).

pub use self::descriptor::SchemeDescriptor;
pub use self::digest::DigestScheme;
pub use self::errors::{parse_remote_error, Error};
pub use self::ischeme::{ExtractedClaims, Scheme};
pub use self::rpc::{SchemeRpcClient, SchemeRpcServer, SCHEME_RPC};

pub mod digest;

mod descriptor;
mod errors;
mod ischeme;
mod rpc;

use crate::config::Config;
use crate::plugin::{self, create_manager, Manager, PluginHost};
use std::sync::Arc;

/// Plugin kind under which scheme implementations are announced
pub const KIND: &str = "scheme-handler";

/// Make `imp` available from this plugin process
pub fn register_scheme_implementation(
    host: &mut PluginHost,
    imp: Arc<dyn Scheme>,
) -> Result<(), plugin::Error> {
    host.register_implementation(KIND, imp, &SCHEME_RPC)
}

/// Scheme implementations compiled into this crate
pub fn builtin_schemes() -> Vec<Arc<dyn Scheme>> {
    vec![Arc::new(DigestScheme::new())]
}

/// Scheme manager for the configured backend
pub fn create_scheme_manager(cfg: &Config) -> Result<Box<dyn Manager<dyn Scheme>>, plugin::Error> {
    create_manager(cfg, KIND, SCHEME_RPC, builtin_schemes())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::bytes::Bytes;
    use crate::config::{Backend, LoaderConfig};
    use crate::plugin::{Loader, PluginManager, Pluggable};
    use crate::proto::{AttestationToken, EvidenceContext};
    use crate::trust::TrustTier;
    use openssl::ec::{EcGroup, EcKey};
    use openssl::nid::Nid;
    use std::os::unix::net::UnixStream;
    use std::thread;
    use std::time::Duration;

    fn serve_digest_in_process(loader: &mut Loader) -> thread::JoinHandle<()> {
        let (to_plugin, plugin_in) = UnixStream::pair().unwrap();
        let (plugin_out, from_plugin) = UnixStream::pair().unwrap();

        let mut host = PluginHost::new();
        register_scheme_implementation(&mut host, Arc::new(DigestScheme::new())).unwrap();
        let served = thread::spawn(move || host.serve_on(plugin_in, plugin_out).unwrap());

        loader.attach("digest", from_plugin, to_plugin).unwrap();
        served
    }

    #[test]
    fn scheme_over_rpc() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = Loader::new(&LoaderConfig::with_dir(dir.path())).unwrap();
        let served = serve_digest_in_process(&mut loader);

        let m = PluginManager::with_loader(loader, KIND, SCHEME_RPC).unwrap();
        assert_eq!(m.get_registered_media_types(), vec![digest::MEDIA_TYPE]);
        assert_eq!(m.get_registered_attestation_schemes(), vec![digest::SCHEME_NAME]);

        let s = m.lookup_by_media_type(digest::MEDIA_TYPE).unwrap();
        assert_eq!(s.get_version(), "1.0");

        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        let key = EcKey::generate(&group).unwrap();
        let ta = digest::public_jwk(&key).unwrap();
        let token = AttestationToken {
            tenant_id: "acme".into(),
            format: digest::MEDIA_TYPE.into(),
            data: Bytes::from(digest::sign_evidence("node-1", &[7u8; 32], &key).unwrap()),
            nonce: None,
        };

        let ta_id = s.get_trust_anchor_id(&token).unwrap();
        assert_eq!(ta_id, "digest://acme/node-1");

        let claims = s.extract_claims(&token, &ta).unwrap();
        s.validate_evidence_integrity(&token, &ta, &[]).unwrap();

        let ec = EvidenceContext {
            tenant_id: "acme".into(),
            trust_anchor_id: ta_id,
            software_id: claims.software_id,
            evidence: claims.claims_set,
        };
        let r = s.appraise_evidence(&ec, &[]).unwrap();
        assert_eq!(r.status, TrustTier::Warning);
        assert_eq!(r.processed_evidence, ec.evidence);

        // evidence errors keep their kind across the boundary
        let bad = AttestationToken {
            data: Bytes::from(vec![0xa0]),
            ..token.clone()
        };
        assert!(s.get_trust_anchor_id(&bad).unwrap_err().is_bad_evidence());

        let other = digest::public_jwk(&EcKey::generate(&group).unwrap()).unwrap();
        assert_eq!(
            s.validate_evidence_integrity(&token, &other, &[]),
            Err(Error::BadEvidence("signature verification failed".into()))
        );

        m.close().unwrap();
        served.join().unwrap();
    }

    #[test]
    fn broken_connection() {
        let (to_plugin, plugin_in) = UnixStream::pair().unwrap();
        let (plugin_out, from_plugin) = UnixStream::pair().unwrap();
        drop(plugin_in);
        drop(plugin_out);

        let transport = plugin::Transport::new(
            "gone",
            from_plugin,
            to_plugin,
            Some(Duration::from_secs(1)),
        );
        let s = (SCHEME_RPC.to_client)(plugin::Client::new(transport, KIND));

        assert_eq!(s.get_name(), "");
        assert_eq!(s.get_attestation_scheme(), "");
        assert!(s.get_supported_media_types().is_empty());
        assert_eq!(s.get_version(), "");

        let err = s
            .appraise_evidence(&EvidenceContext::default(), &[])
            .unwrap_err();
        assert!(matches!(err, Error::Rpc(_)), "{err:?}");
        assert!(!err.is_bad_evidence());
    }

    #[test]
    fn builtin_backend() {
        let cfg = Config {
            plugin: crate::config::PluginConfig {
                backend: Backend::Builtin,
            },
            ..Default::default()
        };
        let m = create_scheme_manager(&cfg).unwrap();
        assert!(m.is_registered_media_type(digest::MEDIA_TYPE));
        assert_eq!(
            m.lookup_by_attestation_scheme("DIGEST").unwrap().get_name(),
            "veraison/digest"
        );
        m.close().unwrap();
    }
}
