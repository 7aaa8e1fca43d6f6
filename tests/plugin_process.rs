// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

#![cfg(unix)]

use openssl::ec::{EcGroup, EcKey};
use openssl::nid::Nid;
use serde_json::json;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use veraison_plugin::bytes::Bytes;
use veraison_plugin::config::Config;
use veraison_plugin::plugin::Manager;
use veraison_plugin::proto::{AttestationToken, Endorsement};
use veraison_plugin::scheme::{self, digest, Scheme};
use veraison_plugin::store::{MemoEndorsementStore, MemoTrustAnchorStore};
use veraison_plugin::trust::TrustTier;
use veraison_plugin::verifier::Verifier;

const MEASUREMENT: [u8; 32] = [0x5a; 32];

fn populate(dir: &Path) {
    fs::copy(
        env!("CARGO_BIN_EXE_scheme-digest"),
        dir.join("scheme-digest.plugin"),
    )
    .unwrap();

    // speaks something other than the handshake
    let bogus = dir.join("bogus.plugin");
    fs::write(&bogus, "#!/bin/sh\necho hello\nsleep 5\n").unwrap();
    fs::set_permissions(&bogus, fs::Permissions::from_mode(0o755)).unwrap();

    // not a plugin
    fs::write(dir.join("notes.txt"), "ignored").unwrap();
}

fn config(dir: &Path) -> Config {
    let path = dir.join("config.toml");
    fs::write(
        &path,
        format!(
            "[plugin]\nbackend = \"go-plugin\"\n\n\
             [go-plugin]\ndir = {:?}\nhandshake-timeout-ms = 10000\n",
            dir.display().to_string()
        ),
    )
    .unwrap();
    Config::from_file(&path).unwrap()
}

#[test]
fn appraise_through_plugin_process() {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path());

    let schemes = scheme::create_scheme_manager(&config(dir.path())).unwrap();
    assert_eq!(schemes.get_registered_media_types(), vec![digest::MEDIA_TYPE]);
    assert_eq!(
        schemes.get_registered_attestation_schemes(),
        vec![digest::SCHEME_NAME]
    );

    let s = schemes.lookup_by_name("veraison/digest").unwrap();
    let e = Endorsement {
        scheme: digest::SCHEME_NAME.into(),
        endorsement_type: "reference-value".into(),
        sub_type: String::new(),
        attributes: json!({ "digest.node-id": "node-1" }),
    };
    let rv_keys = s.synth_keys_from_sw_component("acme", &e).unwrap();
    assert_eq!(rv_keys, vec!["digest://acme/node-1"]);

    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let key = EcKey::generate(&group).unwrap();

    let tas = MemoTrustAnchorStore::new();
    tas.add(&rv_keys[0], digest::public_jwk(&key).unwrap());

    let ens = MemoEndorsementStore::new();
    ens.add(
        &rv_keys[0],
        json!({
            "scheme": digest::SCHEME_NAME,
            "type": "reference-value",
            "attributes": {
                "digest.node-id": "node-1",
                "digest.digest": hex::encode(MEASUREMENT),
            }
        })
        .to_string(),
    );

    let verifier = Verifier::new(schemes, Box::new(tas), Box::new(ens));
    let token = AttestationToken {
        tenant_id: "acme".into(),
        format: digest::MEDIA_TYPE.into(),
        data: Bytes::from(digest::sign_evidence("node-1", &MEASUREMENT, &key).unwrap()),
        nonce: None,
    };

    let ac = verifier.get_attestation(&token).unwrap();
    assert_eq!(ac.result.status, TrustTier::Affirming);
    assert_eq!(ac.evidence.software_id, "digest://acme/node-1");

    let garbage = AttestationToken {
        data: Bytes::from(vec![0xff]),
        ..token
    };
    assert!(verifier.get_attestation(&garbage).unwrap_err().is_bad_evidence());

    verifier.close();
}
