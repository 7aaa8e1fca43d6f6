// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use std::error::Error;
use std::fs;
use tracing_subscriber::EnvFilter;
use veraison_plugin::bytes::Bytes;
use veraison_plugin::config::Config;
use veraison_plugin::plugin::Manager;
use veraison_plugin::proto::{AppraisalContext, AttestationToken, Endorsement};
use veraison_plugin::scheme::{self, digest, Scheme};
use veraison_plugin::store::{MemoEndorsementStore, MemoTrustAnchorStore};
use veraison_plugin::verifier::Verifier;

#[derive(Parser)]
enum VeraisonPluginCli {
    MediaTypes(ListArgs),
    Schemes(ListArgs),
    Appraise(AppraiseArgs),
    Keys(KeysArgs),
}

#[derive(Debug, clap::Args)]
#[command(author, version, long_about = None,
    about = "List what the configured scheme plugins support")]
struct ListArgs {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Debug, clap::Args)]
#[command(author, version, long_about = None,
    about = "Verify and appraise the supplied evidence using the scheme \
    plugin registered for its media type")]
struct AppraiseArgs {
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[arg(short, long, default_value = "token.cbor")]
    evidence: String,

    #[arg(short, long, default_value = digest::MEDIA_TYPE)]
    media_type: String,

    #[arg(long, default_value = "0")]
    tenant: String,

    #[arg(short, long, default_value = "tastore.json")]
    tastore: String,

    #[arg(long, default_value = "enstore.json")]
    enstore: String,

    /// base64url-encoded challenge the evidence is bound to
    #[arg(short, long)]
    nonce: Option<String>,
}

#[derive(Debug, clap::Args)]
#[command(author, version, long_about = None,
    about = "Print the store keys a scheme plugin derives for the supplied \
    endorsement")]
struct KeysArgs {
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[arg(short, long, default_value = "endorsement.json")]
    endorsement: String,

    #[arg(long, default_value = "0")]
    tenant: String,

    /// treat the endorsement as a trust anchor rather than a reference value
    #[arg(long)]
    trust_anchor: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match VeraisonPluginCli::parse() {
        VeraisonPluginCli::MediaTypes(args) => match list(&args, |m| {
            m.get_registered_media_types()
        }) {
            Ok(v) => v.iter().for_each(|t| println!("{t}")),
            Err(e) => eprintln!("listing media types failed: {e}"),
        },

        VeraisonPluginCli::Schemes(args) => match list(&args, |m| {
            m.get_registered_attestation_schemes()
        }) {
            Ok(v) => v.iter().for_each(|s| println!("{s}")),
            Err(e) => eprintln!("listing schemes failed: {e}"),
        },

        VeraisonPluginCli::Appraise(args) => match appraise(&args) {
            Ok(ac) => match serde_json::to_string_pretty(&ac) {
                Ok(j) => println!("{j}"),
                Err(e) => eprintln!("appraisal failed: {e}"),
            },
            Err(e) => eprintln!("appraisal failed: {e}"),
        },

        VeraisonPluginCli::Keys(args) => match keys(&args) {
            Ok(v) => v.iter().for_each(|k| println!("{k}")),
            Err(e) => eprintln!("key synthesis failed: {e}"),
        },
    }
}

fn load_manager(config: &str) -> Result<Box<dyn Manager<dyn Scheme>>, Box<dyn Error>> {
    let cfg = Config::from_file(config)?;
    Ok(scheme::create_scheme_manager(&cfg)?)
}

fn list<F>(args: &ListArgs, what: F) -> Result<Vec<String>, Box<dyn Error>>
where
    F: FnOnce(&dyn Manager<dyn Scheme>) -> Vec<String>,
{
    let m = load_manager(&args.config)?;
    let v = what(m.as_ref());
    m.close()?;
    Ok(v)
}

fn appraise(args: &AppraiseArgs) -> Result<AppraisalContext, Box<dyn Error>> {
    let mut tas = MemoTrustAnchorStore::new();
    tas.load_json(&fs::read_to_string(&args.tastore)?)?;

    let mut ens = MemoEndorsementStore::new();
    ens.load_json(&fs::read_to_string(&args.enstore)?)?;

    let token = AttestationToken {
        tenant_id: args.tenant.clone(),
        format: args.media_type.clone(),
        data: Bytes::from(fs::read(&args.evidence)?),
        nonce: args.nonce.as_deref().map(Bytes::try_from).transpose()?,
    };

    let v = Verifier::new(load_manager(&args.config)?, Box::new(tas), Box::new(ens));
    let res = v.get_attestation(&token);
    v.close();

    Ok(res?)
}

fn keys(args: &KeysArgs) -> Result<Vec<String>, Box<dyn Error>> {
    let e: Endorsement = serde_json::from_str(&fs::read_to_string(&args.endorsement)?)?;

    let m = load_manager(&args.config)?;
    let res = m.lookup_by_attestation_scheme(&e.scheme).map(|s| {
        if args.trust_anchor {
            s.synth_keys_from_trust_anchor(&args.tenant, &e)
        } else {
            s.synth_keys_from_sw_component(&args.tenant, &e)
        }
    });
    m.close()?;

    Ok(res??)
}
