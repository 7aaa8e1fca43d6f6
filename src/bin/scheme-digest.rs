// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Plugin executable serving the DIGEST attestation scheme.  Copy it into the
//! verifier's plugin directory as `scheme-digest.plugin`.

use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use veraison_plugin::plugin::PluginHost;
use veraison_plugin::scheme::{self, DigestScheme};

fn main() {
    // stdout carries the RPC stream
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let mut host = PluginHost::new();

    if let Err(e) = scheme::register_scheme_implementation(&mut host, Arc::new(DigestScheme::new()))
    {
        eprintln!("registration failed: {e}");
        process::exit(1);
    }

    if let Err(e) = host.serve() {
        eprintln!("{e}");
        process::exit(1);
    }
}
