// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Host/loader handshake.
//!
//! The loader launches a plugin with the magic cookie in its environment.  A
//! plugin that finds the cookie writes a single announcement line on stdout
//! before switching to framed RPC:
//!
//! ```text
//! <protocol-version>|stdio|<kind>[,<kind>...]
//! ```
//!
//! Anything else on the first line (or nothing within the handshake timeout)
//! fails the handshake.

use super::errors::Error;

/// Shared constants both sides of the handshake must agree on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandshakeConfig {
    pub protocol_version: u32,
    pub magic_cookie_key: &'static str,
    pub magic_cookie_value: &'static str,
}

pub const HANDSHAKE: HandshakeConfig = HandshakeConfig {
    protocol_version: 1,
    magic_cookie_key: "VERAISON_PLUGIN",
    magic_cookie_value: "VERAISON",
};

const NETWORK: &str = "stdio";

/// Longest announcement line accepted from a plugin
pub(crate) const MAX_ANNOUNCEMENT_LEN: usize = 4096;

/// What a plugin declares about itself on startup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Announcement {
    pub protocol_version: u32,
    pub kinds: Vec<String>,
}

impl Announcement {
    pub fn new(kinds: Vec<String>) -> Self {
        Self {
            protocol_version: HANDSHAKE.protocol_version,
            kinds,
        }
    }

    pub fn to_line(&self) -> String {
        format!(
            "{}|{}|{}\n",
            self.protocol_version,
            NETWORK,
            self.kinds.join(",")
        )
    }

    /// Parse and check an announcement line against [`HANDSHAKE`]
    pub fn parse(line: &str) -> Result<Self, Error> {
        let line = line.trim_end_matches(['\r', '\n']);
        let parts: Vec<&str> = line.split('|').collect();

        let [version, network, kinds] = parts.as_slice() else {
            return Err(Error::Handshake(format!(
                "malformed announcement {line:?}"
            )));
        };

        let protocol_version: u32 = version.parse().map_err(|_| {
            Error::Handshake(format!("malformed protocol version {version:?}"))
        })?;

        if protocol_version != HANDSHAKE.protocol_version {
            return Err(Error::Handshake(format!(
                "incompatible protocol version {protocol_version}, want {}",
                HANDSHAKE.protocol_version
            )));
        }

        if *network != NETWORK {
            return Err(Error::Handshake(format!(
                "unsupported network {network:?}"
            )));
        }

        let kinds: Vec<String> = kinds
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect();

        if kinds.is_empty() {
            return Err(Error::Handshake("no plugin kinds announced".to_string()));
        }

        Ok(Self {
            protocol_version,
            kinds,
        })
    }
}
