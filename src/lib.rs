// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Pluggable attestation evidence appraisal.
//!
//! This crate provides the machinery a verifier uses to hand attestation
//! evidence to scheme-specific handlers that may live in separate plugin
//! executables, and the trust model those handlers report back in.
//!
//! The API allows:
//! * Serving one or more interface implementations from a plugin executable
//! * Discovering, handshaking with and closing plugin executables
//! * Routing requests to a plugin by name, media type or attestation scheme
//! * Appraising evidence into an AR4SI trust vector and overall trust tier
//!
//! See [AR4SI] for the trust claim definitions.
//!
//! [AR4SI]: https://datatracker.ietf.org/doc/draft-ietf-rats-ar4si/

pub mod bytes;
pub mod config;
pub mod plugin;
pub mod policy;
pub mod proto;
pub mod scheme;
pub mod store;
pub mod trust;
pub mod verifier;
