// Copyright 2023-2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;

/// Interface to the store where trust anchors are stashed, indexed by the key
/// a scheme synthesised for them.
pub trait ITrustAnchorStore: Send + Sync {
    /// Every trust anchor stored under `key`.  An unknown key is an error.
    fn get(&self, key: &str) -> Result<Vec<String>, Error>;
}
