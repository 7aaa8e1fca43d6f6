// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;

/// Interface to the store where endorsements (reference values and the like)
/// are stashed, indexed by software identity.
pub trait IEndorsementStore: Send + Sync {
    /// Every endorsement stored under `key`.  An unknown key is reported as
    /// [`Error::NotFound`].
    fn get(&self, key: &str) -> Result<Vec<String>, Error>;
}
