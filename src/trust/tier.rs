// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse classification of a trustworthiness claim.  Variants are declared in
/// ascending order of severity so that `Ord` can be used to pick the worst.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustTier {
    #[default]
    None,
    Affirming,
    Warning,
    Contraindicated,
}

impl fmt::Display for TrustTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrustTier::None => "NONE",
            TrustTier::Affirming => "AFFIRMING",
            TrustTier::Warning => "WARNING",
            TrustTier::Contraindicated => "CONTRAINDICATED",
        };
        f.write_str(s)
    }
}
