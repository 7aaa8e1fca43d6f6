// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use super::tier::TrustTier;
use serde::{Deserialize, Serialize};

/// A single AR4SI trustworthiness claim value: a signed 8-bit code whose range
/// determines its [`TrustTier`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ARStatus(i8);

impl ARStatus {
    pub const NO_CLAIM: ARStatus = ARStatus(0);
    pub const CANNOT_PARSE: ARStatus = ARStatus(1);
    pub const VERIFIER_ERROR: ARStatus = ARStatus(-1);
    pub const INVALID: ARStatus = ARStatus(99);

    pub const CONF_AFFIRMING: ARStatus = ARStatus(2);
    pub const CONF_NOVULN: ARStatus = ARStatus(3);
    pub const CONF_UNSAFE: ARStatus = ARStatus(32);
    pub const CONF_UNSUPPORTABLE: ARStatus = ARStatus(96);

    pub const EXE_AFFIRMING: ARStatus = ARStatus(2);
    pub const EXE_BOOT_AFFIRMING: ARStatus = ARStatus(3);
    pub const EXE_UNSAFE: ARStatus = ARStatus(32);
    pub const EXE_UNRECOGNIZED: ARStatus = ARStatus(33);
    pub const EXE_CONTRAINDICATED: ARStatus = ARStatus(96);

    pub const FS_AFFIRMING: ARStatus = ARStatus(2);
    pub const FS_UNSAFE: ARStatus = ARStatus(32);
    pub const FS_CONTRAINDICATED: ARStatus = ARStatus(96);

    pub const HW_AFFIRMING: ARStatus = ARStatus(2);
    pub const HW_UNSAFE: ARStatus = ARStatus(32);
    pub const HW_CONTRAINDICATED: ARStatus = ARStatus(96);
    pub const HW_UNRECOGNIZED: ARStatus = ARStatus(97);

    pub const IDENT_AFFIRMING: ARStatus = ARStatus(2);
    pub const IDENT_CONTRAINDICATED: ARStatus = ARStatus(96);
    pub const IDENT_UNRECOGNIZED: ARStatus = ARStatus(97);

    pub const RT_AFFIRMING: ARStatus = ARStatus(2);
    pub const RT_ISOLATED: ARStatus = ARStatus(32);
    pub const RT_EXPOSED: ARStatus = ARStatus(96);

    pub const SOURCED_AFFIRMING: ARStatus = ARStatus(2);
    pub const SOURCED_UNSAFE: ARStatus = ARStatus(32);
    pub const SOURCED_CONTRAINDICATED: ARStatus = ARStatus(96);

    pub const SECRETS_AFFIRMING: ARStatus = ARStatus(2);
    pub const SECRETS_NOHWKEYS: ARStatus = ARStatus(32);
    pub const SECRETS_EXPOSED: ARStatus = ARStatus(96);

    pub const fn new(v: i8) -> Self {
        ARStatus(v)
    }

    pub const fn value(self) -> i8 {
        self.0
    }

    /// Classify the status into its tier.  0, 1, -1 and the remaining values
    /// outside the defined bands are all `None`.
    pub fn get_tier(self) -> TrustTier {
        match self.0 {
            2..=31 | -32..=-2 => TrustTier::Affirming,
            32..=95 | -96..=-33 => TrustTier::Warning,
            96..=127 | -128..=-97 => TrustTier::Contraindicated,
            _ => TrustTier::None,
        }
    }
}

impl From<i8> for ARStatus {
    fn from(v: i8) -> Self {
        ARStatus(v)
    }
}

impl From<ARStatus> for i32 {
    fn from(s: ARStatus) -> Self {
        s.0 as i32
    }
}

impl TryFrom<i32> for ARStatus {
    type Error = Error;

    fn try_from(v: i32) -> Result<Self, Error> {
        i8::try_from(v)
            .map(ARStatus)
            .map_err(|_| Error::OutOfRange(v.into()))
    }
}

impl TryFrom<i64> for ARStatus {
    type Error = Error;

    fn try_from(v: i64) -> Result<Self, Error> {
        i8::try_from(v).map(ARStatus).map_err(|_| Error::OutOfRange(v))
    }
}

/// Tier of a status carried as a wider integer; values that do not fit in
/// 8 bits have no tier.
pub fn get_int32_trust_tier(v: i32) -> TrustTier {
    ARStatus::try_from(v)
        .map(ARStatus::get_tier)
        .unwrap_or(TrustTier::None)
}
