// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! AR4SI trust algebra: claim statuses, their tiers, trust vectors and the
//! attestation result that carries them.
//!
//! ```
//! use veraison_plugin::trust::{ARStatus, TrustTier};
//!
//! assert_eq!(ARStatus::HW_UNSAFE.get_tier(), TrustTier::Warning);
//! assert_eq!(ARStatus::VERIFIER_ERROR.get_tier(), TrustTier::None);
//! ```

pub use self::errors::Error;
pub use self::result::AttestationResult;
pub use self::status::{get_int32_trust_tier, ARStatus};
pub use self::tier::TrustTier;
pub use self::vector::{Claim, TrustVector};

mod errors;
mod result;
mod status;
mod tier;
mod vector;
