// Copyright 2023-2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Trust anchor and endorsement stores consulted during verification

pub use self::errors::Error;
pub use self::iendorsementstore::IEndorsementStore;
pub use self::itrustanchorstore::ITrustAnchorStore;
pub use self::memo_endorsementstore::MemoEndorsementStore;
pub use self::memo_trustanchorstore::MemoTrustAnchorStore;

mod errors;
mod iendorsementstore;
mod itrustanchorstore;
mod memo_endorsementstore;
mod memo_trustanchorstore;
mod record;
