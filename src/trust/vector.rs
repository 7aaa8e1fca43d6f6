// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use super::status::ARStatus;
use super::tier::TrustTier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The eight AR4SI trustworthiness claims
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Claim {
    InstanceIdentity,
    Configuration,
    Executables,
    FileSystem,
    Hardware,
    RuntimeOpaque,
    StorageOpaque,
    SourcedData,
}

impl Claim {
    pub const ALL: [Claim; 8] = [
        Claim::InstanceIdentity,
        Claim::Configuration,
        Claim::Executables,
        Claim::FileSystem,
        Claim::Hardware,
        Claim::RuntimeOpaque,
        Claim::StorageOpaque,
        Claim::SourcedData,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Claim::InstanceIdentity => "instance-identity",
            Claim::Configuration => "configuration",
            Claim::Executables => "executables",
            Claim::FileSystem => "file-system",
            Claim::Hardware => "hardware",
            Claim::RuntimeOpaque => "runtime-opaque",
            Claim::StorageOpaque => "storage-opaque",
            Claim::SourcedData => "sourced-data",
        }
    }
}

impl fmt::Display for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// AR4SI trust vector.  Claims are carried as 32-bit integers on the wire; a
/// value that does not fit in 8 bits makes the vector invalid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TrustVector {
    #[serde(default)]
    pub instance_identity: i32,
    #[serde(default)]
    pub configuration: i32,
    #[serde(default)]
    pub executables: i32,
    #[serde(default)]
    pub file_system: i32,
    #[serde(default)]
    pub hardware: i32,
    #[serde(default)]
    pub runtime_opaque: i32,
    #[serde(default)]
    pub storage_opaque: i32,
    #[serde(default)]
    pub sourced_data: i32,
}

impl TrustVector {
    fn slot(&self, claim: Claim) -> &i32 {
        match claim {
            Claim::InstanceIdentity => &self.instance_identity,
            Claim::Configuration => &self.configuration,
            Claim::Executables => &self.executables,
            Claim::FileSystem => &self.file_system,
            Claim::Hardware => &self.hardware,
            Claim::RuntimeOpaque => &self.runtime_opaque,
            Claim::StorageOpaque => &self.storage_opaque,
            Claim::SourcedData => &self.sourced_data,
        }
    }

    fn slot_mut(&mut self, claim: Claim) -> &mut i32 {
        match claim {
            Claim::InstanceIdentity => &mut self.instance_identity,
            Claim::Configuration => &mut self.configuration,
            Claim::Executables => &mut self.executables,
            Claim::FileSystem => &mut self.file_system,
            Claim::Hardware => &mut self.hardware,
            Claim::RuntimeOpaque => &mut self.runtime_opaque,
            Claim::StorageOpaque => &mut self.storage_opaque,
            Claim::SourcedData => &mut self.sourced_data,
        }
    }

    /// Raw value of a claim, as carried on the wire
    pub fn get_raw(&self, claim: Claim) -> i32 {
        *self.slot(claim)
    }

    /// Status of a claim.  Out-of-range values read as `VERIFIER_ERROR`.
    pub fn get(&self, claim: Claim) -> ARStatus {
        ARStatus::try_from(self.get_raw(claim)).unwrap_or(ARStatus::VERIFIER_ERROR)
    }

    pub fn set(&mut self, claim: Claim, status: ARStatus) {
        *self.slot_mut(claim) = status.into();
    }

    pub fn set_all(&mut self, status: ARStatus) {
        for claim in Claim::ALL {
            self.set(claim, status);
        }
    }

    /// Check that every claim fits in the 8-bit status range
    pub fn validate(&self) -> Result<(), Error> {
        for claim in Claim::ALL {
            ARStatus::try_from(self.get_raw(claim)).map_err(|e| Error::InvalidClaim {
                claim: claim.name().to_string(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Tier of the worst claim in the vector
    pub fn worst_tier(&self) -> TrustTier {
        Claim::ALL
            .iter()
            .map(|c| self.get(*c).get_tier())
            .max()
            .unwrap_or_default()
    }
}

impl From<&TrustVector> for ear::TrustVector {
    fn from(tv: &TrustVector) -> Self {
        let mut out = ear::TrustVector::default();
        out.instance_identity
            .set(tv.get(Claim::InstanceIdentity).value());
        out.configuration.set(tv.get(Claim::Configuration).value());
        out.executables.set(tv.get(Claim::Executables).value());
        out.file_system.set(tv.get(Claim::FileSystem).value());
        out.hardware.set(tv.get(Claim::Hardware).value());
        out.runtime_opaque.set(tv.get(Claim::RuntimeOpaque).value());
        out.storage_opaque.set(tv.get(Claim::StorageOpaque).value());
        out.sourced_data.set(tv.get(Claim::SourcedData).value());
        out
    }
}
