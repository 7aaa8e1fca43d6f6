// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use super::record::parse_records;
use super::IEndorsementStore;
use multimap::MultiMap;
use std::sync::RwLock;

/// In-memory endorsement store.  Endorsements are kept as the JSON text they
/// were provisioned with.
#[derive(Debug, Default)]
pub struct MemoEndorsementStore {
    e: RwLock<MultiMap<String, String>>,
}

impl MemoEndorsementStore {
    pub fn new() -> Self {
        Self {
            e: Default::default(),
        }
    }

    /// Add the endorsements found in the given JSON document, a list of
    /// `{"key": ..., "value": ...}` records
    pub fn load_json(&mut self, j: &str) -> Result<(), Error> {
        for (k, v) in parse_records(j)? {
            self.add(k, v);
        }
        Ok(())
    }

    pub fn add(&self, key: impl Into<String>, endorsement: impl Into<String>) {
        self.e
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into(), endorsement.into());
    }
}

impl IEndorsementStore for MemoEndorsementStore {
    fn get(&self, key: &str) -> Result<Vec<String>, Error> {
        self.e
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get_vec(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::Endorsement;

    const TEST_EN_STORE: &str = include_str!("../../testdata/enstore.json");

    #[test]
    fn load_json_and_get_ok() {
        let mut s = MemoEndorsementStore::new();
        s.load_json(TEST_EN_STORE).unwrap();

        let en = s.get("digest://acme/node-1").unwrap();
        assert_eq!(en.len(), 2);

        let e: Endorsement = serde_json::from_str(&en[0]).unwrap();
        assert_eq!(e.scheme, "DIGEST");
        assert_eq!(e.endorsement_type, "reference-value");
        assert_eq!(e.attribute_str("digest.node-id"), Some("node-1"));

        assert!(matches!(s.get("digest://acme/nope"), Err(Error::NotFound(_))));
    }

    #[test]
    fn add_accumulates() {
        let s = MemoEndorsementStore::new();
        s.add("k", "{}");
        s.add("k", "[]");
        assert_eq!(s.get("k").unwrap(), vec!["{}", "[]"]);
    }
}
