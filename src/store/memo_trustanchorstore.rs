// Copyright 2023-2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use super::record::parse_records;
use super::ITrustAnchorStore;
use multimap::MultiMap;
use std::sync::RwLock;

/// In-memory trust anchor store
#[derive(Debug, Default)]
pub struct MemoTrustAnchorStore {
    p: RwLock<MultiMap<String, String>>,
}

impl MemoTrustAnchorStore {
    /// Returns a new empty TrustAnchorStore
    pub fn new() -> Self {
        Self {
            p: Default::default(),
        }
    }

    /// Add to an existing (and possibly empty) TrustAnchorStore the trust
    /// anchors loaded from the given JSON document, a list of
    /// `{"key": ..., "value": ...}` records
    pub fn load_json(&mut self, j: &str) -> Result<(), Error> {
        for (k, v) in parse_records(j)? {
            self.add(k, v);
        }
        Ok(())
    }

    pub fn add(&self, key: impl Into<String>, ta: impl Into<String>) {
        self.p
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into(), ta.into());
    }
}

impl ITrustAnchorStore for MemoTrustAnchorStore {
    fn get(&self, key: &str) -> Result<Vec<String>, Error> {
        self.p
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

    const TEST_TA_STORE: &str = include_str!("../../testdata/tastore.json");

    #[test]
    fn load_json_and_get_ok() {
        let mut s: MemoTrustAnchorStore = Default::default();

        s.load_json(TEST_TA_STORE).unwrap();

        let tas = s.get("digest://acme/node-1").unwrap();
        assert_eq!(tas.len(), 1);

        let jwk: serde_json::Value = serde_json::from_str(&tas[0]).unwrap();
        assert_eq!(jwk["kty"], "EC");
        assert_eq!(jwk["crv"], "P-256");

        assert_eq!(s.get("digest://acme/node-2").unwrap().len(), 2);

        assert_eq!(
            s.get("digest://acme/unknown"),
            Err(Error::NotFound("digest://acme/unknown".into()))
        );
    }

    #[test]
    fn load_json_bad() {
        let mut s = MemoTrustAnchorStore::new();
        assert!(matches!(s.load_json("{}"), Err(Error::Syntax(_))));
        assert!(matches!(
            s.load_json(r#"[{"key": "", "value": 1}]"#),
            Err(Error::Syntax(_))
        ));
    }
}
