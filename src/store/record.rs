// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use serde::Deserialize;
use serde_json::value::RawValue;

/// One entry of a JSON store dump: the value is kept verbatim
#[derive(Debug, Deserialize)]
pub(super) struct Record {
    pub key: String,
    pub value: Box<RawValue>,
}

pub(super) fn parse_records(j: &str) -> Result<Vec<(String, String)>, Error> {
    let records: Vec<Record> = serde_json::from_str(j).map_err(|e| Error::Syntax(e.to_string()))?;

    records
        .into_iter()
        .map(|r| {
            if r.key.is_empty() {
                return Err(Error::Syntax("record with empty key".to_string()));
            }
            Ok((r.key, r.value.get().to_string()))
        })
        .collect()
}
