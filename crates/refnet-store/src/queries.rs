//! Typed reads, writes and procedure calls per collection.
//!
//! Each function issues exactly one remote operation and decodes the result
//! into the records of `refnet-types`.

pub mod ledger;
pub mod pools;
pub mod profiles;
pub mod transfers;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{Result, StoreError};

/// Decode every row, failing on the first malformed one.
pub(crate) fn decode_rows<T: DeserializeOwned>(source: &str, rows: Vec<Value>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(|e| StoreError::decode(source, e)))
        .collect()
}

/// Saturating conversion for row counts.
pub(crate) fn count_u32(n: u64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
