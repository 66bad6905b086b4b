//! Opaque pagination cursors.
//!
//! Callers never see a raw offset — they pass the cursor back verbatim. The
//! encoding is deliberately simple (base64 of `"offset:N"`) since the only
//! property we need is "round-trips and isn't silently reinterpreted as a
//! different offset by a stale client".

use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::StoreError;

pub fn encode(offset: u64) -> String {
    STANDARD.encode(format!("offset:{offset}"))
}

pub fn decode(cursor: &str) -> Result<u64, StoreError> {
    let bytes = STANDARD
        .decode(cursor)
        .map_err(|_| StoreError::InvalidArgument(format!("malformed cursor: {cursor}")))?;
    let s = String::from_utf8(bytes)
        .map_err(|_| StoreError::InvalidArgument(format!("malformed cursor: {cursor}")))?;
    s.strip_prefix("offset:")
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| StoreError::InvalidArgument(format!("malformed cursor: {cursor}")))
}
