//! The Hit record - one structured, normalized observation of an HTTP access
//!
//! Hits are produced by the parser, shaped by the normalizer, and stored in
//! the sliding buffer. The serialized form is the poll endpoint's wire
//! schema, so field names here are the public contract.

use serde::Serialize;

/// One observed HTTP access, after parsing and normalization.
///
/// `status` and `size` are present in the canonical schema and stripped to
/// `None` when a deployment opts into minimal hits; absent fields are
/// omitted from the JSON entirely rather than serialized as null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hit {
    /// Client address, possibly masked to a subnet (e.g. `"10.0.0.*"`).
    ///
    /// Serialized as `"host"` - the wire name dashboards already consume.
    #[serde(rename = "host")]
    pub client: String,

    /// Request path, possibly query-trimmed and renamed.
    pub url: String,

    /// HTTP response status code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    /// Response size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Current wall-clock time as float epoch seconds.
///
/// This is the one clock the whole system uses: buffer arrival times, the
/// poll endpoint's `since` values, and eviction cutoffs all share it.
pub fn epoch_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
