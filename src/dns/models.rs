// ABOUTME: Data structures for the DNS API (zones and records)
// ABOUTME: These are serialized to JSON for API communication

use serde::{Deserialize, Serialize};

pub const RECORD_TYPE_A: &str = "A";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String, // relative to the zone, e.g. "web.internal"
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    pub zone_id: String,
}

impl DnsRecord {
    pub fn is_a_record(&self) -> bool {
        self.kind == RECORD_TYPE_A
    }
}

/// A record that does not exist remotely yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewDnsRecord {
    pub name: String,
    pub ttl: u32,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    pub zone_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ZoneResponse {
    pub zone: Zone,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecordsResponse {
    #[serde(default)]
    pub records: Vec<DnsRecord>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BulkRecords<'a, T> {
    pub records: &'a [T],
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct BulkResponse {
    #[serde(default)]
    pub invalid_records: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub failed_records: Option<Vec<serde_json::Value>>,
}

impl BulkResponse {
    pub fn rejected(&self) -> usize {
        self.invalid_records.as_ref().map_or(0, Vec::len)
            + self.failed_records.as_ref().map_or(0, Vec::len)
    }
}
