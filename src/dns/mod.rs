// ABOUTME: DNS module
// ABOUTME: Defines the DnsApi seam and re-exports the client and the reconciler

pub mod client;
pub mod models;
pub mod reconcile;

pub use client::DnsClient;
pub use models::{DnsRecord, NewDnsRecord, Zone};
pub use reconcile::{DesiredRecords, DnsPlan, DnsReconciler, ReconcileReport};

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait DnsApi: Send + Sync {
    async fn get_zone(&self, zone_id: &str) -> Result<Zone>;

    /// Every record of the zone, of every type and owner.
    async fn list_records(&self, zone_id: &str) -> Result<Vec<DnsRecord>>;

    async fn delete_record(&self, id: &str) -> Result<()>;

    async fn update_records(&self, records: &[DnsRecord]) -> Result<()>;

    async fn create_records(&self, records: &[NewDnsRecord]) -> Result<()>;
}
