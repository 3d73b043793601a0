// ABOUTME: Reconciles the zone's owned A-records against a desired host -> address mapping
// ABOUTME: Computes a delete/update/create plan and applies it best-effort

use anyhow::{Context, Result};
use futures::future::join_all;
use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;
use tracing::{error, info, warn};

use super::models::{DnsRecord, NewDnsRecord, RECORD_TYPE_A};
use super::DnsApi;
use crate::config::DnsSettings;

/// Bare host label (no suffix) to address.
pub type DesiredRecords = BTreeMap<String, Ipv4Addr>;

/// Remote mutations that turn the current record set into the desired one.
///
/// The three lists are disjoint by name. Only A-records carrying the owned
/// suffix are ever deleted or updated; a record is created only when its name
/// does not exist in the zone at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnsPlan {
    pub to_delete: Vec<DnsRecord>,
    pub to_update: Vec<DnsRecord>,
    pub to_create: Vec<NewDnsRecord>,
    /// Desired names already taken by a record this tool does not manage.
    pub conflicts: Vec<String>,
}

impl DnsPlan {
    pub fn compute(
        current: &[DnsRecord],
        desired: &DesiredRecords,
        settings: &DnsSettings,
    ) -> Self {
        let suffix = settings.suffix.as_str();
        let target: BTreeMap<String, Ipv4Addr> = desired
            .iter()
            .map(|(name, ip)| (format!("{}{}", name, suffix), *ip))
            .collect();

        let mut plan = DnsPlan::default();
        let mut managed_names = HashSet::new();

        for record in current {
            if !record.is_a_record() || !record.name.ends_with(suffix) {
                continue;
            }
            match target.get(&record.name) {
                Some(ip) => {
                    managed_names.insert(record.name.as_str());
                    let mut updated = record.clone();
                    updated.value = ip.to_string();
                    plan.to_update.push(updated);
                }
                None => plan.to_delete.push(record.clone()),
            }
        }

        let existing_names: HashSet<&str> = current.iter().map(|r| r.name.as_str()).collect();

        for (name, ip) in &target {
            if !existing_names.contains(name.as_str()) {
                plan.to_create.push(NewDnsRecord {
                    name: name.clone(),
                    ttl: settings.record_ttl,
                    kind: RECORD_TYPE_A.to_string(),
                    value: ip.to_string(),
                    zone_id: settings.zone_id.clone(),
                });
            } else if !managed_names.contains(name.as_str()) {
                plan.conflicts.push(name.clone());
            }
        }

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_update.is_empty() && self.to_create.is_empty()
    }
}

/// What a reconciliation actually managed to apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub deleted: usize,
    pub updated: usize,
    pub created: usize,
    pub failed_deletes: Vec<String>,
    pub update_error: Option<String>,
    pub create_error: Option<String>,
    pub conflicts: Vec<String>,
}

impl ReconcileReport {
    pub fn is_complete(&self) -> bool {
        self.failed_deletes.is_empty() && self.update_error.is_none() && self.create_error.is_none()
    }
}

pub struct DnsReconciler<'a> {
    api: &'a dyn DnsApi,
    settings: &'a DnsSettings,
}

impl<'a> DnsReconciler<'a> {
    pub fn new(api: &'a dyn DnsApi, settings: &'a DnsSettings) -> Self {
        Self { api, settings }
    }

    /// Fetch the zone, plan and apply.
    ///
    /// Only the initial record listing is fatal. Later steps are not rolled back:
    /// each failure is logged and recorded in the report. All deletes finish
    /// before the bulk update and the bulk create are sent.
    pub async fn reconcile(&self, desired: &DesiredRecords) -> Result<ReconcileReport> {
        info!(zone = %self.settings.zone_id, hosts = desired.len(), "Starting DNS updates");

        let current = self
            .api
            .list_records(&self.settings.zone_id)
            .await
            .context("Failed to load current DNS records")?;

        let plan = DnsPlan::compute(&current, desired, self.settings);
        Ok(self.apply(plan).await)
    }

    pub async fn apply(&self, plan: DnsPlan) -> ReconcileReport {
        if plan.is_empty() && plan.conflicts.is_empty() {
            info!("DNS records already match, nothing to change");
            return ReconcileReport::default();
        }

        let mut report = ReconcileReport {
            conflicts: plan.conflicts,
            ..Default::default()
        };

        for name in &report.conflicts {
            warn!(
                record = %name,
                "Name is taken by a record this tool does not manage, leaving it alone"
            );
        }

        info!("Deleting {} old DNS record(s)", plan.to_delete.len());
        let deletions = join_all(
            plan.to_delete
                .iter()
                .map(|record| self.api.delete_record(&record.id)),
        )
        .await;
        for (record, outcome) in plan.to_delete.iter().zip(deletions) {
            match outcome {
                Ok(()) => report.deleted += 1,
                Err(err) => {
                    error!(
                        record = %record.name,
                        id = %record.id,
                        "Failed to delete DNS record: {:#}",
                        err
                    );
                    report.failed_deletes.push(record.name.clone());
                }
            }
        }

        info!("Updating {} existing DNS record(s)", plan.to_update.len());
        if !plan.to_update.is_empty() {
            match self.api.update_records(&plan.to_update).await {
                Ok(()) => report.updated = plan.to_update.len(),
                Err(err) => {
                    error!("Failed to update DNS records: {:#}", err);
                    report.update_error = Some(format!("{:#}", err));
                }
            }
        }

        info!("Creating {} new DNS record(s)", plan.to_create.len());
        if !plan.to_create.is_empty() {
            match self.api.create_records(&plan.to_create).await {
                Ok(()) => report.created = plan.to_create.len(),
                Err(err) => {
                    error!("Failed to create DNS records: {:#}", err);
                    report.create_error = Some(format!("{:#}", err));
                }
            }
        }

        info!(
            deleted = report.deleted,
            updated = report.updated,
            created = report.created,
            "Finished DNS updates"
        );
        report
    }
}
