// ABOUTME: Startup and shutdown sequences for the hibernating environment
// ABOUTME: Drives provider batches through the action tracker and publishes DNS on startup

use anyhow::{Context, Result};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::future::Future;
use std::net::Ipv4Addr;
use tracing::{error, info, warn};

use crate::actions::progress::ProgressObserver;
use crate::actions::tracker::ActionTracker;
use crate::cloud::models::{Action, CreateServerRequest, Image, Server};
use crate::cloud::CloudProvider;
use crate::config::Config;
use crate::dns::reconcile::{DesiredRecords, DnsReconciler, ReconcileReport};
use crate::dns::DnsApi;
use crate::error::HibernateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Stopping,
    Stopped,
    Starting,
    Started,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub stopped_servers: Vec<String>,
    pub deleted_snapshots: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedServer {
    pub name: String,
    pub hostname: String,
    pub address: Ipv4Addr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupReport {
    pub servers: Vec<StartedServer>,
    /// `None` when the current records could not be loaded and DNS was left unchanged.
    pub dns: Option<ReconcileReport>,
}

pub struct Orchestrator<'a> {
    cloud: &'a dyn CloudProvider,
    dns: &'a dyn DnsApi,
    config: &'a Config,
    observer: &'a dyn ProgressObserver,
    state: LifecycleState,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        cloud: &'a dyn CloudProvider,
        dns: &'a dyn DnsApi,
        config: &'a Config,
        observer: &'a dyn ProgressObserver,
    ) -> Self {
        Self {
            cloud,
            dns,
            config,
            observer,
            state: LifecycleState::Idle,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Snapshot every server, delete the servers, then drop the previous snapshots.
    pub async fn shutdown(&mut self) -> Result<ShutdownReport> {
        self.enter(LifecycleState::Stopping)?;
        let result = self.run_shutdown().await;
        self.leave(&result, LifecycleState::Stopped);
        result
    }

    /// Rebuild servers from the latest snapshots, resize them and publish their addresses.
    pub async fn startup(&mut self) -> Result<StartupReport> {
        self.enter(LifecycleState::Starting)?;
        let result = self.run_startup().await;
        self.leave(&result, LifecycleState::Started);
        result
    }

    fn enter(&mut self, next: LifecycleState) -> Result<()> {
        if self.state != LifecycleState::Idle {
            return Err(HibernateError::Precondition(format!(
                "cannot move to {:?} from {:?}",
                next, self.state
            ))
            .into());
        }
        self.state = next;
        Ok(())
    }

    fn leave<T>(&mut self, result: &Result<T>, done: LifecycleState) {
        self.state = match result {
            Ok(_) => done,
            Err(_) => LifecycleState::Aborted,
        };
    }

    async fn run_shutdown(&self) -> Result<ShutdownReport> {
        let old_snapshots = self
            .cloud
            .list_snapshots()
            .await
            .context("Failed to list existing snapshots")?;
        let servers = self
            .cloud
            .list_servers()
            .await
            .context("Failed to list servers")?;

        if servers.is_empty() {
            return Err(HibernateError::Precondition(
                "no servers to stop, aborting to avoid deleting snapshots".to_string(),
            )
            .into());
        }

        info!(count = servers.len(), "Stopping servers");
        let actions = issue_batch(
            "shut down servers",
            servers.iter().map(|s| self.cloud.shutdown_server(s.id)),
        )
        .await?;
        self.track(actions).await?;
        info!("Servers stopped");

        info!("Creating snapshots of servers");
        let actions = issue_batch(
            "create snapshots",
            servers
                .iter()
                .map(|s| self.cloud.create_snapshot(s.id, &s.name)),
        )
        .await?;
        self.track(actions).await?;
        info!("Snapshots created");

        info!("Deleting servers");
        let actions = issue_batch(
            "delete servers",
            servers.iter().map(|s| self.cloud.delete_server(s.id)),
        )
        .await?;
        self.track(actions).await?;
        info!("Servers deleted");

        info!(count = old_snapshots.len(), "Deleting previous snapshots");
        issue_batch(
            "delete previous snapshots",
            old_snapshots.iter().map(|image| self.cloud.delete_image(image.id)),
        )
        .await?;

        let report = ShutdownReport {
            stopped_servers: servers.into_iter().map(|s| s.name).collect(),
            deleted_snapshots: old_snapshots.iter().map(|image| image.id).collect(),
        };
        info!(deleted = ?report.deleted_snapshots, "Deleted previous snapshots");
        info!("Success. Everything is backed up and shut down");
        Ok(report)
    }

    async fn run_startup(&self) -> Result<StartupReport> {
        let running = self
            .cloud
            .list_servers()
            .await
            .context("Failed to list servers")?;

        if !running.is_empty() {
            return Err(HibernateError::Precondition(format!(
                "{} server(s) already running, stop them first to avoid duplicates",
                running.len()
            ))
            .into());
        }

        let snapshots = self
            .cloud
            .list_snapshots()
            .await
            .context("Failed to list snapshots")?;
        let restores = restore_plan(&snapshots)?;

        let settings = &self.config.servers;
        info!(
            count = restores.len(),
            server_type = %settings.provisioning_type,
            "Creating servers with the smallest possible disk"
        );
        let requests: Vec<CreateServerRequest> = restores
            .iter()
            .map(|(name, image)| CreateServerRequest {
                name: name.clone(),
                server_type: settings.provisioning_type.clone(),
                location: settings.location.clone(),
                image: image.id.to_string(),
                ssh_keys: vec![settings.ssh_key.clone()],
                start_after_create: false,
            })
            .collect();
        let created = issue_batch(
            "create servers",
            requests.iter().map(|r| self.cloud.create_server(r)),
        )
        .await?;
        let (fresh, actions): (Vec<Server>, Vec<Action>) =
            created.into_iter().map(|c| (c.server, c.action)).unzip();
        self.track(actions).await?;
        info!("Servers created");

        info!(server_type = %settings.target_type, "Resizing servers without growing the disk");
        let actions = issue_batch(
            "resize servers",
            fresh
                .iter()
                .map(|s| self.cloud.change_server_type(s.id, &settings.target_type, false)),
        )
        .await?;
        self.track(actions).await?;
        info!("Resizing complete");

        if settings.power_on_after_resize {
            info!("Powering on servers");
            let actions = issue_batch(
                "power on servers",
                fresh.iter().map(|s| self.cloud.power_on_server(s.id)),
            )
            .await?;
            self.track(actions).await?;
        }

        let servers = issue_batch(
            "reload servers",
            fresh.iter().map(|s| self.cloud.get_server(s.id)),
        )
        .await?;
        let desired = desired_records(&servers)?;

        let dns = match DnsReconciler::new(self.dns, &self.config.dns)
            .reconcile(&desired)
            .await
        {
            Ok(report) => {
                if !report.is_complete() {
                    warn!("DNS records were only partially updated");
                }
                Some(report)
            }
            Err(err) => {
                error!("DNS records were not updated: {:#}", err);
                None
            }
        };

        let zone_name = match self.dns.get_zone(&self.config.dns.zone_id).await {
            Ok(zone) => Some(zone.name),
            Err(err) => {
                warn!("Failed to load DNS zone details: {:#}", err);
                None
            }
        };

        let started: Vec<StartedServer> = desired
            .into_iter()
            .map(|(name, address)| {
                let label = format!("{}{}", name, self.config.dns.suffix);
                let hostname = match &zone_name {
                    Some(zone) => format!("{}.{}", label, zone),
                    None => label,
                };
                StartedServer {
                    name,
                    hostname,
                    address,
                }
            })
            .collect();

        info!("Success. Servers are ready");
        for server in &started {
            info!("Server \"{}\": {} ({})", server.name, server.hostname, server.address);
        }

        Ok(StartupReport {
            servers: started,
            dns,
        })
    }

    async fn track(&self, actions: Vec<Action>) -> Result<Vec<Action>> {
        ActionTracker::new(self.cloud, self.config.tracking.clone(), self.observer)
            .wait_for_all(actions)
            .await
    }
}

/// Issue one batch of calls concurrently and wait for every call to return.
async fn issue_batch<T, F>(what: &str, calls: impl IntoIterator<Item = F>) -> Result<Vec<T>>
where
    F: Future<Output = Result<T>>,
{
    let mut values = Vec::new();
    let mut failures = Vec::new();

    for outcome in join_all(calls).await {
        match outcome {
            Ok(value) => values.push(value),
            Err(err) => {
                error!("Failed to {}: {:#}", what, err);
                failures.push(format!("{:#}", err));
            }
        }
    }

    if !failures.is_empty() {
        return Err(HibernateError::Remote(format!(
            "failed to {} ({} of {} call(s) failed): {}",
            what,
            failures.len(),
            failures.len() + values.len(),
            failures.join("; ")
        ))
        .into());
    }
    Ok(values)
}

/// Pair each snapshot with the server name it restores.
fn restore_plan(snapshots: &[Image]) -> Result<Vec<(String, &Image)>> {
    let mut by_name: BTreeMap<&str, Vec<&Image>> = BTreeMap::new();
    for image in snapshots {
        match image.source_server_name() {
            Some(name) => by_name.entry(name).or_default().push(image),
            None => warn!(image = image.id, "Snapshot has no source server name, skipping"),
        }
    }

    if by_name.is_empty() {
        return Err(HibernateError::Precondition("no snapshots to restore".to_string()).into());
    }

    if let Some((name, images)) = by_name.iter().find(|(_, images)| images.len() > 1) {
        let ids: Vec<u64> = images.iter().map(|i| i.id).collect();
        return Err(HibernateError::Precondition(format!(
            "server \"{}\" has several snapshots {:?}, remove the stale ones first",
            name, ids
        ))
        .into());
    }

    Ok(by_name
        .into_iter()
        .map(|(name, images)| (name.to_string(), images[0]))
        .collect())
}

fn desired_records(servers: &[Server]) -> Result<DesiredRecords> {
    servers
        .iter()
        .map(|server| {
            server
                .public_ipv4()
                .map(|ip| (server.name.clone(), ip))
                .ok_or_else(|| {
                    anyhow::Error::from(HibernateError::Remote(format!(
                        "server \"{}\" has no public IPv4 address",
                        server.name
                    )))
                })
        })
        .collect()
}
