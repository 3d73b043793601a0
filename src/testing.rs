// ABOUTME: In-memory cloud and DNS doubles for unit tests
// ABOUTME: Scripts action status sequences and records every remote call in order

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use crate::cloud::models::{
    Action, ActionError, ActionStatus, CreateServerRequest, CreatedFrom, CreatedServer, Image,
    Ipv4Info, PublicNet, ResourceRef, Server, ServerType,
};
use crate::cloud::CloudProvider;
use crate::config::DnsSettings;
use crate::dns::models::{DnsRecord, NewDnsRecord, Zone};
use crate::dns::DnsApi;

pub fn server(id: u64, name: &str, ip: Option<&str>, server_type: &str) -> Server {
    Server {
        id,
        name: name.to_string(),
        status: "running".to_string(),
        public_net: PublicNet {
            ipv4: ip.map(|ip| Ipv4Info {
                ip: ip.parse().unwrap(),
            }),
        },
        server_type: ServerType {
            name: server_type.to_string(),
        },
    }
}

pub fn snapshot(id: u64, server_name: &str) -> Image {
    Image {
        id,
        description: Some(server_name.to_string()),
        created_from: Some(CreatedFrom {
            id: id + 10_000,
            name: server_name.to_string(),
        }),
    }
}

pub fn a_record(id: &str, name: &str, value: &str) -> DnsRecord {
    DnsRecord {
        id: id.to_string(),
        kind: "A".to_string(),
        name: name.to_string(),
        value: value.to_string(),
        ttl: Some(60),
        zone_id: "zone-1".to_string(),
    }
}

pub fn dns_settings(suffix: &str) -> DnsSettings {
    DnsSettings {
        api_token: "dns-token".to_string(),
        api_url: "http://dns.invalid".to_string(),
        zone_id: "zone-1".to_string(),
        suffix: suffix.to_string(),
        record_ttl: 60,
    }
}

#[derive(Default)]
struct CloudState {
    servers: Vec<Server>,
    snapshots: Vec<Image>,
    next_id: u64,
    scripts: HashMap<u64, VecDeque<ActionStatus>>,
    actions: HashMap<u64, Action>,
    lookups: HashMap<u64, usize>,
    failing_lookups: HashMap<u64, (usize, u32)>,
    failing_commands: HashSet<String>,
    failing_calls: HashSet<String>,
    events: Vec<String>,
}

impl CloudState {
    /// Log a mutating call, then reject it if it was marked as failing.
    fn record(&mut self, event: String) -> Result<()> {
        let command = event.split_whitespace().next().unwrap_or_default();
        let rejected = self.failing_calls.contains(&event) || self.failing_calls.contains(command);
        self.events.push(event.clone());
        if rejected {
            return Err(anyhow!("provider rejected {}", event));
        }
        Ok(())
    }

    fn start_action(&mut self, command: &str, resource: u64) -> Action {
        self.next_id += 1;
        let id = self.next_id;
        let last = if self.failing_commands.contains(command) {
            ActionStatus::Error
        } else {
            ActionStatus::Success
        };
        self.scripts
            .insert(id, VecDeque::from(vec![ActionStatus::Running, last]));
        let action = Action {
            id,
            command: command.to_string(),
            status: ActionStatus::Running,
            progress: 0,
            resources: vec![ResourceRef {
                id: resource,
                kind: "server".to_string(),
            }],
            error: None,
        };
        self.actions.insert(id, action.clone());
        action
    }
}

/// Scripted cloud provider. Unscripted actions run for one round, then succeed.
pub struct MockCloud {
    state: Mutex<CloudState>,
}

impl MockCloud {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CloudState {
                next_id: 1000,
                ..Default::default()
            }),
        }
    }

    pub fn with_servers(servers: Vec<Server>, snapshots: Vec<Image>) -> Self {
        let cloud = Self::new();
        {
            let mut state = cloud.state.lock().unwrap();
            state.servers = servers;
            state.snapshots = snapshots;
        }
        cloud
    }

    /// An action whose lookups return `script` in order, repeating the last entry.
    pub fn scripted_action(
        &self,
        command: &str,
        resource: u64,
        script: Vec<ActionStatus>,
    ) -> Action {
        let mut state = self.state.lock().unwrap();
        let action = state.start_action(command, resource);
        state.scripts.insert(action.id, VecDeque::from(script));
        action
    }

    /// Every future action issued for `command` ends in `error`.
    pub fn fail_command(&self, command: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_commands
            .insert(command.to_string());
    }

    pub fn fail_lookups(&self, action_id: u64, times: u32) {
        self.fail_lookups_after(action_id, 0, times);
    }

    /// Lookups of `action_id` succeed `after` times, then fail `times` times.
    pub fn fail_lookups_after(&self, action_id: u64, after: usize, times: u32) {
        self.state
            .lock()
            .unwrap()
            .failing_lookups
            .insert(action_id, (after, times));
    }

    /// The call is still logged in `events`, but returns an error instead of an
    /// action. `call` is either a full event (`"delete_image 501"`) or just its
    /// first word (`"create_server"`).
    pub fn fail_call(&self, call: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_calls
            .insert(call.to_string());
    }

    pub fn lookup_count(&self, action_id: u64) -> usize {
        self.state
            .lock()
            .unwrap()
            .lookups
            .get(&action_id)
            .copied()
            .unwrap_or(0)
    }

    /// Mutating calls and terminal lookups, in order.
    pub fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn servers(&self) -> Vec<Server> {
        self.state.lock().unwrap().servers.clone()
    }

    pub fn snapshot_ids(&self) -> Vec<u64> {
        self.state
            .lock()
            .unwrap()
            .snapshots
            .iter()
            .map(|s| s.id)
            .collect()
    }
}

#[async_trait]
impl CloudProvider for MockCloud {
    async fn list_servers(&self) -> Result<Vec<Server>> {
        Ok(self.servers())
    }

    async fn get_server(&self, id: u64) -> Result<Server> {
        self.state
            .lock()
            .unwrap()
            .servers
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| anyhow!("server {} not found", id))
    }

    async fn shutdown_server(&self, id: u64) -> Result<Action> {
        let mut state = self.state.lock().unwrap();
        state.record(format!("shutdown {}", id))?;
        Ok(state.start_action("shutdown_server", id))
    }

    async fn power_on_server(&self, id: u64) -> Result<Action> {
        let mut state = self.state.lock().unwrap();
        state.record(format!("poweron {}", id))?;
        Ok(state.start_action("start_server", id))
    }

    async fn create_snapshot(&self, server_id: u64, description: &str) -> Result<Action> {
        let mut state = self.state.lock().unwrap();
        state.record(format!("snapshot {} {}", server_id, description))?;
        let action = state.start_action("create_image", server_id);
        let image_id = action.id + 50_000;
        state.snapshots.push(Image {
            id: image_id,
            description: Some(description.to_string()),
            created_from: Some(CreatedFrom {
                id: server_id,
                name: description.to_string(),
            }),
        });
        Ok(action)
    }

    async fn delete_server(&self, id: u64) -> Result<Action> {
        let mut state = self.state.lock().unwrap();
        state.record(format!("delete_server {}", id))?;
        state.servers.retain(|s| s.id != id);
        Ok(state.start_action("delete_server", id))
    }

    async fn create_server(&self, request: &CreateServerRequest) -> Result<CreatedServer> {
        let mut state = self.state.lock().unwrap();
        state.record(format!(
            "create_server {} {} {} {} start={}",
            request.name,
            request.image,
            request.server_type,
            request.location,
            request.start_after_create
        ))?;
        state.next_id += 1;
        let id = state.next_id;
        let ip = format!("10.0.{}.{}", id / 256 % 256, id % 256);
        let created = server(id, &request.name, Some(&ip), &request.server_type);
        state.servers.push(created.clone());
        let action = state.start_action("create_server", id);
        Ok(CreatedServer {
            server: created,
            action,
        })
    }

    async fn change_server_type(
        &self,
        id: u64,
        server_type: &str,
        upgrade_disk: bool,
    ) -> Result<Action> {
        let mut state = self.state.lock().unwrap();
        state.record(format!(
            "change_type {} {} upgrade_disk={}",
            id, server_type, upgrade_disk
        ))?;
        if let Some(server) = state.servers.iter_mut().find(|s| s.id == id) {
            server.server_type.name = server_type.to_string();
        }
        Ok(state.start_action("change_server_type", id))
    }

    async fn list_snapshots(&self) -> Result<Vec<Image>> {
        Ok(self.state.lock().unwrap().snapshots.clone())
    }

    async fn delete_image(&self, id: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.record(format!("delete_image {}", id))?;
        state.snapshots.retain(|s| s.id != id);
        Ok(())
    }

    async fn get_action(&self, id: u64) -> Result<Action> {
        let mut state = self.state.lock().unwrap();
        let count = {
            let count = state.lookups.entry(id).or_default();
            *count += 1;
            *count
        };

        if let Some((after, remaining)) = state.failing_lookups.get_mut(&id) {
            if count > *after && *remaining > 0 {
                *remaining -= 1;
                return Err(anyhow!("connection reset while fetching action {}", id));
            }
        }

        let status = match state.scripts.get_mut(&id) {
            Some(script) if script.len() > 1 => script.pop_front(),
            Some(script) => script.front().copied(),
            None => None,
        }
        .ok_or_else(|| anyhow!("action {} not found", id))?;

        let mut action = state
            .actions
            .get(&id)
            .cloned()
            .ok_or_else(|| anyhow!("action {} not found", id))?;
        action.status = status;
        action.progress = if status.is_terminal() { 100 } else { 50 };
        if status == ActionStatus::Error {
            action.error = Some(ActionError {
                code: "action_failed".to_string(),
                message: "Action failed".to_string(),
            });
        }
        if status.is_terminal() {
            state
                .events
                .push(format!("{} {} {}", action.command, status.as_str(), id));
        }
        Ok(action)
    }
}

#[derive(Default)]
struct DnsState {
    records: Vec<DnsRecord>,
    calls: Vec<String>,
    failing_deletes: HashSet<String>,
    fail_zone: bool,
    fail_list: bool,
    fail_creates: bool,
    next_id: u64,
}

pub struct MockDns {
    state: Mutex<DnsState>,
}

impl MockDns {
    pub fn with_records(records: Vec<DnsRecord>) -> Self {
        Self {
            state: Mutex::new(DnsState {
                records,
                ..Default::default()
            }),
        }
    }

    pub fn fail_delete(&self, id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_deletes
            .insert(id.to_string());
    }

    pub fn fail_zone(&self) {
        self.state.lock().unwrap().fail_zone = true;
    }

    pub fn fail_list(&self) {
        self.state.lock().unwrap().fail_list = true;
    }

    pub fn fail_creates(&self) {
        self.state.lock().unwrap().fail_creates = true;
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn records_snapshot(&self) -> Vec<DnsRecord> {
        self.state.lock().unwrap().records.clone()
    }
}

#[async_trait]
impl DnsApi for MockDns {
    async fn get_zone(&self, zone_id: &str) -> Result<Zone> {
        if self.state.lock().unwrap().fail_zone {
            return Err(anyhow!("zone {} is unavailable", zone_id));
        }
        Ok(Zone {
            id: zone_id.to_string(),
            name: "example.com".to_string(),
        })
    }

    async fn list_records(&self, _zone_id: &str) -> Result<Vec<DnsRecord>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("list".to_string());
        if state.fail_list {
            return Err(anyhow!("record listing timed out"));
        }
        Ok(state.records.clone())
    }

    async fn delete_record(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("delete {}", id));
        if state.failing_deletes.contains(id) {
            return Err(anyhow!("record {} could not be deleted", id));
        }
        state.records.retain(|r| r.id != id);
        Ok(())
    }

    async fn update_records(&self, records: &[DnsRecord]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("update {}", records.len()));
        for record in records {
            if let Some(existing) = state.records.iter_mut().find(|r| r.id == record.id) {
                *existing = record.clone();
            }
        }
        Ok(())
    }

    async fn create_records(&self, records: &[NewDnsRecord]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("create {}", records.len()));
        if state.fail_creates {
            return Err(anyhow!("invalid records in bulk create"));
        }
        for record in records {
            state.next_id += 1;
            let id = format!("new-{}", state.next_id);
            state.records.push(DnsRecord {
                id,
                kind: record.kind.clone(),
                name: record.name.clone(),
                value: record.value.clone(),
                ttl: Some(record.ttl),
                zone_id: record.zone_id.clone(),
            });
        }
        Ok(())
    }
}
