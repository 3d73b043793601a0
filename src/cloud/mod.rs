// ABOUTME: Cloud provider module
// ABOUTME: Defines the CloudProvider seam used by the tracker and the orchestrator

pub mod client;
pub mod models;

pub use client::CloudClient;
pub use models::{Action, ActionStatus, CreateServerRequest, CreatedServer, Image, Server};

use anyhow::Result;
use async_trait::async_trait;

/// Control-plane calls the orchestrator needs from the cloud provider.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    async fn list_servers(&self) -> Result<Vec<Server>>;

    async fn get_server(&self, id: u64) -> Result<Server>;

    async fn shutdown_server(&self, id: u64) -> Result<Action>;

    async fn power_on_server(&self, id: u64) -> Result<Action>;

    /// Create a snapshot image of a server, described by `description`.
    async fn create_snapshot(&self, server_id: u64, description: &str) -> Result<Action>;

    async fn delete_server(&self, id: u64) -> Result<Action>;

    async fn create_server(&self, request: &CreateServerRequest) -> Result<CreatedServer>;

    /// Change a server's type. The disk keeps its size unless `upgrade_disk` is set.
    async fn change_server_type(
        &self,
        id: u64,
        server_type: &str,
        upgrade_disk: bool,
    ) -> Result<Action>;

    async fn list_snapshots(&self) -> Result<Vec<Image>>;

    async fn delete_image(&self, id: u64) -> Result<()>;

    async fn get_action(&self, id: u64) -> Result<Action>;
}
