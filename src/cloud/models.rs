// ABOUTME: Data structures for the cloud provider API (servers, images, actions)
// ABOUTME: These are deserialized from and serialized to JSON for API communication

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Running,
    Success,
    Error,
}

impl ActionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ActionStatus::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionStatus::Running => "running",
            ActionStatus::Success => "success",
            ActionStatus::Error => "error",
        }
    }
}

/// A long-running provider operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: u64,
    pub command: String, // "shutdown_server", "create_image", "delete_server", ...
    pub status: ActionStatus,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub resources: Vec<ResourceRef>,
    #[serde(default)]
    pub error: Option<ActionError>,
}

impl Action {
    /// The resource an action targets. Provider actions carry exactly one in practice.
    pub fn resource_id(&self) -> Option<u64> {
        self.resources.first().map(|r| r.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub status: String,
    pub public_net: PublicNet,
    pub server_type: ServerType,
}

impl Server {
    pub fn public_ipv4(&self) -> Option<Ipv4Addr> {
        self.public_net.ipv4.as_ref().map(|v4| v4.ip)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublicNet {
    pub ipv4: Option<Ipv4Info>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ipv4Info {
    pub ip: Ipv4Addr,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerType {
    pub name: String,
}

/// A snapshot image.
#[derive(Debug, Clone, Deserialize)]
pub struct Image {
    pub id: u64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_from: Option<CreatedFrom>,
}

impl Image {
    /// Name of the server this snapshot should be restored as.
    pub fn source_server_name(&self) -> Option<&str> {
        self.created_from
            .as_ref()
            .map(|from| from.name.as_str())
            .or(self.description.as_deref())
            .filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedFrom {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateServerRequest {
    pub name: String,
    pub server_type: String,
    pub location: String,
    pub image: String,
    pub ssh_keys: Vec<String>,
    pub start_after_create: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedServer {
    pub server: Server,
    pub action: Action,
}

// Response envelopes

#[derive(Debug, Deserialize)]
pub(crate) struct ActionEnvelope {
    pub action: Action,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServerEnvelope {
    pub server: Server,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServersPage {
    pub servers: Vec<Server>,
    #[serde(default)]
    pub meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImagesPage {
    pub images: Vec<Image>,
    #[serde(default)]
    pub meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Meta {
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Pagination {
    pub next_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateImageResponse {
    pub action: Action,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error: ActionError,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateImageRequest<'a> {
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub description: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChangeTypeRequest<'a> {
    pub server_type: &'a str,
    pub upgrade_disk: bool,
}
