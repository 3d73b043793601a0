// ABOUTME: HTTP client for the cloud provider REST API
// ABOUTME: Handles servers, snapshot images and action lookups with bearer authentication

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::models::{
    Action, ActionEnvelope, ApiErrorBody, ChangeTypeRequest, CreateImageRequest,
    CreateImageResponse, CreateServerRequest, CreatedServer, Image, ImagesPage, Server,
    ServerEnvelope, ServersPage,
};
use super::CloudProvider;

const PAGE_SIZE: u32 = 50;

pub struct CloudClient {
    client: Client,
    api_base_url: String,
    token: String,
}

impl CloudClient {
    pub fn new(api_base_url: String, token: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .with_context(|| format!("Failed to {}. The cloud API may be unavailable", what))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(parsed) => format!("{}: {}", parsed.error.code, parsed.error.message),
                Err(_) => body,
            };
            anyhow::bail!("Failed to {} (status {}): {}", what, status, detail);
        }

        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T> {
        let response = self.send(request, what).await?;
        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse response to {}", what))
    }

    async fn server_action(&self, id: u64, action: &str) -> Result<Action> {
        let request = self
            .client
            .post(self.url(&format!("/servers/{}/actions/{}", id, action)));
        let envelope: ActionEnvelope = self
            .send_json(request, &format!("{} server {}", action, id))
            .await?;
        Ok(envelope.action)
    }
}

#[async_trait]
impl CloudProvider for CloudClient {
    async fn list_servers(&self) -> Result<Vec<Server>> {
        let mut servers = Vec::new();
        let mut page = 1;

        loop {
            let request = self
                .client
                .get(self.url("/servers"))
                .query(&[("page", page), ("per_page", PAGE_SIZE)]);
            let body: ServersPage = self.send_json(request, "list servers").await?;
            servers.extend(body.servers);

            match body.meta.and_then(|m| m.pagination.next_page) {
                Some(next) => page = next,
                None => return Ok(servers),
            }
        }
    }

    async fn get_server(&self, id: u64) -> Result<Server> {
        let request = self.client.get(self.url(&format!("/servers/{}", id)));
        let envelope: ServerEnvelope = self
            .send_json(request, &format!("get server {}", id))
            .await?;
        Ok(envelope.server)
    }

    async fn shutdown_server(&self, id: u64) -> Result<Action> {
        self.server_action(id, "shutdown").await
    }

    async fn power_on_server(&self, id: u64) -> Result<Action> {
        self.server_action(id, "poweron").await
    }

    async fn create_snapshot(&self, server_id: u64, description: &str) -> Result<Action> {
        let request = self
            .client
            .post(self.url(&format!("/servers/{}/actions/create_image", server_id)))
            .json(&CreateImageRequest {
                kind: "snapshot",
                description,
            });
        let response: CreateImageResponse = self
            .send_json(request, &format!("create snapshot of server {}", server_id))
            .await?;
        Ok(response.action)
    }

    async fn delete_server(&self, id: u64) -> Result<Action> {
        let request = self.client.delete(self.url(&format!("/servers/{}", id)));
        let envelope: ActionEnvelope = self
            .send_json(request, &format!("delete server {}", id))
            .await?;
        Ok(envelope.action)
    }

    async fn create_server(&self, request: &CreateServerRequest) -> Result<CreatedServer> {
        let builder = self.client.post(self.url("/servers")).json(request);
        self.send_json(builder, &format!("create server {}", request.name))
            .await
    }

    async fn change_server_type(
        &self,
        id: u64,
        server_type: &str,
        upgrade_disk: bool,
    ) -> Result<Action> {
        let request = self
            .client
            .post(self.url(&format!("/servers/{}/actions/change_type", id)))
            .json(&ChangeTypeRequest {
                server_type,
                upgrade_disk,
            });
        let envelope: ActionEnvelope = self
            .send_json(request, &format!("change type of server {}", id))
            .await?;
        Ok(envelope.action)
    }

    async fn list_snapshots(&self) -> Result<Vec<Image>> {
        let mut images = Vec::new();
        let mut page = 1;

        loop {
            let request = self.client.get(self.url("/images")).query(&[
                ("type", "snapshot".to_string()),
                ("page", page.to_string()),
                ("per_page", PAGE_SIZE.to_string()),
            ]);
            let body: ImagesPage = self.send_json(request, "list snapshots").await?;
            images.extend(body.images);

            match body.meta.and_then(|m| m.pagination.next_page) {
                Some(next) => page = next,
                None => return Ok(images),
            }
        }
    }

    async fn delete_image(&self, id: u64) -> Result<()> {
        let request = self.client.delete(self.url(&format!("/images/{}", id)));
        self.send(request, &format!("delete image {}", id)).await?;
        Ok(())
    }

    async fn get_action(&self, id: u64) -> Result<Action> {
        let request = self.client.get(self.url(&format!("/actions/{}", id)));
        let envelope: ActionEnvelope = self
            .send_json(request, &format!("get action {}", id))
            .await?;
        Ok(envelope.action)
    }
}
