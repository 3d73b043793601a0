// ABOUTME: HTTP client for the DNS REST API
// ABOUTME: Reads zones and records and applies record deletes and bulk updates/creates

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;

use super::models::{
    BulkRecords, BulkResponse, DnsRecord, NewDnsRecord, RecordsResponse, Zone, ZoneResponse,
};
use super::DnsApi;

const TOKEN_HEADER: &str = "Auth-API-Token";

pub struct DnsClient {
    client: Client,
    api_base_url: String,
    token: String,
}

impl DnsClient {
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
        format!("{}/api/v1{}", self.api_base_url, path)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = request
            .header(TOKEN_HEADER, self.token.as_str())
            .send()
            .await
            .with_context(|| format!("Failed to {}. The DNS API may be unavailable", what))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to {} (status {}): {}", what, status, body);
        }

        Ok(response)
    }

    async fn send_bulk(&self, request: RequestBuilder, what: &str, count: usize) -> Result<()> {
        let response = self.send(request, what).await?;
        let body: BulkResponse = response.json().await.unwrap_or_default();

        let rejected = body.rejected();
        if rejected > 0 {
            anyhow::bail!("Failed to {}: {} of {} record(s) rejected", what, rejected, count);
        }
        Ok(())
    }
}

#[async_trait]
impl DnsApi for DnsClient {
    async fn get_zone(&self, zone_id: &str) -> Result<Zone> {
        let request = self.client.get(self.url(&format!("/zones/{}", zone_id)));
        let response = self.send(request, &format!("get zone {}", zone_id)).await?;
        let body: ZoneResponse = response
            .json()
            .await
            .context("Failed to parse zone response")?;
        Ok(body.zone)
    }

    async fn list_records(&self, zone_id: &str) -> Result<Vec<DnsRecord>> {
        let request = self
            .client
            .get(self.url("/records"))
            .query(&[("zone_id", zone_id)]);
        let response = self
            .send(request, &format!("list records of zone {}", zone_id))
            .await?;
        let body: RecordsResponse = response
            .json()
            .await
            .context("Failed to parse record list")?;
        Ok(body.records)
    }

    async fn delete_record(&self, id: &str) -> Result<()> {
        let request = self.client.delete(self.url(&format!("/records/{}", id)));
        self.send(request, &format!("delete record {}", id)).await?;
        Ok(())
    }

    async fn update_records(&self, records: &[DnsRecord]) -> Result<()> {
        let request = self
            .client
            .put(self.url("/records/bulk"))
            .json(&BulkRecords { records });
        self.send_bulk(request, "update records", records.len()).await
    }

    async fn create_records(&self, records: &[NewDnsRecord]) -> Result<()> {
        let request = self
            .client
            .post(self.url("/records/bulk"))
            .json(&BulkRecords { records });
        self.send_bulk(request, "create records", records.len()).await
    }
}
