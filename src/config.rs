// ABOUTME: Configuration loading from environment variables and an optional TOML file
// ABOUTME: Environment values override file values; components receive the loaded Config

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::HibernateError;

pub const DEFAULT_CLOUD_API_URL: &str = "https://api.hetzner.cloud/v1";
pub const DEFAULT_DNS_API_URL: &str = "https://dns.hetzner.com";
pub const DEFAULT_RECORD_TTL: u32 = 60;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct Config {
    pub cloud_api_token: String,
    pub cloud_api_url: String,
    pub dns: DnsSettings,
    pub servers: ServerSettings,
    pub tracking: TrackingSettings,
}

#[derive(Debug, Clone)]
pub struct DnsSettings {
    pub api_token: String,
    pub api_url: String,
    pub zone_id: String,
    /// Marks records owned by this tool, e.g. `.internal`.
    pub suffix: String,
    pub record_ttl: u32,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Type used while provisioning from a snapshot. Keeps the disk at its minimum size.
    pub provisioning_type: String,
    pub target_type: String,
    pub location: String,
    pub ssh_key: String,
    pub power_on_after_resize: bool,
}

#[derive(Debug, Clone)]
pub struct TrackingSettings {
    pub poll_interval: Duration,
    /// `None` waits for as long as the provider takes.
    pub timeout: Option<Duration>,
}

/// Raw key set shared by the TOML file and the environment.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    cloud_api_token: Option<String>,
    cloud_api_url: Option<String>,
    dns_api_token: Option<String>,
    dns_api_url: Option<String>,
    dns_zone: Option<String>,
    dns_subdomain_suffix: Option<String>,
    dns_record_ttl: Option<u32>,
    smallest_possible_server_type: Option<String>,
    server_type: Option<String>,
    instance_region: Option<String>,
    ssh_key_name: Option<String>,
    power_on_after_resize: Option<bool>,
    action_poll_interval_secs: Option<u64>,
    action_timeout_secs: Option<u64>,
}

impl Config {
    /// Load `.env`, then the optional TOML file, then let the process environment override.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let file = match path {
            Some(path) => read_file(path)?,
            None => RawConfig::default(),
        };

        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    fn from_sources(file: RawConfig, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let text = |key: &str, fallback: Option<String>| {
            env(key).filter(|v| !v.is_empty()).or(fallback)
        };
        let required = |key: &'static str, fallback: Option<String>| {
            text(key, fallback).ok_or_else(|| {
                HibernateError::Config(format!("missing required setting {}", key))
            })
        };

        let suffix = required("DNS_SUBDOMAIN_SUFFIX", file.dns_subdomain_suffix)?;

        let record_ttl = parse_number("DNS_RECORD_TTL", env("DNS_RECORD_TTL"))?
            .or(file.dns_record_ttl)
            .unwrap_or(DEFAULT_RECORD_TTL);

        let poll_interval =
            parse_number("ACTION_POLL_INTERVAL_SECS", env("ACTION_POLL_INTERVAL_SECS"))?
                .or(file.action_poll_interval_secs)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_POLL_INTERVAL);

        let timeout = parse_number("ACTION_TIMEOUT_SECS", env("ACTION_TIMEOUT_SECS"))?
            .or(file.action_timeout_secs)
            .map(Duration::from_secs);

        let power_on_after_resize = match env("POWER_ON_AFTER_RESIZE") {
            Some(v) => parse_bool("POWER_ON_AFTER_RESIZE", &v)?,
            None => file.power_on_after_resize.unwrap_or(true),
        };

        Ok(Self {
            cloud_api_token: required("CLOUD_API_TOKEN", file.cloud_api_token)?,
            cloud_api_url: text("CLOUD_API_URL", file.cloud_api_url)
                .unwrap_or_else(|| DEFAULT_CLOUD_API_URL.to_string()),
            dns: DnsSettings {
                api_token: required("DNS_API_TOKEN", file.dns_api_token)?,
                api_url: text("DNS_API_URL", file.dns_api_url)
                    .unwrap_or_else(|| DEFAULT_DNS_API_URL.to_string()),
                zone_id: required("DNS_ZONE", file.dns_zone)?,
                suffix,
                record_ttl,
            },
            servers: ServerSettings {
                provisioning_type: required(
                    "SMALLEST_POSSIBLE_SERVER_TYPE",
                    file.smallest_possible_server_type,
                )?,
                target_type: required("SERVER_TYPE", file.server_type)?,
                location: required("INSTANCE_REGION", file.instance_region)?,
                ssh_key: required("SSH_KEY_NAME", file.ssh_key_name)?,
                power_on_after_resize,
            },
            tracking: TrackingSettings {
                poll_interval,
                timeout,
            },
        })
    }
}

fn read_file(path: &Path) -> Result<RawConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&text)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

fn parse_number<T: std::str::FromStr>(key: &str, value: Option<String>) -> Result<Option<T>> {
    match value {
        Some(v) if !v.is_empty() => v.trim().parse::<T>().map(Some).map_err(|_| {
            HibernateError::Config(format!("{} must be a non-negative integer, got {:?}", key, v))
                .into()
        }),
        _ => Ok(None),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(HibernateError::Config(format!(
            "{} must be a boolean, got {:?}",
            key, value
        ))
        .into()),
    }
}
