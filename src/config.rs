//! Environment configuration for the sentinel
//!
//! - `SERVICES` - JSON array of monitored services
//! - `PM2_BIN` - supervisor executable (default: `pm2`, resolved via `PATH`)
//!
//! A missing or malformed `SERVICES` value never stops startup; the built-in
//! backend/frontend pair is used instead.

use serde::Deserialize;
use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Fixed listen port on the loopback interface
pub const LISTEN_PORT: u16 = 8088;

/// Upper bound for a single TCP connect attempt
pub const PORT_PROBE_TIMEOUT: Duration = Duration::from_millis(1200);

/// Upper bound for one supervisor list invocation
pub const SUPERVISOR_TIMEOUT: Duration = Duration::from_millis(1500);

/// Maximum age of a cached aggregated status
pub const FRESHNESS_WINDOW: Duration = Duration::from_millis(5000);

const DEFAULT_PM2_BIN: &str = "pm2";
const DEFAULT_HOST: &str = "127.0.0.1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("SERVICES is not a JSON array: {0}")]
    InvalidJson(String),

    #[error("SERVICES is an empty list")]
    Empty,
}

/// One monitored service
///
/// Identity is `name`; `pm2_name` is what the supervisor reports. A `port`
/// of `None` comes from an unusable entry and is never reachable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub name: String,
    pub pm2_name: String,
    pub host: String,
    pub port: Option<u16>,
}

impl ServiceSpec {
    /// Create a fully specified service
    pub fn new(name: &str, pm2_name: &str, host: &str, port: u16) -> Self {
        Self {
            name: name.to_string(),
            pm2_name: pm2_name.to_string(),
            host: host.to_string(),
            port: Some(port),
        }
    }

    /// Check if the entry carries everything needed to be probed
    pub fn is_complete(&self) -> bool {
        !self.pm2_name.is_empty() && self.port.is_some()
    }
}

/// Port as written in `SERVICES`: a number, or a numeric string when the
/// value was templated from another environment variable
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u64),
    Text(String),
}

impl PortValue {
    fn to_port(&self) -> Option<u16> {
        let port = match self {
            PortValue::Number(n) => u16::try_from(*n).ok()?,
            PortValue::Text(s) => s.trim().parse::<u16>().ok()?,
        };
        (port != 0).then_some(port)
    }
}

/// Wire shape of a `SERVICES` entry; every field is optional so a single
/// bad entry cannot invalidate the list
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawServiceSpec {
    name: Option<String>,
    pm2_name: Option<String>,
    host: Option<String>,
    port: Option<PortValue>,
}

impl RawServiceSpec {
    fn into_spec(self, index: usize) -> ServiceSpec {
        let pm2_name = self.pm2_name.unwrap_or_default();
        let name = self
            .name
            .filter(|n| !n.is_empty())
            .or_else(|| Some(pm2_name.clone()).filter(|n| !n.is_empty()))
            .unwrap_or_else(|| format!("service-{}", index));
        let host = self
            .host
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        ServiceSpec {
            name,
            pm2_name,
            host,
            port: self.port.as_ref().and_then(PortValue::to_port),
        }
    }
}

/// Built-in service list used when `SERVICES` is absent or unusable
pub fn default_services() -> Vec<ServiceSpec> {
    vec![
        ServiceSpec::new("backend", "backend", DEFAULT_HOST, 3000),
        ServiceSpec::new("frontend", "front", DEFAULT_HOST, 3001),
    ]
}

/// Parse a `SERVICES` value
///
/// Only a value that is not a JSON array, or an empty array, is an error.
/// Entries that cannot be used are kept and logged; they report unhealthy.
/// `None` (variable unset) is reported as [`ConfigError::Empty`].
pub fn parse_services(raw: Option<&str>) -> Result<Vec<ServiceSpec>, ConfigError> {
    let Some(raw) = raw else {
        return Err(ConfigError::Empty);
    };

    let entries: Vec<serde_json::Value> =
        serde_json::from_str(raw).map_err(|e| ConfigError::InvalidJson(e.to_string()))?;

    if entries.is_empty() {
        return Err(ConfigError::Empty);
    }

    let services: Vec<ServiceSpec> = entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let raw_spec = serde_json::from_value::<RawServiceSpec>(entry).unwrap_or_else(|e| {
                warn!(index, error = %e, "Unreadable SERVICES entry");
                RawServiceSpec::default()
            });
            raw_spec.into_spec(index)
        })
        .collect();

    let mut seen = HashSet::new();
    for service in &services {
        if !service.is_complete() {
            warn!(
                service = %service.name,
                pm2_name = %service.pm2_name,
                port = ?service.port,
                "SERVICES entry is incomplete, it will always report unhealthy"
            );
        }
        if !seen.insert(service.name.as_str()) {
            warn!(service = %service.name, "Duplicate service name in SERVICES");
        }
    }

    Ok(services)
}

/// Parse a `SERVICES` value, falling back to [`default_services`]
pub fn services_or_default(raw: Option<&str>) -> Vec<ServiceSpec> {
    match parse_services(raw) {
        Ok(services) => services,
        Err(ConfigError::Empty) if raw.is_none() => default_services(),
        Err(e) => {
            warn!(error = %e, "Ignoring SERVICES, using built-in service list");
            default_services()
        }
    }
}

/// Runtime configuration, read once at startup
#[derive(Debug, Clone)]
pub struct SentinelConfig {
    pub services: Vec<ServiceSpec>,
    pub pm2_bin: String,
    pub listen_addr: SocketAddr,
    pub port_probe_timeout: Duration,
    pub supervisor_timeout: Duration,
    pub freshness_window: Duration,
}

impl SentinelConfig {
    /// Build configuration from explicit variable values
    pub fn from_vars(services: Option<&str>, pm2_bin: Option<&str>) -> Self {
        let pm2_bin = pm2_bin
            .filter(|b| !b.is_empty())
            .unwrap_or(DEFAULT_PM2_BIN)
            .to_string();

        Self {
            services: services_or_default(services),
            pm2_bin,
            listen_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, LISTEN_PORT)),
            port_probe_timeout: PORT_PROBE_TIMEOUT,
            supervisor_timeout: SUPERVISOR_TIMEOUT,
            freshness_window: FRESHNESS_WINDOW,
        }
    }

    /// Build configuration from the process environment
    pub fn from_env() -> Self {
        let services = std::env::var("SERVICES").ok();
        let pm2_bin = std::env::var("PM2_BIN").ok();
        let config = Self::from_vars(services.as_deref(), pm2_bin.as_deref());

        info!(
            services = config.services.len(),
            pm2_bin = %config.pm2_bin,
            "Configuration loaded"
        );
        config
    }
}
