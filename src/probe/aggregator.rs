//! Aggregation of supervisor and port signals into one verdict
//!
//! Each cycle issues one supervisor query and one port probe per service,
//! concurrently, and folds them with AND. Nothing is spawned: every probe
//! future is joined before `compute_status` returns.

use crate::config::ServiceSpec;
use crate::probe::clock::Clock;
use crate::probe::port::PortProber;
use crate::probe::supervisor::SupervisorSource;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Signals collected for one service in one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub supervisor_online: bool,
    pub port_reachable: bool,
}

impl ProbeResult {
    /// A service is healthy only when both signals are up
    pub fn verdict(&self) -> bool {
        self.supervisor_online && self.port_reachable
    }
}

/// Per-service outcome, keyed by the service's logical name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHealth {
    pub name: String,
    pub result: ProbeResult,
}

/// Outcome of one aggregation cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedStatus {
    pub overall: bool,
    pub computed_at: DateTime<Utc>,
    pub services: Vec<ServiceHealth>,
}

impl AggregatedStatus {
    /// Fold per-service results
    ///
    /// An empty service list is healthy: there is nothing that could be down.
    pub fn from_services(services: Vec<ServiceHealth>, computed_at: DateTime<Utc>) -> Self {
        let overall = services.iter().all(|s| s.result.verdict());
        Self {
            overall,
            computed_at,
            services,
        }
    }

    /// Services whose verdict is false, in configuration order
    pub fn unhealthy(&self) -> impl Iterator<Item = &ServiceHealth> {
        self.services.iter().filter(|s| !s.result.verdict())
    }
}

/// Combines supervisor and port signals for a fixed service list
///
/// Holds no state between cycles; caching is the caller's concern.
pub struct Aggregator {
    services: Arc<[ServiceSpec]>,
    supervisor: Arc<dyn SupervisorSource>,
    prober: Arc<dyn PortProber>,
    port_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl Aggregator {
    /// Create an aggregator over `services`
    ///
    /// `port_timeout` bounds each TCP connect attempt.
    pub fn new(
        services: Vec<ServiceSpec>,
        supervisor: Arc<dyn SupervisorSource>,
        prober: Arc<dyn PortProber>,
        port_timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            services: services.into(),
            supervisor,
            prober,
            port_timeout,
            clock,
        }
    }

    /// Run one probe cycle over every configured service
    pub async fn compute_status(&self) -> AggregatedStatus {
        let computed_at = self.clock.now();

        // Entries without a usable port are unreachable by definition
        let port_probes = join_all(self.services.iter().map(|s| async move {
            match s.port {
                Some(port) => self.prober.probe(&s.host, port, self.port_timeout).await,
                None => false,
            }
        }));
        let (online, reachable) = tokio::join!(self.supervisor.fetch_online(), port_probes);

        let services: Vec<ServiceHealth> = self
            .services
            .iter()
            .zip(reachable)
            .map(|(spec, port_reachable)| ServiceHealth {
                name: spec.name.clone(),
                result: ProbeResult {
                    supervisor_online: !spec.pm2_name.is_empty()
                        && online.contains(&spec.pm2_name),
                    port_reachable,
                },
            })
            .collect();

        let status = AggregatedStatus::from_services(services, computed_at);

        for service in status.unhealthy() {
            warn!(
                service = %service.name,
                supervisor_online = service.result.supervisor_online,
                port_reachable = service.result.port_reachable,
                "Service unhealthy"
            );
        }
        debug!(
            overall = status.overall,
            services = status.services.len(),
            "Aggregation cycle complete"
        );

        status
    }
}

#[cfg(test)]
#[path = "aggregator_test.rs"]
mod tests;
