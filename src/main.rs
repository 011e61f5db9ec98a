use sentinel::config::SentinelConfig;
use sentinel::probe::{Aggregator, Pm2Source, StatusCache, SystemClock, TcpPortProber};
use sentinel::server::{run_health_server, shutdown_channel, wait_for_signal};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting sentinel health aggregator");

    let config = SentinelConfig::from_env();
    for service in &config.services {
        info!(
            service = %service.name,
            pm2_name = %service.pm2_name,
            host = %service.host,
            port = ?service.port,
            "Monitoring service"
        );
    }

    let clock = Arc::new(SystemClock);
    let aggregator = Aggregator::new(
        config.services.clone(),
        Arc::new(Pm2Source::new(config.pm2_bin.clone(), config.supervisor_timeout)),
        Arc::new(TcpPortProber),
        config.port_probe_timeout,
        clock.clone(),
    );
    let cache = Arc::new(StatusCache::new(aggregator, clock, config.freshness_window));

    let (shutdown_controller, shutdown_signal) = shutdown_channel();

    let mut server = tokio::spawn(run_health_server(config.listen_addr, cache, shutdown_signal));

    tokio::select! {
        result = &mut server => {
            // The server only returns on its own if binding or accepting failed
            match result {
                Ok(Ok(())) => info!("Health server exited"),
                Ok(Err(e)) => {
                    error!(error = %e, addr = %config.listen_addr, "Health server failed");
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            }
            return Ok(());
        }
        signal = wait_for_signal() => {
            let signal = signal?;
            info!(signal = signal, "Initiating graceful shutdown");
        }
    }

    shutdown_controller.shutdown();

    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Health server failed during shutdown"),
        Err(e) => error!(error = %e, "Health server task panicked"),
    }

    info!("sentinel shut down gracefully");
    Ok(())
}
