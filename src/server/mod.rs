//! HTTP surface for the aggregated health status
//!
//! - `/health` - status-code probe with CORS for maintenance pages
//! - `/health-pixel` - image probe for `<img>` polling
//!
//! Also provides graceful shutdown handling for SIGTERM/SIGINT.

mod health;
pub mod shutdown;

pub use health::{build_router, run_health_server, serve, PIXEL_GIF};
pub use shutdown::{shutdown_channel, wait_for_signal, ShutdownController, ShutdownSignal};

#[cfg(test)]
#[path = "health_test.rs"]
mod health_tests;

#[cfg(test)]
#[path = "shutdown_test.rs"]
mod shutdown_tests;
