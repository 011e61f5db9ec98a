//! Sentinel: aggregated health probe for PM2-managed services
//!
//! A service is healthy when PM2 reports it `online` and its TCP port accepts
//! connections. The AND over all services is cached for a few seconds and
//! exposed over HTTP for maintenance pages and load balancers.

pub mod config;
pub mod probe;
pub mod server;
