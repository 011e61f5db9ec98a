//! Health signal collection and aggregation
//!
//! - `port` - TCP reachability per service
//! - `supervisor` - PM2-reported online processes
//! - `aggregator` - concurrent fan-out and AND-fold of both signals
//! - `cache` - bounds probe frequency under repeated polling

pub mod aggregator;
pub mod cache;
pub mod clock;
pub mod port;
pub mod supervisor;

pub use aggregator::{AggregatedStatus, Aggregator, ProbeResult, ServiceHealth};
pub use cache::StatusCache;
pub use clock::{Clock, SystemClock};
pub use port::{probe_port, PortProber, TcpPortProber};
pub use supervisor::{
    parse_process_list, Pm2Source, ProcessSnapshot, SupervisorError, SupervisorSource,
};
