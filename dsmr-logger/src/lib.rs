pub mod aggregate;
pub mod clock;
pub mod config;
#[cfg(feature = "prometheus")]
pub mod metrics_server;
pub mod network;
pub mod observability;
pub mod publishers;
pub mod scheduler;
pub mod sources;
pub mod state;
pub mod store;
pub mod timebase;
pub mod timer;

pub use scheduler::Scheduler;
pub use state::{LoggerState, Snapshot};
