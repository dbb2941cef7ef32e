pub mod display;
#[cfg(feature = "json-export")]
pub mod json_export;
#[cfg(feature = "prometheus")]
pub mod gauges;

pub use display::DisplayPublisher;
#[cfg(feature = "json-export")]
pub use json_export::JsonExportPublisher;
#[cfg(feature = "prometheus")]
pub use gauges::MetricsPublisher;

use crate::state::Snapshot;

#[derive(thiserror::Error, Debug)]
pub enum PublishError {
    #[error("io error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serialize(String),
}

/// Consumer of the read-only snapshot, invoked from the scheduler.
///
/// A failing publisher is logged and skipped; it never stops the loop.
pub trait Publisher {
    fn name(&self) -> &'static str;

    fn publish(&mut self, snapshot: &Snapshot<'_>) -> Result<(), PublishError>;
}
