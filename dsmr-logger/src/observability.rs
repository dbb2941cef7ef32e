use tracing_subscriber::EnvFilter;

/// Used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "dsmr_logger=info,dsmr_client=info,warn";

/// `RUST_LOG` replaces the default filter entirely.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .init();
}
