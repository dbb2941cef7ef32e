use serde::Deserialize;
use std::{fs, path::PathBuf, time::Duration};

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Spool file the serial capture overwrites with the newest telegram.
    pub source_path: PathBuf,
    #[serde(default = "default_true")]
    pub require_crc: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_telegram_secs")]
    pub telegram_secs: u64,
    #[serde(default = "default_rollover_check_secs")]
    pub rollover_check_secs: u64,
    #[serde(default = "default_display_secs")]
    pub display_secs: u64,
    #[serde(default = "default_publish_secs")]
    pub publish_secs: u64,
    #[serde(default = "default_clock_resync_secs")]
    pub clock_resync_secs: u64,
    #[serde(default = "default_network_secs")]
    pub network_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// host:port that must be reachable for the link to count as up.
    pub probe_addr: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_hostname")]
    pub hostname: String,
    pub data_dir: PathBuf,
    /// Used when the OS cannot report the local offset, e.g. "+01:00".
    #[serde(default)]
    pub utc_offset: Option<String>,
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub timers: TimerConfig,
    pub network: Option<NetworkConfig>,
    pub metrics: Option<MetricsConfig>,
    pub export: Option<ExportConfig>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("timer interval '{0}' must be greater than zero")]
    ZeroInterval(&'static str),
    #[error("network.connect_timeout_secs must be greater than zero")]
    ZeroConnectTimeout,
    #[error("invalid utc_offset '{0}', expected +HH:MM")]
    UtcOffset(String),
}

fn default_true() -> bool {
    true
}
fn default_hostname() -> String {
    "DSMR-API".to_string()
}
fn default_telegram_secs() -> u64 {
    10
}
fn default_rollover_check_secs() -> u64 {
    1
}
fn default_display_secs() -> u64 {
    5
}
fn default_publish_secs() -> u64 {
    60
}
fn default_clock_resync_secs() -> u64 {
    600
}
fn default_network_secs() -> u64 {
    1800
}
fn default_connect_timeout_secs() -> u64 {
    30
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            telegram_secs: default_telegram_secs(),
            rollover_check_secs: default_rollover_check_secs(),
            display_secs: default_display_secs(),
            publish_secs: default_publish_secs(),
            clock_resync_secs: default_clock_resync_secs(),
            network_secs: default_network_secs(),
        }
    }
}

impl TimerConfig {
    pub fn telegram(&self) -> Duration {
        Duration::from_secs(self.telegram_secs)
    }
    pub fn rollover_check(&self) -> Duration {
        Duration::from_secs(self.rollover_check_secs)
    }
    pub fn display(&self) -> Duration {
        Duration::from_secs(self.display_secs)
    }
    pub fn publish(&self) -> Duration {
        Duration::from_secs(self.publish_secs)
    }
    pub fn clock_resync(&self) -> Duration {
        Duration::from_secs(self.clock_resync_secs)
    }
    pub fn network(&self) -> Duration {
        Duration::from_secs(self.network_secs)
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("DSMR_LOGGER_CONFIG").unwrap_or_else(|_| "dsmr-logger.toml".to_string());
        let contents = fs::read_to_string(&path)?;
        let cfg = Self::from_toml(&contents)?;
        Ok(cfg)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.timers;
        for (name, secs) in [
            ("telegram_secs", t.telegram_secs),
            ("rollover_check_secs", t.rollover_check_secs),
            ("display_secs", t.display_secs),
            ("publish_secs", t.publish_secs),
            ("clock_resync_secs", t.clock_resync_secs),
            ("network_secs", t.network_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::ZeroInterval(name));
            }
        }
        if self.network.as_ref().is_some_and(|n| n.connect_timeout_secs == 0) {
            return Err(ConfigError::ZeroConnectTimeout);
        }
        self.fallback_offset()?;
        Ok(())
    }

    pub fn fallback_offset(&self) -> Result<time::UtcOffset, ConfigError> {
        let Some(raw) = &self.utc_offset else {
            return Ok(time::UtcOffset::UTC);
        };
        let format = time::macros::format_description!("[offset_hour sign:mandatory]:[offset_minute]");
        time::UtcOffset::parse(raw.trim(), &format).map_err(|_| ConfigError::UtcOffset(raw.clone()))
    }
}
