use crate::prelude::*;

use anyhow::Context;
use serde::Deserialize;
use std::time::Duration;

/// The eight channels polled every cycle, in canonical order.
pub const MONITORED_CHANNELS: [&str; 8] = [
    "Pac",
    "Ipv",
    "Vpv",
    "E-Total",
    "h-Total",
    "Temperature",
    "Vac",
    "Fac",
];

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Bus endpoint; always taken from the command line.
    #[serde(skip)]
    pub device: String,

    #[serde(default)]
    pub database: Database,

    #[serde(default = "Config::default_interval")]
    pub interval: u64,

    #[serde(default)]
    pub close_between_cycles: bool,

    /// Channels polled per device per cycle.
    #[serde(default = "Config::default_channels")]
    pub channels: Vec<String>,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,

    pub frame_log: Option<String>,

    /// Bus timeout before the first byte of a response, milliseconds.
    #[serde(default = "Config::default_timeout_long_ms")]
    pub timeout_long_ms: u64,

    /// Quiet window that ends a read once bytes have arrived, milliseconds.
    #[serde(default = "Config::default_timeout_short_ms")]
    pub timeout_short_ms: u64,

    /// Settle time after the online broadcast before the first data
    /// request, seconds.
    #[serde(default = "Config::default_online_settle_secs")]
    pub online_settle_secs: u64,
}

// Database {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Database {
    #[serde(default = "Config::default_database_url")]
    pub url: String,
}

impl Database {
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Default for Database {
    fn default() -> Self {
        Self {
            url: Config::default_database_url(),
        }
    }
}
// }}}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: String::new(),
            database: Database::default(),
            interval: Self::default_interval(),
            close_between_cycles: false,
            channels: Self::default_channels(),
            loglevel: Self::default_loglevel(),
            frame_log: None,
            timeout_long_ms: Self::default_timeout_long_ms(),
            timeout_short_ms: Self::default_timeout_short_ms(),
            online_settle_secs: Self::default_online_settle_secs(),
        }
    }
}

impl Config {
    /// Builds the effective configuration: the optional YAML file first,
    /// then command-line flags on top.
    pub fn new(options: &Options) -> Result<Self> {
        let mut config: Config = match &options.config_file {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path))?;
                serde_yaml::from_str(&text)
                    .with_context(|| format!("parsing config file {}", path))?
            }
            None => Config::default(),
        };

        config.device = options.device.clone();
        if let Some(interval) = options.interval {
            config.interval = interval;
        }
        if options.close_between_cycles {
            config.close_between_cycles = true;
        }
        if let Some(dir) = &options.frame_log {
            config.frame_log = Some(dir.clone());
        }
        if let Some(url) = &options.database {
            config.database.url = url.clone();
        }
        if options.very_verbose {
            config.loglevel = "trace".to_string();
        } else if options.verbose {
            config.loglevel = "debug".to_string();
        }

        if config.interval == 0 {
            bail!("poll interval must be positive");
        }
        if config.channels.is_empty() {
            bail!("at least one monitored channel is required");
        }

        Ok(config)
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn close_between_cycles(&self) -> bool {
        self.close_between_cycles
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn loglevel(&self) -> &str {
        &self.loglevel
    }

    pub fn frame_log(&self) -> Option<&str> {
        self.frame_log.as_deref()
    }

    pub fn timeout_long(&self) -> Duration {
        Duration::from_millis(self.timeout_long_ms)
    }

    pub fn timeout_short(&self) -> Duration {
        Duration::from_millis(self.timeout_short_ms)
    }

    pub fn online_settle(&self) -> Duration {
        Duration::from_secs(self.online_settle_secs)
    }

    fn default_interval() -> u64 {
        60
    }

    fn default_channels() -> Vec<String> {
        MONITORED_CHANNELS.iter().map(|s| s.to_string()).collect()
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }

    fn default_database_url() -> String {
        "postgres://localhost/sunnyboy".to_string()
    }

    fn default_timeout_long_ms() -> u64 {
        crate::transport::TIMEOUT_LONG.as_millis() as u64
    }

    fn default_timeout_short_ms() -> u64 {
        crate::transport::TIMEOUT_SHORT.as_millis() as u64
    }

    fn default_online_settle_secs() -> u64 {
        5
    }
}
