// src/config.rs

use crate::types::Interval;
use crate::utils::precision::RoundingPolicy;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct InstrumentConfig {
    pub id: String,
    pub name: String,
    pub endpoint: String,
    pub topic: String,
    // None keeps source precision
    #[serde(default)]
    pub decimal_places: Option<u32>,
}

impl InstrumentConfig {
    pub fn rounding(&self) -> RoundingPolicy {
        RoundingPolicy::from_places(self.decimal_places)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    pub level: String,
    pub directory: String,
    pub file_prefix: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub api_base_url: String,
    pub push_url: String,
    pub default_interval: String,
    pub supported_intervals: Vec<String>,
    pub poll_interval_secs: u64,
    pub fetch_on_start: bool,
    pub reconnect_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub headless: bool,
    pub log: LogConfig,
    #[serde(default = "default_instruments")]
    pub instruments: Vec<InstrumentConfig>,
}

fn default_instruments() -> Vec<InstrumentConfig> {
    vec![
        InstrumentConfig {
            id: "bitcoin".to_string(),
            name: "Bitcoin".to_string(),
            endpoint: "/api/bitcoin".to_string(),
            topic: "new_data".to_string(),
            decimal_places: None,
        },
        InstrumentConfig {
            id: "usd-thb".to_string(),
            name: "USD/THB".to_string(),
            endpoint: "/api/usd-to-thb".to_string(),
            topic: "new_usd_to_thb_data".to_string(),
            decimal_places: Some(2),
        },
    ]
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_builder(
            Config::builder()
                .add_source(File::with_name("Settings").required(false))
                .add_source(
                    Environment::with_prefix("APP")
                        .separator("__")
                        .list_separator(",")
                        .with_list_parse_key("supported_intervals")
                        .try_parsing(true),
                ),
        )
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let config: AppConfig = builder
            .set_default("api_base_url", "http://localhost:5000")?
            .set_default("push_url", "http://localhost:5000")?
            .set_default("default_interval", "15m")?
            .set_default("supported_intervals", vec!["15m", "1h", "4h", "1d"])?
            .set_default("poll_interval_secs", 0)?
            .set_default("fetch_on_start", true)?
            .set_default("reconnect_delay_ms", 2000)?
            .set_default("request_timeout_secs", 10)?
            .set_default("headless", false)?
            .set_default("log.level", "info")?
            .set_default("log.directory", "logs")?
            .set_default("log.file_prefix", "quote_watch.log")?
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instruments.is_empty() {
            return Err(ConfigError::Message("no instruments configured".into()));
        }
        let mut ids = HashSet::new();
        for instrument in &self.instruments {
            if !ids.insert(instrument.id.as_str()) {
                return Err(ConfigError::Message(format!(
                    "duplicate instrument id {}",
                    instrument.id
                )));
            }
        }
        if self.supported_intervals.is_empty() {
            return Err(ConfigError::Message("supported_intervals is empty".into()));
        }
        if !self.supported_intervals.contains(&self.default_interval) {
            return Err(ConfigError::Message(format!(
                "default_interval {} is not in supported_intervals",
                self.default_interval
            )));
        }
        Ok(())
    }

    pub fn intervals(&self) -> Vec<Interval> {
        self.supported_intervals
            .iter()
            .map(|key| Interval::new(key.as_str()))
            .collect()
    }

    pub fn initial_interval(&self) -> Interval {
        Interval::new(self.default_interval.as_str())
    }

    pub fn poll_every(&self) -> Option<Duration> {
        (self.poll_interval_secs > 0).then(|| Duration::from_secs(self.poll_interval_secs))
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
