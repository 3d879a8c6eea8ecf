use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use chrono::{DateTime, Utc};

use crate::modem::TxConfig;
use crate::predict::{default_table, OrbitElement, PredictionConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub modem: ModemConfig,
    #[serde(default)]
    pub gpio: GpioConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub prediction: PredictionSettings,
    /// Orbit table; the compiled-in table is used when empty.
    #[serde(default)]
    pub satellites: Vec<OrbitElement>,
    #[serde(default)]
    pub position: PositionConfig,
    pub predictor: PredictorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModemConfig {
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(
        default = "default_base_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub base_timeout: Duration,
    #[serde(default)]
    pub tx: TxConfig,
}

fn default_port() -> String {
    "/dev/ttyHS0".to_string()
}

fn default_baud_rate() -> u32 {
    4800
}

fn default_base_timeout() -> Duration {
    Duration::from_millis(50)
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            base_timeout: default_base_timeout(),
            tx: TxConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GpioConfig {
    #[serde(default = "default_gpio_base")]
    pub base: PathBuf,
    #[serde(default = "default_power_pin")]
    pub power_pin: u32,
    #[serde(default = "default_reset_pin")]
    pub reset_pin: u32,
    #[serde(default = "default_settle", deserialize_with = "deserialize_duration")]
    pub settle: Duration,
}

fn default_gpio_base() -> PathBuf {
    PathBuf::from("/sys/class/gpio")
}

fn default_power_pin() -> u32 {
    42
}

fn default_reset_pin() -> u32 {
    2
}

fn default_settle() -> Duration {
    Duration::from_millis(50)
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            base: default_gpio_base(),
            power_pin: default_power_pin(),
            reset_pin: default_reset_pin(),
            settle: default_settle(),
        }
    }
}

/// Cadence of the scheduler. All durations accept humantime strings
/// ("90s", "2h", "1m 30s").
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScheduleConfig {
    /// Time between two transmissions inside a pass.
    #[serde(
        default = "default_tx_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub tx_interval: Duration,
    /// Wake delay used when a pass is already open at startup.
    #[serde(
        default = "default_immediate",
        deserialize_with = "deserialize_duration"
    )]
    pub immediate: Duration,
    /// Subtracted from the first pass epoch at startup.
    #[serde(
        default = "default_startup_lead",
        deserialize_with = "deserialize_duration"
    )]
    pub startup_lead: Duration,
    #[serde(default = "default_startup_attempts")]
    pub startup_attempts: u32,
    #[serde(
        default = "default_retry_delay",
        deserialize_with = "deserialize_duration"
    )]
    pub retry_delay: Duration,
    #[serde(
        default = "default_prediction_horizon",
        deserialize_with = "deserialize_duration"
    )]
    pub prediction_horizon: Duration,
}

fn default_tx_interval() -> Duration {
    Duration::from_secs(90)
}

fn default_immediate() -> Duration {
    Duration::from_secs(1)
}

fn default_startup_lead() -> Duration {
    Duration::from_secs(2 * 3600)
}

fn default_startup_attempts() -> u32 {
    5
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(15)
}

const MAX_PREDICTION_HORIZON: Duration = Duration::from_secs(366 * 24 * 3600);

fn default_prediction_horizon() -> Duration {
    Duration::from_secs(24 * 3600)
}

impl ScheduleConfig {
    /// End of a pass search starting at `start`, saturating at the last
    /// representable instant.
    pub fn prediction_end(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.prediction_horizon)
            .ok()
            .and_then(|horizon| start.checked_add_signed(horizon))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            tx_interval: default_tx_interval(),
            immediate: default_immediate(),
            startup_lead: default_startup_lead(),
            startup_attempts: default_startup_attempts(),
            retry_delay: default_retry_delay(),
            prediction_horizon: default_prediction_horizon(),
        }
    }
}

/// Pass search parameters. Latitude/longitude are the beacon position used
/// until the first fix.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PredictionSettings {
    pub latitude: f64,
    pub longitude: f64,
    pub min_elevation_deg: f64,
    pub max_elevation_deg: f64,
    pub min_duration_min: f64,
    pub max_passes: u32,
    pub time_margin_min: u32,
    pub step_seconds: u32,
}

impl Default for PredictionSettings {
    fn default() -> Self {
        Self {
            latitude: 43.5497,
            longitude: 1.485,
            min_elevation_deg: 5.0,
            max_elevation_deg: 90.0,
            min_duration_min: 5.0,
            max_passes: 2400,
            time_margin_min: 5,
            step_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum PositionConfig {
    Gnss {
        #[serde(default = "default_gnss_program")]
        program: PathBuf,
        #[serde(
            default = "default_poll_period",
            deserialize_with = "deserialize_duration"
        )]
        poll_period: Duration,
        #[serde(
            default = "default_fix_timeout",
            deserialize_with = "deserialize_duration"
        )]
        fix_timeout: Duration,
    },
    Static {
        latitude: f64,
        longitude: f64,
        #[serde(default)]
        altitude: f64,
    },
}

fn default_gnss_program() -> PathBuf {
    PathBuf::from("gnss")
}

fn default_poll_period() -> Duration {
    Duration::from_secs(1)
}

fn default_fix_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for PositionConfig {
    fn default() -> Self {
        PositionConfig::Gnss {
            program: default_gnss_program(),
            poll_period: default_poll_period(),
            fix_timeout: default_fix_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PredictorConfig {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.modem
            .tx
            .validate()
            .map_err(|e| invalid("modem.tx", e.to_string()))?;
        if self.modem.base_timeout.is_zero() {
            return Err(invalid("modem.base_timeout", "must be greater than zero"));
        }

        let p = &self.prediction;
        if !(-90.0..=90.0).contains(&p.latitude) {
            return Err(invalid("prediction.latitude", "must be in [-90, 90]"));
        }
        if !(0.0..=360.0).contains(&p.longitude) {
            return Err(invalid("prediction.longitude", "must be in [0, 360]"));
        }
        if p.min_elevation_deg >= p.max_elevation_deg {
            return Err(invalid(
                "prediction.min_elevation_deg",
                "must be below max_elevation_deg",
            ));
        }
        if p.step_seconds == 0 {
            return Err(invalid("prediction.step_seconds", "must be greater than zero"));
        }

        let s = &self.schedule;
        if s.tx_interval.is_zero() {
            return Err(invalid("schedule.tx_interval", "must be greater than zero"));
        }
        if s.startup_attempts == 0 {
            return Err(invalid("schedule.startup_attempts", "must be at least 1"));
        }
        if s.prediction_horizon.is_zero() {
            return Err(invalid(
                "schedule.prediction_horizon",
                "must be greater than zero",
            ));
        }
        if s.prediction_horizon > MAX_PREDICTION_HORIZON {
            return Err(invalid(
                "schedule.prediction_horizon",
                "must be at most 366 days",
            ));
        }

        if let PositionConfig::Static {
            latitude,
            longitude,
            ..
        } = self.position
        {
            if !(-90.0..=90.0).contains(&latitude) {
                return Err(invalid("position.latitude", "must be in [-90, 90]"));
            }
            if !(0.0..=360.0).contains(&longitude) {
                return Err(invalid("position.longitude", "must be in [0, 360]"));
            }
        }
        Ok(())
    }

    pub fn satellite_table(&self) -> Vec<OrbitElement> {
        if self.satellites.is_empty() {
            default_table()
        } else {
            self.satellites.clone()
        }
    }

    /// Prediction request for a search starting at `start`.
    pub fn prediction_config(&self, start: DateTime<Utc>) -> PredictionConfig {
        let p = &self.prediction;
        PredictionConfig {
            beacon_latitude: p.latitude,
            beacon_longitude: p.longitude,
            start,
            end: self.schedule.prediction_end(start),
            min_elevation_deg: p.min_elevation_deg,
            max_elevation_deg: p.max_elevation_deg,
            min_duration_min: p.min_duration_min,
            max_passes: p.max_passes,
            time_margin_min: p.time_margin_min,
            step_seconds: p.step_seconds,
        }
    }
}
