use std::fmt;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::aop::satellite_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownlinkStatus {
    Off,
    OnWithA3,
    OnWithA4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UplinkStatus {
    Off,
    OnWithA2,
    OnWithA3,
    OnWithA4NeoMode,
    OnWithA4VldaMode,
}

/// Adapted orbit parameters of one satellite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrbitElement {
    pub sat_hex_id: u8,
    pub sat_dcs_id: u8,
    pub downlink: DownlinkStatus,
    pub uplink: UplinkStatus,
    pub bulletin_epoch: NaiveDateTime,
    pub semi_major_axis_km: f64,
    pub inclination_deg: f64,
    pub ascending_node_longitude_deg: f64,
    pub ascending_node_drift_deg: f64,
    pub orbit_period_min: f64,
    pub semi_major_axis_drift_m_per_day: f64,
}

/// Search parameters handed to the pass predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionConfig {
    pub beacon_latitude: f64,
    /// East longitude, [0, 360].
    pub beacon_longitude: f64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub min_elevation_deg: f64,
    pub max_elevation_deg: f64,
    pub min_duration_min: f64,
    pub max_passes: u32,
    /// Linear time margin, minutes per six months.
    pub time_margin_min: u32,
    pub step_seconds: u32,
}

/// A satellite visibility window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassWindow {
    pub satellite_id: u8,
    pub epoch: DateTime<Utc>,
    pub duration_seconds: i64,
    pub max_elevation_deg: f64,
}

impl PassWindow {
    pub fn end(&self) -> DateTime<Utc> {
        self.epoch + Duration::seconds(self.duration_seconds)
    }

    /// Signed seconds since the window opened.
    pub fn elapsed(&self, now: DateTime<Utc>) -> i64 {
        (now - self.epoch).num_seconds()
    }

    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let elapsed = self.elapsed(now);
        elapsed >= 0 && elapsed < self.duration_seconds
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now >= self.end()
    }

    pub fn satellite_name(&self) -> &'static str {
        satellite_name(self.satellite_id)
    }
}

impl fmt::Display for PassWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sat {} begins {} duration {:.1} min max elevation {:.0} deg",
            self.satellite_name(),
            self.epoch.format("%Y/%m/%d %H:%M:%S"),
            self.duration_seconds as f64 / 60.0,
            self.max_elevation_deg
        )
    }
}
