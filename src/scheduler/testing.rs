use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use super::clock::Clock;
use crate::config::Config;
use crate::modem::{Kim1, MockPort, ScriptedSerial};
use crate::position::{GeoFix, PositionError, PositionSource};
use crate::predict::{
    DownlinkStatus, OrbitElement, PassPredictor, PassWindow, PredictError, PredictionConfig,
    UplinkStatus,
};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 5, 12, 34, 0).unwrap()
}

pub fn config() -> Config {
    Config::from_str("predictor:\n  program: prepas\n").unwrap()
}

pub fn pass(epoch: DateTime<Utc>, duration_seconds: i64) -> PassWindow {
    PassWindow {
        satellite_id: 0x9,
        epoch,
        duration_seconds,
        max_elevation_deg: 42.0,
    }
}

pub fn modem() -> (Kim1, MockPort, ScriptedSerial) {
    let port = MockPort::default();
    let serial = ScriptedSerial::default();
    let kim = Kim1::new(Box::new(port.clone()), Box::new(serial.clone()));
    (kim, port, serial)
}

#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(at)),
        }
    }

    pub fn advance(&self, seconds: i64) {
        *self.now.lock().unwrap() += chrono::Duration::seconds(seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Wall clock that follows tokio's (possibly paused) time.
pub struct TokioClock {
    origin: DateTime<Utc>,
    start: tokio::time::Instant,
}

impl TokioClock {
    pub fn new(origin: DateTime<Utc>) -> Self {
        Self {
            origin,
            start: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.start.elapsed()).unwrap();
        self.origin + elapsed
    }
}

/// Hands out queued fixes, then reports no fix.
#[derive(Clone, Default)]
pub struct ScriptedPosition {
    fixes: Arc<Mutex<VecDeque<Result<GeoFix, PositionError>>>>,
}

impl ScriptedPosition {
    pub fn push(&self, fix: Result<GeoFix, PositionError>) -> &Self {
        self.fixes.lock().unwrap().push_back(fix);
        self
    }
}

impl PositionSource for ScriptedPosition {
    fn fix(&mut self) -> Result<GeoFix, PositionError> {
        self.fixes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(PositionError::NoFix(Duration::from_secs(60))))
    }
}

/// Hands out queued passes and records every request.
#[derive(Clone, Default)]
pub struct ScriptedPredictor {
    passes: Arc<Mutex<VecDeque<PassWindow>>>,
    pub requests: Arc<Mutex<Vec<(PredictionConfig, DownlinkStatus, UplinkStatus)>>>,
}

impl ScriptedPredictor {
    pub fn push(&self, pass: PassWindow) -> &Self {
        self.passes.lock().unwrap().push_back(pass);
        self
    }

    pub fn requests(&self) -> Vec<(PredictionConfig, DownlinkStatus, UplinkStatus)> {
        self.requests.lock().unwrap().clone()
    }
}

impl PassPredictor for ScriptedPredictor {
    fn next_pass(
        &mut self,
        config: &PredictionConfig,
        _satellites: &[OrbitElement],
        downlink: DownlinkStatus,
        uplink: UplinkStatus,
    ) -> Result<PassWindow, PredictError> {
        self.requests
            .lock()
            .unwrap()
            .push((config.clone(), downlink, uplink));
        self.passes
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(PredictError::NoPass {
                start: config.start,
                end: config.end,
            })
    }
}
