use std::time::Duration;

use strum_macros::Display;

use super::clock::{Clock, SystemClock};
use super::error::SchedulingError;
use crate::config::{Config, ScheduleConfig};
use crate::frame::ArgosFrame;
use crate::modem::{Kim1, ModemError, TxConfig, TxOutcome};
use crate::position::{GeoFix, PositionSource};
use crate::predict::{
    DownlinkStatus, OrbitElement, PassPredictor, PassWindow, PredictionConfig, UplinkStatus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SchedulerState {
    Idle,
    InWindow,
    AwaitingNext,
    MissedWindow,
}

/// What the runner does right after startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupPlan {
    pub first_wake: Duration,
    /// Hex frame to send before arming, if the fix could be encoded.
    pub frame: Option<String>,
}

/// Owns every collaborator of a transmission cycle and decides when the
/// next one runs.
pub struct Scheduler {
    modem: Kim1,
    serial_path: String,
    tx_config: TxConfig,
    position: Box<dyn PositionSource>,
    predictor: Box<dyn PassPredictor>,
    clock: Box<dyn Clock>,
    satellites: Vec<OrbitElement>,
    prediction: PredictionConfig,
    settings: ScheduleConfig,
    state: SchedulerState,
    pass: Option<PassWindow>,
    last_fix: GeoFix,
}

impl Scheduler {
    pub fn new(
        modem: Kim1,
        position: Box<dyn PositionSource>,
        predictor: Box<dyn PassPredictor>,
        config: &Config,
    ) -> Self {
        Self::with_clock(modem, position, predictor, config, Box::new(SystemClock))
    }

    pub fn with_clock(
        modem: Kim1,
        position: Box<dyn PositionSource>,
        predictor: Box<dyn PassPredictor>,
        config: &Config,
        clock: Box<dyn Clock>,
    ) -> Self {
        let now = clock.now();
        let last_fix = GeoFix::new(
            config.prediction.latitude,
            config.prediction.longitude,
            0.0,
            now,
        );
        Self {
            modem,
            serial_path: config.modem.port.clone(),
            tx_config: config.modem.tx,
            position,
            predictor,
            clock,
            satellites: config.satellite_table(),
            prediction: config.prediction_config(now),
            settings: config.schedule.clone(),
            state: SchedulerState::Idle,
            pass: None,
            last_fix,
        }
    }

    pub fn settings(&self) -> &ScheduleConfig {
        &self.settings
    }

    /// Open the modem, apply the radio settings and close it again.
    pub fn configure_modem(&mut self) -> Result<(), ModemError> {
        self.modem.open(&self.serial_path)?;
        let configured = self.modem.configure(&self.tx_config);
        let closed = self.modem.close();
        configured?;
        closed
    }

    fn enter(&mut self, state: SchedulerState) {
        if self.state != state {
            log::debug!("Scheduler {} -> {}", self.state, state);
        }
        self.state = state;
    }

    fn acquire_fix(&mut self) -> GeoFix {
        let fix = match self.position.fix() {
            Ok(fix) => {
                log::info!(
                    "Fix lat {:.5} lon {:.5} alt {:.0} m",
                    fix.latitude,
                    fix.longitude,
                    fix.altitude
                );
                fix
            }
            Err(e) => {
                log::warn!("No position fix ({}), using last known position", e);
                let mut fix = self.last_fix;
                fix.set_time(self.clock.now());
                fix
            }
        };
        self.last_fix = fix;
        fix
    }

    fn update_prediction(&mut self, fix: &GeoFix) {
        let start = fix.timestamp().unwrap_or_else(|| self.clock.now());
        self.prediction = PredictionConfig {
            beacon_latitude: fix.latitude,
            beacon_longitude: fix.longitude,
            start,
            end: self.settings.prediction_end(start),
            ..self.prediction.clone()
        };
    }

    fn encode(fix: &GeoFix) -> Option<String> {
        match ArgosFrame::from_fix(fix) {
            Ok(frame) => Some(frame.to_hex()),
            Err(e) => {
                log::warn!("Cannot encode fix, skipping transmission: {}", e);
                None
            }
        }
    }

    /// One open/transmit/close sequence. Returns whether the module took the
    /// frame; failures are logged.
    pub fn transmit(&mut self, hex: &str) -> bool {
        if let Err(e) = self.modem.open(&self.serial_path) {
            log::error!("Cannot open modem, skipping transmission: {}", e);
            return false;
        }
        let outcome = self.modem.transmit(hex);
        if let Err(e) = self.modem.close() {
            log::warn!("Modem close failed: {}", e);
        }

        let now = self.clock.now();
        match &outcome {
            Ok(TxOutcome::Accepted) => log::info!("Frame {} transmitted at {}", hex, now),
            Ok(TxOutcome::Unconfirmed(answer)) => log::warn!(
                "Frame {} sent at {} without confirmation: {:?}",
                hex,
                now,
                answer
            ),
            Ok(TxOutcome::Rejected(code)) => {
                log::error!("Frame {} rejected at {} (code {})", hex, now, code)
            }
            Err(e) => log::error!("Frame {} transmission failed at {}: {}", hex, now, e),
        }
        outcome.is_ok_and(|o| o.is_success())
    }

    fn predict(&mut self) -> Result<PassWindow, SchedulingError> {
        let pass = self.predictor.next_pass(
            &self.prediction,
            &self.satellites,
            DownlinkStatus::Off,
            UplinkStatus::OnWithA2,
        )?;
        log::info!("Next pass: {}", pass);
        self.pass = Some(pass.clone());
        Ok(pass)
    }

    /// Delay until `pass.epoch - lead`, or `fallback` when that moment is
    /// already behind us and the pass is still open.
    fn plan(
        &mut self,
        pass: &PassWindow,
        lead: chrono::Duration,
        fallback: Duration,
    ) -> Result<Duration, SchedulingError> {
        let now = self.clock.now();
        let until = pass.epoch - now - lead;

        if until > chrono::Duration::zero() {
            self.enter(SchedulerState::AwaitingNext);
            return Ok(until.to_std().unwrap_or(fallback));
        }
        if pass.has_ended(now) {
            self.enter(SchedulerState::MissedWindow);
            log::error!("Pass already over, transmission cadence stopped");
            return Err(SchedulingError::MissedWindow(pass.clone()));
        }

        let state = if pass.contains(now) {
            SchedulerState::InWindow
        } else {
            SchedulerState::AwaitingNext
        };
        self.enter(state);
        Ok(fallback)
    }

    /// Fix, predict and plan the first wake. The frame from the startup fix
    /// is returned for the caller to send with retries.
    pub fn startup(&mut self) -> Result<StartupPlan, SchedulingError> {
        let fix = self.acquire_fix();
        self.update_prediction(&fix);
        let pass = self.predict()?;

        let lead = chrono::Duration::from_std(self.settings.startup_lead)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let first_wake = self.plan(&pass, lead, self.settings.immediate)?;
        log::info!("First wake in {}", humantime::format_duration(first_wake));

        Ok(StartupPlan {
            first_wake,
            frame: Self::encode(&fix),
        })
    }

    /// One timer expiry: transmit the current position, then decide the
    /// delay until the next cycle.
    pub fn run_cycle(&mut self) -> Result<Duration, SchedulingError> {
        let fix = self.acquire_fix();
        self.update_prediction(&fix);
        if let Some(hex) = Self::encode(&fix) {
            self.transmit(&hex);
        }

        // A tracked pass keeps the cadence until it ends, even before it opens.
        let now = self.clock.now();
        if let Some(pass) = self.pass.as_ref().filter(|p| !p.has_ended(now)) {
            let state = if pass.contains(now) {
                SchedulerState::InWindow
            } else {
                SchedulerState::AwaitingNext
            };
            self.enter(state);
            return Ok(self.settings.tx_interval);
        }

        let pass = self.predict()?;
        let wake = self.plan(&pass, chrono::Duration::zero(), self.settings.tx_interval)?;
        log::info!("Next wake in {}", humantime::format_duration(wake));
        Ok(wake)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use crate::modem::{MockPort, PortEvent, ScriptedSerial};
    use crate::position::PositionError;
    use crate::scheduler::testing::{
        config, modem, pass, t0, ManualClock, ScriptedPosition, ScriptedPredictor,
    };

    const PAYLOAD_HEX: &str = "E564401D015183240F";

    struct Harness {
        scheduler: Scheduler,
        port: MockPort,
        serial: ScriptedSerial,
        position: ScriptedPosition,
        predictor: ScriptedPredictor,
        clock: ManualClock,
    }

    fn harness() -> Harness {
        let (kim, port, serial) = modem();
        let position = ScriptedPosition::default();
        let predictor = ScriptedPredictor::default();
        let clock = ManualClock::new(t0());
        let scheduler = Scheduler::with_clock(
            kim,
            Box::new(position.clone()),
            Box::new(predictor.clone()),
            &config(),
            Box::new(clock.clone()),
        );
        Harness {
            scheduler,
            port,
            serial,
            position,
            predictor,
            clock,
        }
    }

    fn toulouse() -> GeoFix {
        GeoFix::new(43.5497, 1.485, 150.0, t0())
    }

    #[test]
    fn open_pass_keeps_interval() {
        let mut h = harness();
        h.position.push(Ok(toulouse()));
        h.serial.reply("+TX_INFO:0\n");
        h.scheduler.pass = Some(pass(t0() - chrono::Duration::seconds(10), 300));

        let wake = h.scheduler.run_cycle().unwrap();
        assert_eq!(wake, Duration::from_secs(90));
        assert_eq!(h.scheduler.state, SchedulerState::InWindow);
        assert!(h.predictor.requests().is_empty());

        let written = h.serial.written();
        assert_eq!(written.len(), 1);
        assert!(written[0].starts_with("AT+TX="));
        assert!(written[0].ends_with(&format!("{PAYLOAD_HEX}\n")));
    }

    #[test]
    fn pass_not_yet_open_keeps_interval() {
        let mut h = harness();
        h.position.push(Ok(toulouse()));
        h.serial.reply("+TX_INFO:0\n");
        h.scheduler.pass = Some(pass(t0() + chrono::Duration::seconds(600), 300));

        let wake = h.scheduler.run_cycle().unwrap();
        assert_eq!(wake, Duration::from_secs(90));
        assert_eq!(h.scheduler.state, SchedulerState::AwaitingNext);
        assert!(h.predictor.requests().is_empty());
        assert_eq!(h.serial.written().len(), 1);
    }

    #[test]
    fn huge_horizon_saturates_prediction_end() {
        let mut cfg = config();
        cfg.schedule.prediction_horizon = Duration::from_secs(300_000 * 365 * 86_400);
        let (kim, _port, _serial) = modem();
        let position = ScriptedPosition::default();
        let predictor = ScriptedPredictor::default();
        let mut scheduler = Scheduler::with_clock(
            kim,
            Box::new(position.clone()),
            Box::new(predictor.clone()),
            &cfg,
            Box::new(ManualClock::new(t0())),
        );
        position.push(Ok(toulouse()));
        predictor.push(pass(t0() + chrono::Duration::seconds(600), 600));

        assert_eq!(scheduler.run_cycle().unwrap(), Duration::from_secs(600));
        let requests = predictor.requests();
        assert_eq!(requests[0].0.end, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn ended_pass_waits_for_next() {
        let mut h = harness();
        h.position.push(Ok(toulouse()));
        h.scheduler.pass = Some(pass(t0() - chrono::Duration::seconds(400), 300));
        h.predictor.push(pass(t0() + chrono::Duration::seconds(3600), 600));

        let wake = h.scheduler.run_cycle().unwrap();
        assert_eq!(wake, Duration::from_secs(3600));
        assert_eq!(h.scheduler.state, SchedulerState::AwaitingNext);
        assert_eq!(
            h.scheduler.pass.as_ref().unwrap().epoch,
            t0() + chrono::Duration::seconds(3600)
        );

        let requests = h.predictor.requests();
        assert_eq!(requests.len(), 1);
        let (request, downlink, uplink) = &requests[0];
        assert_eq!(*downlink, DownlinkStatus::Off);
        assert_eq!(*uplink, UplinkStatus::OnWithA2);
        assert_eq!(request.start, t0());
        assert_eq!(request.end, t0() + chrono::Duration::hours(24));
        assert_eq!(request.beacon_latitude, 43.5497);
    }

    #[test]
    fn predicted_pass_already_over() {
        let mut h = harness();
        h.position.push(Ok(toulouse()));
        h.predictor.push(pass(t0() - chrono::Duration::seconds(400), 300));

        let err = h.scheduler.run_cycle().unwrap_err();
        assert!(matches!(err, SchedulingError::MissedWindow(_)));
        assert_eq!(h.scheduler.state, SchedulerState::MissedWindow);
    }

    #[test]
    fn predicted_pass_already_open() {
        let mut h = harness();
        h.position.push(Ok(toulouse()));
        h.predictor.push(pass(t0() - chrono::Duration::seconds(30), 600));

        assert_eq!(h.scheduler.run_cycle().unwrap(), Duration::from_secs(90));
        assert_eq!(h.scheduler.state, SchedulerState::InWindow);
    }

    #[test]
    fn prediction_failure_stops() {
        let mut h = harness();
        h.position.push(Ok(toulouse()));

        let err = h.scheduler.run_cycle().unwrap_err();
        assert!(matches!(err, SchedulingError::PredictionFailed(_)));
    }

    #[test]
    fn transmission_failure_does_not_block_planning() {
        let mut h = harness();
        h.position.push(Ok(toulouse()));
        h.serial.state.lock().unwrap().open_error = Some(std::io::ErrorKind::NotFound);
        h.predictor.push(pass(t0() + chrono::Duration::seconds(600), 600));

        assert_eq!(h.scheduler.run_cycle().unwrap(), Duration::from_secs(600));
        assert!(h.serial.written().is_empty());
    }

    #[test]
    fn rejected_frame_is_not_success() {
        let mut h = harness();
        h.serial.reply("+TX_INFO:1\n").reply("OK\n\n");
        assert!(!h.scheduler.transmit(PAYLOAD_HEX));
        assert!(h.scheduler.transmit(PAYLOAD_HEX));
    }

    #[test]
    fn missing_fix_falls_back_to_last_known() {
        let mut h = harness();
        h.position
            .push(Ok(GeoFix::new(10.0, 20.0, 0.0, t0())))
            .push(Err(PositionError::NoFix(Duration::from_secs(60))));
        h.predictor
            .push(pass(t0() + chrono::Duration::seconds(100), 600))
            .push(pass(t0() + chrono::Duration::seconds(9000), 600));

        h.scheduler.run_cycle().unwrap();
        h.clock.advance(200);
        h.scheduler.run_cycle().unwrap();

        let requests = h.predictor.requests();
        assert_eq!(requests.len(), 1);
        let later = t0() + chrono::Duration::seconds(200);
        let (request, _, _) = &requests[0];
        assert_eq!(request.beacon_latitude, 10.0);
        assert_eq!(h.scheduler.prediction.beacon_latitude, 10.0);
        assert_eq!(h.scheduler.prediction.beacon_longitude, 20.0);
        assert_eq!(h.scheduler.prediction.start, later);
        assert_eq!(h.scheduler.last_fix.timestamp(), Some(later));
    }

    #[test]
    fn startup_applies_lead() {
        let mut h = harness();
        h.position.push(Ok(toulouse()));
        h.predictor
            .push(pass(t0() + chrono::Duration::seconds(7200 + 100), 600));

        let plan = h.scheduler.startup().unwrap();
        assert_eq!(plan.first_wake, Duration::from_secs(100));
        assert!(plan.frame.unwrap().ends_with(PAYLOAD_HEX));
        assert_eq!(h.scheduler.state, SchedulerState::AwaitingNext);
    }

    #[test]
    fn startup_inside_lead_wakes_immediately() {
        let mut h = harness();
        h.position.push(Ok(toulouse()));
        h.predictor.push(pass(t0() - chrono::Duration::seconds(60), 600));

        let plan = h.scheduler.startup().unwrap();
        assert_eq!(plan.first_wake, Duration::from_secs(1));
        assert_eq!(h.scheduler.state, SchedulerState::InWindow);
    }

    #[test]
    fn startup_after_pass_is_missed() {
        let mut h = harness();
        h.position.push(Ok(toulouse()));
        h.predictor.push(pass(t0() - chrono::Duration::seconds(900), 600));

        assert!(matches!(
            h.scheduler.startup(),
            Err(SchedulingError::MissedWindow(_))
        ));
    }

    #[test]
    fn configure_modem_round_trip() {
        let mut h = harness();
        h.serial.reply("OK\n\n").reply("OK\n\n").reply("OK\n\n");

        h.scheduler.configure_modem().unwrap();
        assert_eq!(
            h.serial.written(),
            vec!["AT+PWR=1000\n", "AT+BAND=B1\n", "AT+FRQ=0\n"]
        );
        let events = h.port.events();
        assert_eq!(
            events[events.len() - 2..].to_vec(),
            vec![PortEvent::Power(false), PortEvent::Reset(true)]
        );
    }

    #[test]
    fn configure_modem_closes_on_error() {
        let mut h = harness();
        h.serial.reply("ERROR\n");

        assert!(matches!(
            h.scheduler.configure_modem(),
            Err(ModemError::Protocol { .. })
        ));
        assert_eq!(h.port.events().last(), Some(&PortEvent::Reset(true)));
        assert_eq!(h.serial.state.lock().unwrap().dropped, 1);
    }
}
