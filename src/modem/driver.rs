use std::time::Duration;

use serde::Deserialize;
use strum_macros::Display;

use super::error::{io, ModemError};
use super::gpio::HardwarePort;
use super::response::{self, Response, TX_INFO};
use super::serial::{read_response, SerialLink, SerialOpener};

pub const BASE_TIMEOUT: Duration = Duration::from_millis(50);

/// Bits of the frame header the module already accounts for.
const TX_HEADER_BITS: usize = 24;
const VALID_POWERS_MW: [u16; 5] = [250, 500, 750, 1000, 1500];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ModemState {
    Unpowered,
    ResetAsserted,
    PoweredOn,
    LinkReady,
    CommandInFlight,
    Closed,
}

/// Radio settings applied with `AT+PWR`, `AT+BAND` and `AT+FRQ`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TxConfig {
    pub power_mw: u16,
    pub band: u8,
    pub frequency_offset_khz: u32,
}

impl Default for TxConfig {
    fn default() -> Self {
        Self {
            power_mw: 1000,
            band: 1,
            frequency_offset_khz: 0,
        }
    }
}

impl TxConfig {
    pub fn validate(&self) -> Result<(), ModemError> {
        if !VALID_POWERS_MW.contains(&self.power_mw) {
            return Err(ModemError::InvalidArgument(format!(
                "power {} mW not one of {:?}",
                self.power_mw, VALID_POWERS_MW
            )));
        }
        if !(1..=9).contains(&self.band) {
            return Err(ModemError::InvalidArgument(format!(
                "band B{} not in B1..B9",
                self.band
            )));
        }
        let max_offset = if matches!(self.band, 4 | 5) { 800 } else { 700 };
        if self.frequency_offset_khz > max_offset {
            return Err(ModemError::InvalidArgument(format!(
                "frequency offset {} kHz exceeds {} kHz for band B{}",
                self.frequency_offset_khz, max_offset, self.band
            )));
        }
        Ok(())
    }
}

/// Result reported by the module for `AT+TX`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    Accepted,
    Rejected(u8),
    /// The answer carried no `+TX_INFO:` marker.
    Unconfirmed(String),
}

impl TxOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, TxOutcome::Rejected(_))
    }
}

struct ModemSession {
    path: String,
    link: Box<dyn SerialLink>,
}

/// KIM1 radio module: power sequencing plus the AT command set.
pub struct Kim1 {
    port: Box<dyn HardwarePort>,
    opener: Box<dyn SerialOpener>,
    base_timeout: Duration,
    state: ModemState,
    session: Option<ModemSession>,
}

impl Kim1 {
    pub fn new(port: Box<dyn HardwarePort>, opener: Box<dyn SerialOpener>) -> Self {
        Self {
            port,
            opener,
            base_timeout: BASE_TIMEOUT,
            state: ModemState::Unpowered,
            session: None,
        }
    }

    pub fn with_base_timeout(mut self, base_timeout: Duration) -> Self {
        self.base_timeout = base_timeout;
        self
    }

    #[cfg(test)]
    pub fn state(&self) -> ModemState {
        self.state
    }

    #[cfg(test)]
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    fn enter(&mut self, state: ModemState) {
        log::debug!("KIM1 {} -> {}", self.state, state);
        self.state = state;
    }

    /// Power the module up and open the serial line to it.
    pub fn open(&mut self, path: &str) -> Result<(), ModemError> {
        if self.session.is_some() {
            return Err(ModemError::SessionBusy);
        }

        self.port.set_reset(true).map_err(io("assert reset"))?;
        self.enter(ModemState::ResetAsserted);

        let mut link = self.opener.open(path).map_err(io("open serial"))?;
        link.discard_input().map_err(io("flush serial"))?;
        let stale = read_response(&mut *link, self.base_timeout, self.base_timeout)
            .map_err(io("flush serial"))?;
        if !stale.is_empty() {
            log::debug!("Discarded {} stale bytes", stale.len());
        }

        if let Err(e) = self.port.set_power(true) {
            self.power_down();
            return Err(io("power on")(e));
        }
        self.enter(ModemState::PoweredOn);

        if let Err(e) = self.port.set_reset(false) {
            self.power_down();
            return Err(io("release reset")(e));
        }

        match read_response(&mut *link, self.base_timeout * 2, self.base_timeout) {
            Ok(banner) if !banner.is_empty() => {
                log::debug!("KIM1 startup: {:?}", String::from_utf8_lossy(&banner))
            }
            Ok(_) => log::debug!("KIM1 sent no startup message"),
            Err(e) => {
                self.power_down();
                return Err(io("read startup message")(e));
            }
        }

        self.session = Some(ModemSession {
            path: path.to_string(),
            link,
        });
        self.enter(ModemState::LinkReady);
        log::info!("KIM1 ready on {}", path);
        Ok(())
    }

    fn power_down(&mut self) {
        let power = self.port.set_power(false);
        let reset = self.port.set_reset(true);
        if let Err(e) = power.and(reset) {
            log::warn!("Failed to power KIM1 down ({}), releasing lines", e);
            if let Err(e) = self.port.release() {
                log::warn!("Failed to release KIM1 lines: {}", e);
            }
        }
        self.enter(ModemState::Unpowered);
    }

    /// Power off, hold in reset and drop the serial line. Every step runs;
    /// the first failure is returned.
    pub fn close(&mut self) -> Result<(), ModemError> {
        let session = self.session.take().ok_or(ModemError::NotOpen)?;
        let mut first_err = None;

        if let Err(e) = self.port.set_power(false) {
            log::error!("KIM1 power off failed: {}", e);
            first_err.get_or_insert(io("power off")(e));
        }
        if let Err(e) = self.port.set_reset(true) {
            log::error!("KIM1 reset failed: {}", e);
            first_err.get_or_insert(io("assert reset")(e));
        }
        drop(session.link);
        self.enter(ModemState::Closed);
        log::info!("KIM1 on {} closed", session.path);

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn exchange(&mut self, command: &str, first_timeout: Duration) -> Result<Vec<u8>, ModemError> {
        if self.session.is_none() {
            return Err(ModemError::NotOpen);
        }
        self.enter(ModemState::CommandInFlight);
        let inter_timeout = self.base_timeout;
        let session = self.session.as_mut().ok_or(ModemError::NotOpen)?;

        log::debug!("KIM1 <- {}", command.trim_end());
        let result = session
            .link
            .write_all(command.as_bytes())
            .map_err(io("serial write"))
            .and_then(|_| {
                read_response(&mut *session.link, first_timeout, inter_timeout)
                    .map_err(io("serial read"))
            });
        self.state = ModemState::LinkReady;

        let rx = result?;
        log::debug!("KIM1 -> {:?}", String::from_utf8_lossy(&rx));
        Ok(rx)
    }

    fn expect_ok(&mut self, command: &str) -> Result<(), ModemError> {
        let rx = self.exchange(command, self.base_timeout * 8)?;
        match response::parse(&rx) {
            Response::Ok => Ok(()),
            Response::Empty => Err(ModemError::Timeout {
                command: command.trim_end().to_string(),
            }),
            _ => Err(ModemError::Protocol {
                expected: String::from_utf8_lossy(response::OK).into_owned(),
                received: String::from_utf8_lossy(&rx).into_owned(),
            }),
        }
    }

    fn query(&mut self, command: &str, multiplier: u32) -> Result<String, ModemError> {
        let rx = self.exchange(command, self.base_timeout * multiplier)?;
        if rx.is_empty() {
            return Err(ModemError::Timeout {
                command: command.trim_end().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&rx).trim().to_string())
    }

    /// Apply power, band and frequency offset, stopping at the first command
    /// the module does not acknowledge. Earlier settings stay applied.
    pub fn configure(&mut self, config: &TxConfig) -> Result<(), ModemError> {
        config.validate()?;
        self.expect_ok(&format!("AT+PWR={}\n", config.power_mw))?;
        log::info!("KIM1 power set to {} mW", config.power_mw);
        self.expect_ok(&format!("AT+BAND=B{}\n", config.band))?;
        log::info!("KIM1 band set to B{}", config.band);
        self.expect_ok(&format!("AT+FRQ={}\n", config.frequency_offset_khz))?;
        log::info!(
            "KIM1 frequency offset set to {} kHz",
            config.frequency_offset_khz
        );
        Ok(())
    }

    /// Send one hex-encoded frame and report what the module said about it.
    pub fn transmit(&mut self, hex_payload: &str) -> Result<TxOutcome, ModemError> {
        let padded = pad_payload(hex_payload)?;
        let command = format!("AT+TX={}\n", padded);
        let rx = self.exchange(&command, self.base_timeout * 400)?;

        match response::parse(&rx) {
            Response::Empty => Err(ModemError::Timeout {
                command: "AT+TX".to_string(),
            }),
            Response::TxInfo(0) => Ok(TxOutcome::Accepted),
            Response::TxInfo(code) => Ok(TxOutcome::Rejected(code)),
            _ => {
                let text = String::from_utf8_lossy(&rx).into_owned();
                if text.contains(TX_INFO) {
                    return Err(ModemError::Protocol {
                        expected: format!("{}<digit>", TX_INFO),
                        received: text,
                    });
                }
                Ok(TxOutcome::Unconfirmed(text))
            }
        }
    }

    pub fn firmware_version(&mut self) -> Result<String, ModemError> {
        self.query("AT+FW=?\n", 2)
    }

    pub fn serial_number(&mut self) -> Result<String, ModemError> {
        self.query("AT+SN=?\n", 2)
    }

    pub fn argos_id(&mut self) -> Result<String, ModemError> {
        self.query("AT+ID=?\n", 2)
    }

    pub fn power(&mut self) -> Result<String, ModemError> {
        self.query("AT+PWR=?\n", 2)
    }

    pub fn band(&mut self) -> Result<String, ModemError> {
        self.query("AT+BAND=?\n", 2)
    }

    pub fn frequency(&mut self) -> Result<String, ModemError> {
        self.query("AT+FRQ=?\n", 4)
    }

    /// Program the beacon identifier (5 or 7 hex digits) and return the
    /// module's answer.
    pub fn set_argos_id(&mut self, id: &str) -> Result<String, ModemError> {
        let valid = matches!(id.len(), 5 | 7) && id.chars().all(|c| c.is_ascii_hexdigit());
        if !valid {
            return Err(ModemError::InvalidArgument(format!(
                "argos id {:?} must be 5 or 7 hex digits",
                id
            )));
        }
        self.query(&format!("AT+ID={}\n", id), 2)
    }
}

/// Pad with '0' so the payload after the header ends on a 32-bit boundary.
pub fn pad_payload(hex: &str) -> Result<String, ModemError> {
    let bits = (hex.len() * 4)
        .checked_sub(TX_HEADER_BITS)
        .ok_or(ModemError::InvalidPayloadLength(hex.len()))?;
    let padding = match bits % 32 {
        0 => "",
        24 => "0",
        16 => "00",
        8 => "000",
        _ => return Err(ModemError::InvalidPayloadLength(hex.len())),
    };
    Ok(format!("{}{}", hex, padding))
}
