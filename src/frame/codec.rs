use strum_macros::Display;
use thiserror::Error;

use super::crc::crc16;
use super::hex::to_hex;
use crate::position::GeoFix;

pub const PAYLOAD_LEN: usize = 9;
pub const FRAME_LEN: usize = PAYLOAD_LEN + 2;

const ACQUISITION_PERIOD: u8 = 7;
const MAX_ALTITUDE_M: f64 = 10_230.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum FrameField {
    Day,
    Hour,
    Minute,
    Longitude,
    Latitude,
    Altitude,
}

#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("{field} out of range")]
    Validation { field: FrameField },
}

/// Pack a timestamped position into the 9-byte ARGOS GPS payload.
///
/// Fields are checked in wire order and the first one out of range is
/// reported. NaN never passes a range check.
pub fn encode_payload(
    day: u8,
    hour: u8,
    minute: u8,
    longitude: f64,
    latitude: f64,
    altitude: f64,
) -> Result<[u8; PAYLOAD_LEN], FrameError> {
    check(FrameField::Day, (1..=31).contains(&day))?;
    check(FrameField::Hour, hour <= 23)?;
    check(FrameField::Minute, minute <= 59)?;
    check(FrameField::Longitude, (0.0..=360.0).contains(&longitude))?;
    check(FrameField::Latitude, (-90.0..=90.0).contains(&latitude))?;
    check(FrameField::Altitude, (0.0..=MAX_ALTITUDE_M).contains(&altitude))?;

    let lon = longitude_code(longitude);
    let lat = latitude_code(latitude);
    let alt = altitude_code(altitude);

    Ok([
        (ACQUISITION_PERIOD << 5) | day,
        (hour << 3) | ((minute & 0x38) >> 3),
        ((minute & 0x07) << 5) | ((lon & 0x3E_0000) >> 17) as u8,
        ((lon & 0x1_FE00) >> 9) as u8,
        ((lon & 0x1FE) >> 1) as u8,
        (((lon & 0x1) as u8) << 7) | ((lat & 0x1F_C000) >> 14) as u8,
        ((lat & 0x3FC0) >> 6) as u8,
        (((lat & 0x3F) as u8) << 2) | ((alt & 0x300) >> 8) as u8,
        (alt & 0xFF) as u8,
    ])
}

fn check(field: FrameField, ok: bool) -> Result<(), FrameError> {
    if ok {
        Ok(())
    } else {
        Err(FrameError::Validation { field })
    }
}

/// 1/10000 degree east, rounded half-up.
fn longitude_code(longitude: f64) -> u32 {
    let scaled = longitude * 3_600_000.0 / 360.0;
    let whole = scaled.trunc();
    if scaled - whole > 0.5 {
        whole as u32 + 1
    } else {
        whole as u32
    }
}

/// 1/10000 degree offset by +90 degrees, truncated.
fn latitude_code(latitude: f64) -> u32 {
    (latitude * 10_000.0 + 900_000.0) as u32
}

fn altitude_code(altitude: f64) -> u16 {
    (altitude / 10.0) as u16
}

/// Checksum followed by payload, as handed to the modem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgosFrame {
    bytes: [u8; FRAME_LEN],
}

impl ArgosFrame {
    pub fn new(payload: [u8; PAYLOAD_LEN]) -> Self {
        let crc = crc16(&payload);
        let mut bytes = [0u8; FRAME_LEN];
        bytes[..2].copy_from_slice(&crc.to_be_bytes());
        bytes[2..].copy_from_slice(&payload);
        Self { bytes }
    }

    pub fn from_fix(fix: &GeoFix) -> Result<Self, FrameError> {
        encode_payload(
            fix.day,
            fix.hour,
            fix.minute,
            fix.longitude,
            fix.latitude,
            fix.altitude,
        )
        .map(Self::new)
    }

    #[cfg(test)]
    pub fn payload(&self) -> &[u8] {
        &self.bytes[2..]
    }

    pub fn checksum(&self) -> u16 {
        u16::from_be_bytes([self.bytes[0], self.bytes[1]])
    }

    #[cfg(test)]
    pub fn checksum_valid(&self) -> bool {
        crc16(self.payload()) == self.checksum()
    }

    pub fn to_hex(&self) -> String {
        to_hex(&self.bytes)
    }
}
