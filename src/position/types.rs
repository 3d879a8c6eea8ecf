use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use serde::Serialize;

/// One position/time acquisition. Longitude is east, in [0, 360).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl GeoFix {
    pub fn new(latitude: f64, longitude: f64, altitude: f64, at: DateTime<Utc>) -> Self {
        let mut fix = Self {
            latitude,
            longitude,
            altitude,
            year: 0,
            month: 0,
            day: 0,
            hour: 0,
            minute: 0,
            second: 0,
        };
        fix.set_time(at);
        fix
    }

    pub fn set_time(&mut self, at: DateTime<Utc>) {
        self.year = at.year();
        self.month = at.month() as u8;
        self.day = at.day() as u8;
        self.hour = at.hour() as u8;
        self.minute = at.minute() as u8;
        self.second = at.second() as u8;
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        NaiveDate::from_ymd_opt(self.year, self.month as u32, self.day as u32)?
            .and_hms_opt(self.hour as u32, self.minute as u32, self.second as u32)
            .map(|dt| dt.and_utc())
    }
}
