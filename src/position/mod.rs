mod error;
mod gnss;
mod types;

pub use error::PositionError;
pub use gnss::GnssTool;
pub use types::GeoFix;

use chrono::Utc;

pub trait PositionSource {
    /// Block until a fix is available or the source gives up.
    fn fix(&mut self) -> Result<GeoFix, PositionError>;
}

/// Fixed coordinates stamped with the system clock.
pub struct StaticPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl PositionSource for StaticPosition {
    fn fix(&mut self) -> Result<GeoFix, PositionError> {
        Ok(GeoFix::new(
            self.latitude,
            self.longitude,
            self.altitude,
            Utc::now(),
        ))
    }
}

impl<T: PositionSource + ?Sized> PositionSource for Box<T> {
    fn fix(&mut self) -> Result<GeoFix, PositionError> {
        (**self).fix()
    }
}
