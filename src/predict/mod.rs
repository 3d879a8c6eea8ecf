mod aop;
mod command;
mod error;
mod types;

pub use aop::{default_table, satellite_name};
pub use command::CommandPredictor;
pub use error::PredictError;
pub use types::{DownlinkStatus, OrbitElement, PassWindow, PredictionConfig, UplinkStatus};

/// Boundary to the orbit computation. Implementations must not keep state
/// that the scheduler can observe.
pub trait PassPredictor {
    fn next_pass(
        &mut self,
        config: &PredictionConfig,
        satellites: &[OrbitElement],
        downlink: DownlinkStatus,
        uplink: UplinkStatus,
    ) -> Result<PassWindow, PredictError>;
}

impl<T: PassPredictor + ?Sized> PassPredictor for Box<T> {
    fn next_pass(
        &mut self,
        config: &PredictionConfig,
        satellites: &[OrbitElement],
        downlink: DownlinkStatus,
        uplink: UplinkStatus,
    ) -> Result<PassWindow, PredictError> {
        (**self).next_pass(config, satellites, downlink, uplink)
    }
}
