mod driver;
mod error;
mod gpio;
pub mod response;
mod serial;

pub use driver::{pad_payload, Kim1, TxConfig, TxOutcome};
pub use error::ModemError;
pub use gpio::SysfsGpio;
pub use serial::SystemSerial;

#[cfg(test)]
pub use gpio::mock::{MockPort, PortEvent};
#[cfg(test)]
pub use serial::mock::ScriptedSerial;
