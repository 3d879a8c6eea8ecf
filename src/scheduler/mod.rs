mod clock;
mod error;
mod runner;
mod state;
#[cfg(test)]
mod testing;
mod timer;

pub use runner::{Runner, WakeHandle};
pub use state::Scheduler;
