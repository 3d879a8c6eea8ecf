use thiserror::Error;

use crate::predict::{PassWindow, PredictError};

/// Conditions that stop the automatic transmission cadence.
#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("missed pass, {0}")]
    MissedWindow(PassWindow),
    #[error("pass prediction failed: {0}")]
    PredictionFailed(#[from] PredictError),
}
