use thiserror::Error;

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("failed to run predictor {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("predictor IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("predictor exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },
    #[error("invalid predictor output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no pass found between {start} and {end}")]
    NoPass {
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    },
    #[error("orbit table is empty")]
    EmptyTable,
}
