use thiserror::Error;

#[derive(Debug, Error)]
pub enum PositionError {
    #[error("gnss tool error: {0}")]
    Tool(#[from] std::io::Error),
    #[error("gnss tool exited with {status}: {command}")]
    ToolFailed { command: String, status: String },
    #[error("no position fix after {0:?}")]
    NoFix(std::time::Duration),
    #[error("unexpected {what} output: {line:?}")]
    Parse { what: &'static str, line: String },
}
