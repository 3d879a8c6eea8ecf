use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModemError {
    #[error("{operation} failed: {source}")]
    Io {
        operation: &'static str,
        source: std::io::Error,
    },
    #[error("no response to {command}")]
    Timeout { command: String },
    #[error("expected {expected:?}, received {received:?}")]
    Protocol { expected: String, received: String },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("payload of {0} hex digits cannot be padded to a 32-bit boundary")]
    InvalidPayloadLength(usize),
    #[error("a modem session is already open")]
    SessionBusy,
    #[error("no modem session is open")]
    NotOpen,
}

pub(crate) fn io(operation: &'static str) -> impl FnOnce(std::io::Error) -> ModemError {
    move |source| ModemError::Io { operation, source }
}
