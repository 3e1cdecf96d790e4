use binder_transport::BinderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("no live binder connection")]
    NotConnected,
    #[error("session is already connected")]
    AlreadyConnected,
    #[error("binder connection closed; reload the page to reconnect")]
    ConnectionAborted,
    #[error("no configuration selected")]
    NoConfigSelected,
    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),
    #[error("binder connection failed: {0}")]
    Binder(#[from] BinderError),
}

pub type ConsoleResult<T> = Result<T, ConsoleError>;
