use organtrack_engine::EngineError;
use organtrack_protocol::ProtocolError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Frame worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("Worker pool closed")]
    PoolClosed,
}

pub type Result<T> = std::result::Result<T, RelayError>;
