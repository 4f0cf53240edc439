// polypong/server/src/core/error.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Room {0} is closed")]
    RoomClosed(String),

    #[error("Connected to wrong instance (expected {expected}, running {current})")]
    WrongInstance { expected: String, current: String },

    #[error("Simulation fault: {0}")]
    SimulationFault(#[from] SimulationError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Faults raised from inside a single simulation step. The room task treats any of
/// these as fatal for its tick loop.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("ball left the finite plane at ({x}, {y})")]
    NonFiniteBall { x: f32, y: f32 },

    #[error("invalid timestep {0}")]
    InvalidTimestep(f32),
}

pub type ServerResult<T> = Result<T, ServerError>;
