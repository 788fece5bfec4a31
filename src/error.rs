//! Error types for roomlock

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RoomlockError {
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Audio server error: {0}")]
    AudioServer(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, RoomlockError>;
