// Central Error Type for the Library

use crate::domain::DomainError;
use crate::port::TransportError;
use thiserror::Error;

/// Integer status codes of the device API (0 is success)
pub mod codes {
    pub const GENERIC_ERROR: i32 = -1;
    pub const MEMORY_ERROR: i32 = -2;
    pub const LIBUSB_INIT_ERROR: i32 = -3;
    pub const DEVICE_NOT_FOUND: i32 = -4;
    pub const INTERFACE_NOT_AVAILABLE: i32 = -5;
    pub const BUS_ERROR: i32 = -6;
    pub const NO_ANSWER: i32 = -7;
    pub const BROKEN_ANSWER: i32 = -8;
    pub const MISUSE_ERROR: i32 = -9;
    pub const TX_ERROR: i32 = -10;
    pub const POLL_ERROR: i32 = -11;
}

/// Library-level error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlackBoxError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] DomainError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Session closed")]
    Closed,
}

impl BlackBoxError {
    /// Negative status code for callers that speak the integer API
    pub fn code(&self) -> i32 {
        match self {
            BlackBoxError::InvalidArgument(_) => codes::MISUSE_ERROR,
            BlackBoxError::Closed => codes::GENERIC_ERROR,
            BlackBoxError::Transport(e) => match e {
                TransportError::Init(_) => codes::LIBUSB_INIT_ERROR,
                TransportError::DeviceNotFound => codes::DEVICE_NOT_FOUND,
                TransportError::InterfaceNotAvailable(_) => codes::INTERFACE_NOT_AVAILABLE,
                TransportError::Bus(_) | TransportError::Disconnected => codes::BUS_ERROR,
                TransportError::NoAnswer => codes::NO_ANSWER,
                TransportError::BrokenAnswer(_) => codes::BROKEN_ANSWER,
                TransportError::Tx(_) => codes::TX_ERROR,
                TransportError::Poll(_) => codes::POLL_ERROR,
                TransportError::Misuse(_) => codes::MISUSE_ERROR,
            },
        }
    }
}

/// Result type alias using BlackBoxError
pub type Result<T> = std::result::Result<T, BlackBoxError>;
