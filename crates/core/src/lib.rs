// BlackBox Core - Domain Logic, Wire Protocol & Ports
// NO infrastructure dependencies: libusb and the emulator live in their own crates

pub mod application;
pub mod domain;
pub mod error;
pub mod port;
pub mod protocol;

pub use application::{Session, TransmitStatus};
pub use domain::{Color, MeasureRow, SensorGrid};
pub use error::{BlackBoxError, Result};
pub use port::{DeviceBackend, TransportError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
