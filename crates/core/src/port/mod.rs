// Port Layer - Interfaces for external dependencies

pub mod device_backend;

// Re-exports
pub use device_backend::{DeviceBackend, TransportError};
