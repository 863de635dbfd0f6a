// Application Layer - Session service over a DeviceBackend

pub mod constants;
mod receive_loop;
pub mod session;

// Re-exports
pub use session::{Session, TransmitStatus};
