// BlackBox Infrastructure - Emulator Adapter
// Implements: DeviceBackend without hardware

pub mod emulator;
pub mod panel;

pub use emulator::{EmulatorBackend, EmulatorConfig, DEFAULT_MS_PER_FRAME, FRAME_PERIOD_ENV};
pub use panel::Panel;
