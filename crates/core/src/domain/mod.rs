// Domain Layer - LED geometry, colors, framebuffer and sensor readings

pub mod color;
pub mod error;
pub mod framebuffer;
pub mod geometry;
pub mod sensor;

// Re-exports
pub use color::Color;
pub use error::DomainError;
pub use framebuffer::{FrameBuffer, FRAME_BYTES};
pub use geometry::{led_position, Grid10, Grid40, LedIndex, LedMap, LED_COUNT};
pub use sensor::{
    EdgeSide, MeasureRow, SensorGrid, SensorReport, SENSORS_PER_ROW, SENSOR_COUNT, SENSOR_ROWS,
};
