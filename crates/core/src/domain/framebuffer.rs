// Host-side framebuffer

use super::color::Color;
use super::geometry::{LedIndex, LED_COUNT};

/// Bytes per LED on the wire
pub const BYTES_PER_LED: usize = 3;

/// Size of one full frame in bytes
pub const FRAME_BYTES: usize = LED_COUNT * BYTES_PER_LED;

/// LED colors in wire (GRB) order, plus a dirty flag
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    data: [u8; FRAME_BYTES],
    dirty: bool,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            data: [0; FRAME_BYTES],
            dirty: false,
        }
    }

    pub fn set(&mut self, led: LedIndex, color: Color) {
        let offset = led.get() * BYTES_PER_LED;
        self.data[offset..offset + BYTES_PER_LED].copy_from_slice(&color.to_grb());
        self.dirty = true;
    }

    pub fn get(&self, led: LedIndex) -> Color {
        let offset = led.get() * BYTES_PER_LED;
        Color::from_grb([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ])
    }

    pub fn fill(&mut self, color: Color) {
        for chunk in self.data.chunks_exact_mut(BYTES_PER_LED) {
            chunk.copy_from_slice(&color.to_grb());
        }
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Copy out the frame and clear the dirty flag
    pub fn take_snapshot(&mut self) -> [u8; FRAME_BYTES] {
        self.dirty = false;
        self.data
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_BYTES] {
        &self.data
    }

    /// Raw wire bytes for one LED range, used when decoding packets
    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        let end = (offset + bytes.len()).min(FRAME_BYTES);
        if offset < end {
            self.data[offset..end].copy_from_slice(&bytes[..end - offset]);
            self.dirty = true;
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
