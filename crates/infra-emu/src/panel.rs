// Emulated LED panel
// Double-buffered like the firmware: packets land in a back buffer, a
// commit makes it pending, the next tick puts it on display.

use blackbox_core::domain::{Color, FrameBuffer, LedIndex, FRAME_BYTES};
use blackbox_core::protocol::FramePacket;

#[derive(Debug, Clone)]
pub struct Panel {
    back: FrameBuffer,
    pending: Option<[u8; FRAME_BYTES]>,
    displayed: [u8; FRAME_BYTES],
    frames_shown: u64,
}

impl Panel {
    pub fn new() -> Self {
        Self {
            back: FrameBuffer::new(),
            pending: None,
            displayed: [0; FRAME_BYTES],
            frames_shown: 0,
        }
    }

    /// Store one decoded packet; returns true if it committed a frame
    pub fn receive(&mut self, packet: &FramePacket) -> bool {
        self.back.write_bytes(packet.byte_offset(), &packet.payload);
        if packet.commit {
            self.pending = Some(self.back.take_snapshot());
        }
        packet.commit
    }

    /// Show the pending frame, if any
    pub fn tick(&mut self) -> bool {
        match self.pending.take() {
            Some(frame) => {
                self.displayed = frame;
                self.frames_shown += 1;
                true
            }
            None => false,
        }
    }

    pub fn displayed(&self) -> &[u8; FRAME_BYTES] {
        &self.displayed
    }

    pub fn displayed_color(&self, led: LedIndex) -> Color {
        let offset = led.get() * 3;
        Color::from_grb([
            self.displayed[offset],
            self.displayed[offset + 1],
            self.displayed[offset + 2],
        ])
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }
}

impl Default for Panel {
    fn default() -> Self {
        Self::new()
    }
}
