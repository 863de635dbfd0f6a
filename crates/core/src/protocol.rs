// Wire protocol between host and BlackBox firmware
//
// OUT (bulk, EP 0x02): [offset hi | flags, offset lo] + up to 20 LEDs in GRB.
// IN  (bulk, EP 0x81): [row] + 8 x u16 little-endian readings.

use crate::domain::error::{DomainError, Result};
use crate::domain::framebuffer::{BYTES_PER_LED, FRAME_BYTES};
use crate::domain::geometry::LED_COUNT;
use crate::domain::sensor::{SensorReport, SENSORS_PER_ROW, SENSOR_ROWS};
use std::time::Duration;

// =============================================================================
// USB identity
// =============================================================================

pub const USB_VENDOR_ID: u16 = 0x0483;
pub const USB_PRODUCT_ID: u16 = 0xffff;
pub const USB_INTERFACE: u8 = 0;
pub const ENDPOINT_OUT: u8 = 0x02;
pub const ENDPOINT_IN: u8 = 0x81;

/// Receive timeout for sensor reports
pub const RX_TIMEOUT: Duration = Duration::from_millis(1000);

/// Transmit timeout per frame packet
pub const TX_TIMEOUT: Duration = Duration::from_millis(20);

// =============================================================================
// Frame packets
// =============================================================================

pub const HEADER_LEN: usize = 2;
pub const LEDS_PER_PACKET: usize = 20;
pub const MAX_PACKET_LEN: usize = HEADER_LEN + LEDS_PER_PACKET * BYTES_PER_LED;

/// Header flag: device swaps its double buffer after this packet
pub const COMMIT_FLAG: u16 = 0x8000;

/// Header bits carrying the first LED offset
pub const OFFSET_MASK: u16 = 0x01FF;

/// Number of packets in one full frame
pub const PACKETS_PER_FRAME: usize = LED_COUNT.div_ceil(LEDS_PER_PACKET);

/// One bulk OUT transfer carrying a slice of the framebuffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePacket {
    /// First LED written by this packet
    pub offset: u16,
    pub commit: bool,
    /// GRB bytes, three per LED
    pub payload: Vec<u8>,
}

impl FramePacket {
    pub fn header(&self) -> u16 {
        let flags = if self.commit { COMMIT_FLAG } else { 0 };
        flags | (self.offset & OFFSET_MASK)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.payload.len());
        bytes.extend_from_slice(&self.header().to_be_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Parse a packet the way the firmware does
    ///
    /// # Errors
    /// Returns `DomainError::BrokenPacket` on a missing header or a payload
    /// reaching past the last LED
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(DomainError::BrokenPacket(format!(
                "packet too short: {} bytes",
                bytes.len()
            )));
        }
        let header = u16::from_be_bytes([bytes[0], bytes[1]]);
        let offset = header & OFFSET_MASK;
        let payload = bytes[HEADER_LEN..].to_vec();

        if offset as usize * BYTES_PER_LED + payload.len() > FRAME_BYTES {
            return Err(DomainError::BrokenPacket(format!(
                "{} payload bytes at LED {} overrun the frame",
                payload.len(),
                offset
            )));
        }

        Ok(Self {
            offset,
            commit: header & COMMIT_FLAG != 0,
            payload,
        })
    }

    /// Byte offset of the payload inside a frame
    pub fn byte_offset(&self) -> usize {
        self.offset as usize * BYTES_PER_LED
    }
}

/// Split a full frame into packets; only the last one commits
pub fn encode_frame(frame: &[u8; FRAME_BYTES]) -> Vec<FramePacket> {
    let chunk_len = LEDS_PER_PACKET * BYTES_PER_LED;
    let count = frame.chunks(chunk_len).len();

    frame
        .chunks(chunk_len)
        .enumerate()
        .map(|(i, chunk)| FramePacket {
            offset: (i * LEDS_PER_PACKET) as u16,
            commit: i + 1 == count,
            payload: chunk.to_vec(),
        })
        .collect()
}

// =============================================================================
// Sensor reports
// =============================================================================

pub const REPORT_LEN: usize = 1 + SENSORS_PER_ROW * 2;

/// Parse one sensor report
///
/// # Errors
/// Returns `DomainError::BrokenReport` on a wrong length or unknown row
pub fn decode_sensor_report(bytes: &[u8]) -> Result<SensorReport> {
    if bytes.len() != REPORT_LEN {
        return Err(DomainError::BrokenReport(format!(
            "expected {} bytes, got {}",
            REPORT_LEN,
            bytes.len()
        )));
    }
    let row = bytes[0];
    if row as usize >= SENSOR_ROWS {
        return Err(DomainError::BrokenReport(format!("row {} out of range", row)));
    }

    let mut values = [0u16; SENSORS_PER_ROW];
    for (value, raw) in values.iter_mut().zip(bytes[1..].chunks_exact(2)) {
        *value = u16::from_le_bytes([raw[0], raw[1]]);
    }

    Ok(SensorReport { row, values })
}

pub fn encode_sensor_report(report: &SensorReport) -> [u8; REPORT_LEN] {
    let mut bytes = [0u8; REPORT_LEN];
    bytes[0] = report.row;
    for (raw, value) in bytes[1..].chunks_exact_mut(2).zip(report.values.iter()) {
        raw.copy_from_slice(&value.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_frame_packet_layout() {
        let mut frame = [0u8; FRAME_BYTES];
        frame[FRAME_BYTES - 1] = 0xAB;

        let packets = encode_frame(&frame);
        assert_eq!(packets.len(), PACKETS_PER_FRAME);
        assert_eq!(packets.len(), 16);

        for (i, packet) in packets.iter().enumerate() {
            assert_eq!(packet.offset as usize, i * LEDS_PER_PACKET);
            assert_eq!(packet.to_bytes().len(), MAX_PACKET_LEN);
            assert_eq!(packet.commit, i == packets.len() - 1);
        }

        let last = packets.last().unwrap().to_bytes();
        assert_eq!(&last[..2], &[0x81, 0x2C]); // commit | 300
        assert_eq!(last[MAX_PACKET_LEN - 1], 0xAB);
    }

    #[test]
    fn test_header_big_endian() {
        let packet = FramePacket {
            offset: 260,
            commit: false,
            payload: vec![],
        };
        assert_eq!(packet.to_bytes(), vec![0x01, 0x04]);
    }

    #[test]
    fn test_decode_packet() {
        let bytes = [0x80, 0x14, 1, 2, 3];
        let packet = FramePacket::decode(&bytes).unwrap();
        assert_eq!(packet.offset, 20);
        assert!(packet.commit);
        assert_eq!(packet.payload, vec![1, 2, 3]);
        assert_eq!(packet.byte_offset(), 60);
    }

    #[test]
    fn test_decode_packet_rejects_garbage() {
        assert!(FramePacket::decode(&[0x00]).is_err());

        // 2 LEDs starting at LED 319 overrun the frame
        let mut bytes = vec![0x01, 0x3F];
        bytes.extend_from_slice(&[0; 6]);
        assert!(FramePacket::decode(&bytes).is_err());
    }

    #[test]
    fn test_decode_sensor_report() {
        let mut bytes = [0u8; REPORT_LEN];
        bytes[0] = 7;
        bytes[1] = 0x34;
        bytes[2] = 0x12;
        bytes[15] = 0xFF;
        bytes[16] = 0x00;

        let report = decode_sensor_report(&bytes).unwrap();
        assert_eq!(report.row, 7);
        assert_eq!(report.values[0], 0x1234);
        assert_eq!(report.values[7], 0x00FF);
        assert_eq!(encode_sensor_report(&report), bytes);
    }

    #[test]
    fn test_decode_sensor_report_rejects_bad_row() {
        let mut bytes = [0u8; REPORT_LEN];
        bytes[0] = 12;
        assert!(decode_sensor_report(&bytes).is_err());
        assert!(decode_sensor_report(&bytes[..10]).is_err());
    }
}
