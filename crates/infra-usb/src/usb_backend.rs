// USB device backend
// reason: rusb for libusb bulk transfers to the BlackBox firmware

use async_trait::async_trait;
use rusb::{Context, DeviceHandle, LogLevel, UsbContext};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use blackbox_core::domain::{MeasureRow, SensorReport};
use blackbox_core::port::{DeviceBackend, TransportError};
use blackbox_core::protocol::{
    self, FramePacket, ENDPOINT_IN, ENDPOINT_OUT, MAX_PACKET_LEN, RX_TIMEOUT, TX_TIMEOUT,
    USB_INTERFACE, USB_PRODUCT_ID, USB_VENDOR_ID,
};

/// USB device selection and transfer timeouts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsbConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    pub interface: u8,
    pub rx_timeout_ms: u64,
    pub tx_timeout_ms: u64,
}

impl Default for UsbConfig {
    fn default() -> Self {
        Self {
            vendor_id: USB_VENDOR_ID,
            product_id: USB_PRODUCT_ID,
            interface: USB_INTERFACE,
            rx_timeout_ms: RX_TIMEOUT.as_millis() as u64,
            tx_timeout_ms: TX_TIMEOUT.as_millis() as u64,
        }
    }
}

type Handle = Arc<DeviceHandle<Context>>;

/// Backend talking to the real device over bulk transfers
///
/// Transfers are blocking libusb calls and run on Tokio's blocking pool,
/// so a read waiting for a sensor row never stalls a frame write.
pub struct UsbBackend {
    handle: Mutex<Option<Handle>>,
    config: UsbConfig,
    measure: Mutex<Option<MeasureRow>>,
}

impl UsbBackend {
    /// Open the device and claim its interface
    ///
    /// # Errors
    /// - TransportError::Init if libusb cannot be initialized
    /// - TransportError::DeviceNotFound if no device matches VID/PID
    /// - TransportError::InterfaceNotAvailable if the claim fails
    pub fn open(config: UsbConfig) -> Result<Self, TransportError> {
        let mut context = Context::new().map_err(|e| TransportError::Init(e.to_string()))?;
        context.set_log_level(LogLevel::Warning);

        let mut handle = context
            .open_device_with_vid_pid(config.vendor_id, config.product_id)
            .ok_or(TransportError::DeviceNotFound)?;

        handle
            .claim_interface(config.interface)
            .map_err(|e| TransportError::InterfaceNotAvailable(e.to_string()))?;

        info!(
            vendor_id = format_args!("{:04x}", config.vendor_id),
            product_id = format_args!("{:04x}", config.product_id),
            interface = config.interface,
            "BlackBox USB device opened"
        );

        Ok(Self {
            handle: Mutex::new(Some(Arc::new(handle))),
            config,
            measure: Mutex::new(None),
        })
    }

    /// Row most recently armed by the session
    ///
    /// The firmware scans all rows on its own, so this is bookkeeping only.
    pub fn armed_row(&self) -> Option<MeasureRow> {
        *self.measure.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self) -> Result<Handle, TransportError> {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(TransportError::Disconnected)
    }

    fn rx_timeout(&self) -> Duration {
        Duration::from_millis(self.config.rx_timeout_ms)
    }

    fn tx_timeout(&self) -> Duration {
        Duration::from_millis(self.config.tx_timeout_ms)
    }
}

/// Map a failed bulk write
pub(crate) fn map_write_error(e: rusb::Error) -> TransportError {
    match e {
        rusb::Error::NoDevice => TransportError::Disconnected,
        other => TransportError::Tx(other.to_string()),
    }
}

/// Map a failed bulk read
pub(crate) fn map_read_error(e: rusb::Error) -> TransportError {
    match e {
        rusb::Error::Timeout => TransportError::NoAnswer,
        rusb::Error::NoDevice => TransportError::Disconnected,
        other => TransportError::Bus(other.to_string()),
    }
}

fn write_packets(
    handle: &DeviceHandle<Context>,
    packets: &[FramePacket],
    timeout: Duration,
) -> Result<(), TransportError> {
    for packet in packets {
        let bytes = packet.to_bytes();
        let written = handle
            .write_bulk(ENDPOINT_OUT, &bytes, timeout)
            .map_err(map_write_error)?;
        if written != bytes.len() {
            return Err(TransportError::Tx(format!(
                "short write at LED {}: {}/{} bytes",
                packet.offset,
                written,
                bytes.len()
            )));
        }
    }
    Ok(())
}

fn read_report(
    handle: &DeviceHandle<Context>,
    timeout: Duration,
) -> Result<SensorReport, TransportError> {
    let mut buf = [0u8; MAX_PACKET_LEN];
    let len = handle
        .read_bulk(ENDPOINT_IN, &mut buf, timeout)
        .map_err(map_read_error)?;
    protocol::decode_sensor_report(&buf[..len])
        .map_err(|e| TransportError::BrokenAnswer(e.to_string()))
}

#[async_trait]
impl DeviceBackend for UsbBackend {
    fn name(&self) -> &'static str {
        "usb"
    }

    async fn start(&self) -> Result<(), TransportError> {
        let handle = self.handle()?;
        let descriptor = handle
            .device()
            .device_descriptor()
            .map_err(|e| TransportError::Bus(e.to_string()))?;

        debug!(
            device_version = ?descriptor.device_version(),
            "Receive path ready"
        );
        Ok(())
    }

    fn arm_measurement(&self, row: MeasureRow) {
        trace!(row = ?row, "Measure row armed");
        *self.measure.lock().unwrap_or_else(PoisonError::into_inner) = Some(row);
    }

    async fn send_frame(&self, packets: Vec<FramePacket>) -> Result<(), TransportError> {
        let handle = self.handle()?;
        let timeout = self.tx_timeout();

        tokio::task::spawn_blocking(move || write_packets(&handle, &packets, timeout))
            .await
            .map_err(|e| TransportError::Poll(e.to_string()))?
    }

    async fn next_report(&self) -> Result<SensorReport, TransportError> {
        let handle = self.handle()?;
        let timeout = self.rx_timeout();

        tokio::task::spawn_blocking(move || read_report(&handle, timeout))
            .await
            .map_err(|e| TransportError::Poll(e.to_string()))?
    }

    async fn close(&self) {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(handle) = handle else {
            warn!("USB backend closed twice");
            return;
        };

        match Arc::try_unwrap(handle) {
            Ok(mut handle) => {
                if let Err(e) = handle.release_interface(self.config.interface) {
                    warn!(error = %e, "Releasing USB interface failed");
                }
                info!("BlackBox USB device closed");
            }
            // A blocking read is still parked in libusb; the handle
            // releases the interface when that read returns
            Err(_) => debug!("USB handle still in use, deferring release"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_device() {
        let config = UsbConfig::default();
        assert_eq!(config.vendor_id, 0x0483);
        assert_eq!(config.product_id, 0xffff);
        assert_eq!(config.interface, 0);
        assert_eq!(config.rx_timeout_ms, 1000);
        assert_eq!(config.tx_timeout_ms, 20);
    }

    #[test]
    fn test_read_error_mapping() {
        assert_eq!(map_read_error(rusb::Error::Timeout), TransportError::NoAnswer);
        assert_eq!(
            map_read_error(rusb::Error::NoDevice),
            TransportError::Disconnected
        );
        assert!(matches!(
            map_read_error(rusb::Error::Pipe),
            TransportError::Bus(_)
        ));
    }

    #[test]
    fn test_write_error_mapping() {
        assert!(matches!(
            map_write_error(rusb::Error::Timeout),
            TransportError::Tx(_)
        ));
        assert_eq!(
            map_write_error(rusb::Error::NoDevice),
            TransportError::Disconnected
        );
    }

    #[test]
    fn test_open_missing_device_fails() {
        // No device answers to this VID/PID; without USB access libusb
        // init fails instead. Either way no backend comes back.
        let config = UsbConfig {
            vendor_id: 0xdead,
            product_id: 0xbeef,
            ..UsbConfig::default()
        };
        let result = UsbBackend::open(config);
        assert!(matches!(
            result,
            Err(TransportError::DeviceNotFound) | Err(TransportError::Init(_))
        ));
    }
}
