// Device Backend Port
// Abstraction over the real USB device and the emulator

use crate::domain::{MeasureRow, SensorReport};
use crate::protocol::FramePacket;
use async_trait::async_trait;
use thiserror::Error;

/// Backend failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("USB library initialization failed: {0}")]
    Init(String),

    #[error("Device not found")]
    DeviceNotFound,

    #[error("Interface not available: {0}")]
    InterfaceNotAvailable(String),

    #[error("Bus error: {0}")]
    Bus(String),

    #[error("No answer from device")]
    NoAnswer,

    #[error("Broken answer: {0}")]
    BrokenAnswer(String),

    #[error("Transmit failed: {0}")]
    Tx(String),

    #[error("Event loop failed: {0}")]
    Poll(String),

    #[error("Backend misuse: {0}")]
    Misuse(String),

    #[error("Device disconnected")]
    Disconnected,
}

impl TransportError {
    /// Receive loop retries these silently
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::NoAnswer)
    }

    /// Receive loop gives up on these
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransportError::Disconnected | TransportError::Misuse(_)
        )
    }
}

/// Device Backend trait
///
/// Implementations:
/// - UsbBackend: libusb bulk transfers to the real device
/// - EmulatorBackend: simulated firmware, no hardware needed
#[async_trait]
pub trait DeviceBackend: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Prepare the receive path; called once when a session opens
    ///
    /// # Errors
    /// Any TransportError makes the session open fail
    async fn start(&self) -> Result<(), TransportError>;

    /// Select the sensor row captured once the next frame is active
    fn arm_measurement(&self, row: MeasureRow);

    /// Send all packets of one frame in order
    async fn send_frame(&self, packets: Vec<FramePacket>) -> Result<(), TransportError>;

    /// Wait for the next sensor report
    ///
    /// # Errors
    /// - TransportError::NoAnswer on timeout (caller retries)
    /// - TransportError::Disconnected once the backend is gone
    async fn next_report(&self) -> Result<SensorReport, TransportError>;

    /// Release the device; called exactly once per session
    async fn close(&self);
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tokio::sync::{Notify, Semaphore};

    /// Recorded calls and scripted behavior
    #[derive(Debug, Default)]
    struct MockState {
        fail_start: Option<TransportError>,
        fail_send: Option<TransportError>,
        armed: Vec<MeasureRow>,
        frames: Vec<Vec<FramePacket>>,
        reports: VecDeque<Result<SensorReport, TransportError>>,
        close_count: usize,
    }

    /// Mock backend for session tests
    ///
    /// Reports are served from a queue; when it runs dry `next_report`
    /// parks until `push_report` adds more. With `hold_transmits` every
    /// `send_frame` waits for a `release_transmit` permit.
    #[derive(Clone)]
    pub struct MockBackend {
        state: Arc<Mutex<MockState>>,
        report_ready: Arc<Notify>,
        transmit_gate: Option<Arc<Semaphore>>,
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self {
                state: Arc::new(Mutex::new(MockState::default())),
                report_ready: Arc::new(Notify::new()),
                transmit_gate: None,
            }
        }

        pub fn new_failing_start(error: TransportError) -> Self {
            let mock = Self::new();
            mock.state.lock().unwrap().fail_start = Some(error);
            mock
        }

        pub fn hold_transmits(mut self) -> Self {
            self.transmit_gate = Some(Arc::new(Semaphore::new(0)));
            self
        }

        pub fn release_transmit(&self) {
            if let Some(gate) = &self.transmit_gate {
                gate.add_permits(1);
            }
        }

        pub fn fail_next_send(&self, error: TransportError) {
            self.state.lock().unwrap().fail_send = Some(error);
        }

        pub fn push_report(&self, report: Result<SensorReport, TransportError>) {
            self.state.lock().unwrap().reports.push_back(report);
            self.report_ready.notify_one();
        }

        pub fn armed(&self) -> Vec<MeasureRow> {
            self.state.lock().unwrap().armed.clone()
        }

        pub fn frames(&self) -> Vec<Vec<FramePacket>> {
            self.state.lock().unwrap().frames.clone()
        }

        pub fn close_count(&self) -> usize {
            self.state.lock().unwrap().close_count
        }
    }

    impl Default for MockBackend {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl DeviceBackend for MockBackend {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn start(&self) -> Result<(), TransportError> {
            match self.state.lock().unwrap().fail_start.clone() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }

        fn arm_measurement(&self, row: MeasureRow) {
            self.state.lock().unwrap().armed.push(row);
        }

        async fn send_frame(&self, packets: Vec<FramePacket>) -> Result<(), TransportError> {
            if let Some(gate) = &self.transmit_gate {
                gate.acquire()
                    .await
                    .map_err(|e| TransportError::Tx(e.to_string()))?
                    .forget();
            }

            let mut state = self.state.lock().unwrap();
            if let Some(e) = state.fail_send.take() {
                return Err(e);
            }
            state.frames.push(packets);
            Ok(())
        }

        async fn next_report(&self) -> Result<SensorReport, TransportError> {
            loop {
                let notified = self.report_ready.notified();
                if let Some(report) = self.state.lock().unwrap().reports.pop_front() {
                    return report;
                }
                notified.await;
            }
        }

        async fn close(&self) {
            self.state.lock().unwrap().close_count += 1;
        }
    }
}
