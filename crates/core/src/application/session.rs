// Session - one open connection to a BlackBox backend

use super::constants::CLOSE_TIMEOUT;
use super::receive_loop;
use crate::domain::{
    led_position, Color, FrameBuffer, Grid10, Grid40, LedIndex, LedMap, MeasureRow, SensorGrid,
};
use crate::error::{BlackBoxError, Result};
use crate::port::{DeviceBackend, TransportError};
use crate::protocol::encode_frame;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outcome of a transmit request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitStatus {
    /// Frame handed to the backend
    Started,
    /// Nothing changed since the last frame; only the measure row was armed
    Unchanged,
    /// A previous frame is still being sent; nothing new was queued
    AlreadyInFlight,
}

impl TransmitStatus {
    /// Integer form: 0 = started, 1 = already in flight
    pub fn code(self) -> i32 {
        match self {
            TransmitStatus::Started | TransmitStatus::Unchanged => 0,
            TransmitStatus::AlreadyInFlight => 1,
        }
    }
}

/// State shared with the background tasks
#[derive(Default)]
pub(crate) struct SharedState {
    pub(crate) framebuffer: Mutex<FrameBuffer>,
    pub(crate) sensors: Mutex<SensorGrid>,
    pub(crate) in_flight: AtomicBool,
    pub(crate) transmit_error: Mutex<Option<TransportError>>,
}

/// Lock a mutex, ignoring poisoning (the guarded data stays consistent)
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An open BlackBox session
///
/// Owns the backend for its whole lifetime. LED setters only touch the
/// host framebuffer; `transmit` pushes it to the device in the background.
/// Release the device with [`Session::close`]; dropping an open session
/// stops the receive loop and releases the backend on the runtime.
///
/// # Example
/// ```text
/// let session = Session::open(backend).await?;
/// session.set_led40(10, 5, Color::new(255, 0, 0))?;
/// session.transmit(-1)?;
/// let row = session.wait_measure().await?;
/// session.close().await;
/// ```
pub struct Session {
    backend: Arc<dyn DeviceBackend>,
    led_map: LedMap,
    shared: Arc<SharedState>,
    rows: watch::Receiver<Option<u8>>,
    stop: watch::Sender<bool>,
    receiver: Option<JoinHandle<()>>,
    transmitter: Mutex<Option<JoinHandle<()>>>,
    runtime: Handle,
    released: bool,
}

impl Session {
    /// Start the backend and the receive loop
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// Returns the backend's start failure. The backend is not closed; it
    /// may still serve another session.
    pub async fn open(backend: Arc<dyn DeviceBackend>) -> Result<Self> {
        info!(backend = backend.name(), "Opening session");

        if let Err(e) = backend.start().await {
            warn!(backend = backend.name(), error = %e, "Backend failed to start");
            return Err(e.into());
        }

        let shared = Arc::new(SharedState::default());
        let (rows_tx, rows) = watch::channel(None);
        let (stop, stop_rx) = watch::channel(false);
        let runtime = Handle::current();

        let receiver = runtime.spawn(receive_loop::run(
            Arc::clone(&backend),
            Arc::clone(&shared),
            rows_tx,
            stop_rx,
        ));

        Ok(Self {
            backend,
            led_map: LedMap::new(),
            shared,
            rows,
            stop,
            receiver: Some(receiver),
            transmitter: Mutex::new(None),
            runtime,
            released: false,
        })
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Position of an LED in the 40x40 system
    pub fn led_position(&self, index: i32) -> Result<Grid40> {
        Ok(led_position(LedIndex::new(index)?))
    }

    /// Set one LED by its number
    pub fn set_led(&self, index: i32, color: Color) -> Result<()> {
        let led = LedIndex::new(index)?;
        lock(&self.shared.framebuffer).set(led, color);
        Ok(())
    }

    /// Set every LED inside a 10x10 cell; cells without LEDs are a no-op
    pub fn set_led10(&self, x: i32, y: i32, color: Color) -> Result<()> {
        let cell = Grid10::new(x, y)?;
        let mut framebuffer = lock(&self.shared.framebuffer);
        for &led in self.led_map.leds_in(cell) {
            framebuffer.set(led, color);
        }
        Ok(())
    }

    /// Set the LED at a 40x40 position; positions without an LED are a no-op
    pub fn set_led40(&self, x: i32, y: i32, color: Color) -> Result<()> {
        let pos = Grid40::new(x, y)?;
        if let Some(led) = self.led_map.led_at(pos) {
            lock(&self.shared.framebuffer).set(led, color);
        }
        Ok(())
    }

    /// Set all LEDs at once
    pub fn fill(&self, color: Color) {
        lock(&self.shared.framebuffer).fill(color);
    }

    /// Push pending LED changes and arm the sensor row to capture
    ///
    /// Returns immediately; the frame is sent by a background task.
    ///
    /// # Errors
    /// - `InvalidArgument` unless -1 <= measure_row < 12
    /// - `Transport` if the previous background transmit failed (its frame
    ///   is marked dirty again and goes out with the next transmit)
    pub fn transmit(&self, measure_row: i32) -> Result<TransmitStatus> {
        let measure = MeasureRow::new(measure_row)?;

        if let Some(e) = lock(&self.shared.transmit_error).take() {
            return Err(e.into());
        }

        self.backend.arm_measurement(measure);

        let snapshot = {
            let mut framebuffer = lock(&self.shared.framebuffer);
            if !framebuffer.is_dirty() {
                return Ok(TransmitStatus::Unchanged);
            }
            if self.shared.in_flight.swap(true, Ordering::AcqRel) {
                return Ok(TransmitStatus::AlreadyInFlight);
            }
            framebuffer.take_snapshot()
        };

        let packets = encode_frame(&snapshot);
        let backend = Arc::clone(&self.backend);
        let shared = Arc::clone(&self.shared);

        let handle = self.runtime.spawn(async move {
            if let Err(e) = backend.send_frame(packets).await {
                warn!(backend = backend.name(), error = %e, "Frame transmit failed");
                lock(&shared.framebuffer).mark_dirty();
                *lock(&shared.transmit_error) = Some(e);
            }
            shared.in_flight.store(false, Ordering::Release);
        });
        *lock(&self.transmitter) = Some(handle);

        debug!(measure = ?measure, "Frame transmit started");
        Ok(TransmitStatus::Started)
    }

    /// Whether a frame is currently being sent
    pub fn is_transmitting(&self) -> bool {
        self.shared.in_flight.load(Ordering::Acquire)
    }

    /// Wait until the last started transmit has finished
    ///
    /// # Errors
    /// Returns the transmit's failure, if any
    pub async fn flush(&self) -> Result<()> {
        let handle = lock(&self.transmitter).take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| TransportError::Poll(e.to_string()))?;
        }

        match lock(&self.shared.transmit_error).take() {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Wait for the next sensor row and return its number
    ///
    /// # Errors
    /// Returns `Closed` once the receive loop has ended
    pub async fn wait_measure(&self) -> Result<u8> {
        let mut rows = self.rows.clone();
        rows.borrow_and_update();
        rows.changed().await.map_err(|_| BlackBoxError::Closed)?;
        let row = *rows.borrow_and_update();
        row.ok_or(BlackBoxError::Closed)
    }

    /// Copy of the current sensor readings
    pub fn sensor_data(&self) -> SensorGrid {
        lock(&self.shared.sensors).clone()
    }

    /// One reading of the 8x8 sensor field, 1-based
    pub fn sensor_field(&self, x: i32, y: i32) -> Result<u16> {
        Ok(lock(&self.shared.sensors).field(x, y)?)
    }

    /// Whether the receive loop is still running
    pub fn is_receiving(&self) -> bool {
        self.rows.has_changed().is_ok()
    }

    /// Stop background work and release the backend
    pub async fn close(mut self) {
        if let Err(e) = self.flush().await {
            warn!(error = %e, "Last transmit failed before close");
        }

        self.stop.send_replace(true);
        if let Some(mut receiver) = self.receiver.take() {
            if tokio::time::timeout(CLOSE_TIMEOUT, &mut receiver).await.is_err() {
                warn!("Receive loop did not stop in time, aborting");
                receiver.abort();
            }
        }

        self.backend.close().await;
        self.released = true;
        info!(backend = self.backend.name(), "Session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        warn!(backend = self.backend.name(), "Session dropped without close");
        self.stop.send_replace(true);
        if let Some(receiver) = self.receiver.take() {
            receiver.abort();
        }

        let backend = Arc::clone(&self.backend);
        self.runtime.spawn(async move {
            backend.close().await;
        });
        self.released = true;
    }
}
