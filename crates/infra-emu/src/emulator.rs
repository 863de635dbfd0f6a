// Emulated BlackBox device
// reason: headless stand-in for the firmware so demos and tests run without hardware

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace};

use crate::panel::Panel;
use blackbox_core::domain::{
    Color, LedIndex, MeasureRow, SensorReport, FRAME_BYTES, SENSORS_PER_ROW, SENSOR_ROWS,
};
use blackbox_core::port::{DeviceBackend, TransportError};
use blackbox_core::protocol::FramePacket;

/// Environment variable holding the frame period in milliseconds
pub const FRAME_PERIOD_ENV: &str = "BBEMU";

/// Frame period when `BBEMU` is unset, zero or unparsable
pub const DEFAULT_MS_PER_FRAME: u64 = 12;

/// Reading of an uncovered sensor is BASE_LEVEL + rand(0..NOISE_SPAN)
const BASE_LEVEL: u16 = 100;
const NOISE_SPAN: u16 = 120;

/// Reports buffered for a slow host before new ones are dropped
const REPORT_QUEUE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    pub ms_per_frame: u64,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            ms_per_frame: DEFAULT_MS_PER_FRAME,
        }
    }
}

impl EmulatorConfig {
    /// Read the frame period from `BBEMU`
    pub fn from_env() -> Self {
        Self::parse(std::env::var(FRAME_PERIOD_ENV).ok().as_deref())
    }

    /// Parse a `BBEMU` value; decimal or `0x` hex
    pub fn parse(value: Option<&str>) -> Self {
        let ms = value
            .map(str::trim)
            .and_then(|v| match v.strip_prefix("0x").or_else(|| v.strip_prefix("0X")) {
                Some(hex) => u64::from_str_radix(hex, 16).ok(),
                None => v.parse().ok(),
            })
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_MS_PER_FRAME);
        Self { ms_per_frame: ms }
    }

    /// Tick period; zero falls back to the default like `BBEMU=0`
    pub fn frame_period(&self) -> Duration {
        match self.ms_per_frame {
            0 => Duration::from_millis(DEFAULT_MS_PER_FRAME),
            ms => Duration::from_millis(ms),
        }
    }
}

/// Simulated light sensors
#[derive(Debug)]
struct SensorBank {
    values: [[u16; SENSORS_PER_ROW]; SENSOR_ROWS],
    covered: [[bool; SENSORS_PER_ROW]; SENSOR_ROWS],
    row: u8,
    rng: StdRng,
}

impl SensorBank {
    fn new() -> Self {
        Self {
            values: [[0; SENSORS_PER_ROW]; SENSOR_ROWS],
            covered: [[false; SENSORS_PER_ROW]; SENSOR_ROWS],
            row: 0,
            rng: StdRng::from_entropy(),
        }
    }

    /// Sample the armed row; covered sensors keep their last reading
    fn measure(&mut self) -> SensorReport {
        let row = self.row as usize;
        for (value, covered) in self.values[row].iter_mut().zip(self.covered[row]) {
            if !covered {
                *value = BASE_LEVEL + self.rng.gen_range(0..NOISE_SPAN);
            }
        }
        SensorReport {
            row: self.row,
            values: self.values[row],
        }
    }
}

/// State shared between the backend and its tick task
#[derive(Debug)]
struct Device {
    panel: Panel,
    sensors: SensorBank,
}

impl Device {
    fn tick(&mut self) -> SensorReport {
        if self.panel.tick() {
            trace!(frames = self.panel.frames_shown(), "Frame displayed");
        }
        self.sensors.measure()
    }
}

/// Device backend that simulates the firmware in-process
///
/// One tick task per backend: each period it shows the pending frame and
/// reports the armed sensor row. Reports the host does not pick up in time
/// are dropped.
pub struct EmulatorBackend {
    config: EmulatorConfig,
    device: Arc<Mutex<Device>>,
    report_tx: Mutex<Option<mpsc::Sender<SensorReport>>>,
    report_rx: tokio::sync::Mutex<mpsc::Receiver<SensorReport>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn check_sensor(row: usize, index: usize) -> Result<(), TransportError> {
    if row >= SENSOR_ROWS || index >= SENSORS_PER_ROW {
        return Err(TransportError::Misuse(format!(
            "no sensor {} in row {}",
            index, row
        )));
    }
    Ok(())
}

impl EmulatorBackend {
    pub fn new(config: EmulatorConfig) -> Self {
        let (tx, rx) = mpsc::channel(REPORT_QUEUE);
        Self {
            config,
            device: Arc::new(Mutex::new(Device {
                panel: Panel::new(),
                sensors: SensorBank::new(),
            })),
            report_tx: Mutex::new(Some(tx)),
            report_rx: tokio::sync::Mutex::new(rx),
            ticker: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    /// Put something on a sensor: its reading freezes
    ///
    /// # Errors
    /// TransportError::Misuse for a sensor that does not exist
    pub fn cover_sensor(&self, row: usize, index: usize) -> Result<(), TransportError> {
        self.set_covered(row, index, true)
    }

    pub fn uncover_sensor(&self, row: usize, index: usize) -> Result<(), TransportError> {
        self.set_covered(row, index, false)
    }

    /// Cover a field sensor addressed like `SensorGrid::field`
    pub fn cover_field(&self, x: usize, y: usize) -> Result<(), TransportError> {
        if !(1..=SENSORS_PER_ROW).contains(&x) || !(1..=SENSORS_PER_ROW).contains(&y) {
            return Err(TransportError::Misuse(format!("no field ({}, {})", x, y)));
        }
        self.set_covered(x - 1, SENSORS_PER_ROW - y, true)
    }

    fn set_covered(&self, row: usize, index: usize, covered: bool) -> Result<(), TransportError> {
        check_sensor(row, index)?;
        lock(&self.device).sensors.covered[row][index] = covered;
        debug!(row, index, covered, "Sensor cover changed");
        Ok(())
    }

    /// Frame currently shown, GRB wire order
    pub fn displayed_frame(&self) -> [u8; FRAME_BYTES] {
        *lock(&self.device).panel.displayed()
    }

    pub fn displayed_color(&self, led: LedIndex) -> Color {
        lock(&self.device).panel.displayed_color(led)
    }

    pub fn frames_shown(&self) -> u64 {
        lock(&self.device).panel.frames_shown()
    }

    /// Row the next report will carry
    pub fn measured_row(&self) -> u8 {
        lock(&self.device).sensors.row
    }
}

impl Default for EmulatorBackend {
    fn default() -> Self {
        Self::new(EmulatorConfig::default())
    }
}

async fn run_ticks(
    device: Arc<Mutex<Device>>,
    reports: mpsc::Sender<SensorReport>,
    period: Duration,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let report = lock(&device).tick();
        match reports.try_send(report) {
            Ok(()) => {}
            Err(TrySendError::Full(report)) => {
                trace!(row = report.row, "Host busy, report dropped");
            }
            Err(TrySendError::Closed(_)) => break,
        }
    }
}

#[async_trait]
impl DeviceBackend for EmulatorBackend {
    fn name(&self) -> &'static str {
        "emulator"
    }

    async fn start(&self) -> Result<(), TransportError> {
        let tx = lock(&self.report_tx)
            .take()
            .ok_or_else(|| TransportError::Misuse("emulator already started".to_string()))?;

        let handle = tokio::spawn(run_ticks(
            self.device.clone(),
            tx,
            self.config.frame_period(),
        ));
        *lock(&self.ticker) = Some(handle);

        info!(ms_per_frame = self.config.ms_per_frame, "Emulator started");
        Ok(())
    }

    fn arm_measurement(&self, row: MeasureRow) {
        let mut device = lock(&self.device);
        device.sensors.row = row.resolve(device.sensors.row);
        trace!(row = device.sensors.row, "Measure row armed");
    }

    async fn send_frame(&self, packets: Vec<FramePacket>) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Disconnected);
        }
        let mut device = lock(&self.device);
        for packet in packets {
            // Go through the wire format so malformed packets fail here
            let packet = FramePacket::decode(&packet.to_bytes())
                .map_err(|e| TransportError::Tx(e.to_string()))?;
            device.panel.receive(&packet);
        }
        Ok(())
    }

    async fn next_report(&self) -> Result<SensorReport, TransportError> {
        self.report_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or(TransportError::Disconnected)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        // Dropping an unstarted sender also ends pending receives
        lock(&self.report_tx).take();
        if let Some(handle) = lock(&self.ticker).take() {
            handle.abort();
        }
        info!(frames = self.frames_shown(), "Emulator stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blackbox_core::domain::FrameBuffer;
    use blackbox_core::protocol::encode_frame;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    fn fast() -> EmulatorBackend {
        EmulatorBackend::new(EmulatorConfig { ms_per_frame: 2 })
    }

    async fn next(emu: &EmulatorBackend) -> SensorReport {
        timeout(WAIT, emu.next_report())
            .await
            .expect("no report in time")
            .expect("report failed")
    }

    #[test]
    fn test_frame_period_parsing() {
        assert_eq!(EmulatorConfig::parse(None).ms_per_frame, 12);
        assert_eq!(EmulatorConfig::parse(Some("0")).ms_per_frame, 12);
        assert_eq!(EmulatorConfig::parse(Some("fast")).ms_per_frame, 12);
        assert_eq!(EmulatorConfig::parse(Some("30")).ms_per_frame, 30);
        assert_eq!(EmulatorConfig::parse(Some(" 40 ")).ms_per_frame, 40);
        assert_eq!(EmulatorConfig::parse(Some("0x10")).ms_per_frame, 16);
    }

    #[test]
    fn test_zero_period_uses_default() {
        let config = EmulatorConfig { ms_per_frame: 0 };
        assert_eq!(config.frame_period(), Duration::from_millis(12));
        assert_eq!(
            EmulatorConfig { ms_per_frame: 3 }.frame_period(),
            Duration::from_millis(3)
        );
    }

    #[tokio::test]
    async fn test_start_twice_is_misuse() {
        let emu = fast();
        emu.start().await.unwrap();
        assert!(matches!(
            emu.start().await,
            Err(TransportError::Misuse(_))
        ));
        emu.close().await;
    }

    #[tokio::test]
    async fn test_committed_frame_shown_after_tick() {
        let emu = fast();
        emu.start().await.unwrap();

        let led = LedIndex::new(123).unwrap();
        let mut frame = FrameBuffer::new();
        frame.set(led, Color::new(1, 2, 3));
        emu.send_frame(encode_frame(&frame.take_snapshot()))
            .await
            .unwrap();

        timeout(WAIT, async {
            while emu.frames_shown() == 0 {
                next(&emu).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(emu.displayed_color(led), Color::new(1, 2, 3));
        emu.close().await;
    }

    #[tokio::test]
    async fn test_reports_follow_armed_row() {
        let emu = fast();
        emu.start().await.unwrap();

        emu.arm_measurement(MeasureRow::Row(3));
        // Drain reports queued before the row changed
        let mut report = next(&emu).await;
        while report.row != 3 {
            report = next(&emu).await;
        }

        emu.arm_measurement(MeasureRow::Next);
        assert_eq!(emu.measured_row(), 4);

        emu.arm_measurement(MeasureRow::Row(11));
        emu.arm_measurement(MeasureRow::Next);
        assert_eq!(emu.measured_row(), 0);
        emu.close().await;
    }

    #[tokio::test]
    async fn test_sensor_readings() {
        let emu = fast();
        emu.cover_sensor(0, 5).unwrap();
        emu.start().await.unwrap();
        emu.arm_measurement(MeasureRow::Row(0));

        for _ in 0..5 {
            let report = next(&emu).await;
            if report.row != 0 {
                continue;
            }
            for (i, value) in report.values.iter().enumerate() {
                if i == 5 {
                    // Covered before any measurement: never sampled
                    assert_eq!(*value, 0);
                } else {
                    assert!((100..220).contains(value), "reading {}", value);
                }
            }
        }
        emu.close().await;
    }

    #[tokio::test]
    async fn test_covered_sensor_holds_reading() {
        let emu = fast();
        emu.start().await.unwrap();
        emu.arm_measurement(MeasureRow::Row(2));

        emu.cover_sensor(2, 7).unwrap();
        // Skip reports that may have been queued before the cover
        for _ in 0..REPORT_QUEUE + 1 {
            next(&emu).await;
        }
        let held = next(&emu).await.values[7];
        for _ in 0..3 {
            assert_eq!(next(&emu).await.values[7], held);
        }

        emu.uncover_sensor(2, 7).unwrap();
        emu.close().await;
    }

    #[tokio::test]
    async fn test_cover_bounds() {
        let emu = fast();
        assert!(emu.cover_sensor(12, 0).is_err());
        assert!(emu.cover_sensor(0, 8).is_err());
        assert!(emu.cover_field(0, 1).is_err());
        assert!(emu.cover_field(1, 9).is_err());
        assert!(emu.cover_field(8, 8).is_ok());
    }

    #[tokio::test]
    async fn test_close_ends_reports() {
        let emu = fast();
        emu.start().await.unwrap();
        next(&emu).await;
        emu.close().await;

        // Drain whatever was queued, then the channel reports disconnect
        let result = timeout(WAIT, async {
            loop {
                if let Err(e) = emu.next_report().await {
                    return e;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, TransportError::Disconnected);
    }

    #[tokio::test]
    async fn test_frames_rejected_after_close() {
        let emu = fast();
        emu.start().await.unwrap();
        emu.close().await;

        let mut frame = FrameBuffer::new();
        frame.set(LedIndex::new(9).unwrap(), Color::new(5, 5, 5));
        assert_eq!(
            emu.send_frame(encode_frame(&frame.take_snapshot())).await,
            Err(TransportError::Disconnected)
        );
        assert_eq!(emu.displayed_color(LedIndex::new(9).unwrap()), Color::BLACK);
        assert_eq!(emu.frames_shown(), 0);
    }

    #[tokio::test]
    async fn test_bad_packet_rejected() {
        let emu = fast();
        let packet = FramePacket {
            offset: 319,
            commit: true,
            payload: vec![0; 6],
        };
        assert!(matches!(
            emu.send_frame(vec![packet]).await,
            Err(TransportError::Tx(_))
        ));
    }
}
