// Radial rainbow, synced to the sensor scan

use anyhow::Result;
use tracing::{debug, info};

use super::FrameBudget;
use blackbox_core::domain::geometry::GRID40_SIZE;
use blackbox_core::{Color, Session, TransmitStatus};

/// Hue advance per frame
const HUE_STEP: f64 = 0.005;

/// Distance (in 40x40 units) for one full turn of the color wheel
const HUE_SPREAD: f64 = 40.0;

const CENTER: f64 = 19.5;

/// Color of one 40x40 position at base hue `h`
pub fn color_at(h: f64, x: usize, y: usize) -> Color {
    let dx = x as f64 - CENTER;
    let dy = y as f64 - CENTER;
    let dist = (dx * dx + dy * dy).sqrt();
    Color::from_hls(h + dist / HUE_SPREAD, 0.5, 1.0)
}

fn render(session: &Session, h: f64) -> Result<()> {
    for y in 0..GRID40_SIZE {
        for x in 0..GRID40_SIZE {
            session.set_led40(x as i32, y as i32, color_at(h, x, y))?;
        }
    }
    Ok(())
}

/// Run until `limit` frames are shown or Ctrl+C
pub async fn run(session: &Session, limit: Option<u64>) -> Result<u64> {
    let mut budget = FrameBudget::new(limit);
    let mut h = 0.0;

    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    while budget.next_frame() {
        render(session, h)?;
        h += HUE_STEP;

        let row = tokio::select! {
            _ = &mut interrupted => break,
            row = session.wait_measure() => row?,
        };
        if session.transmit(-1)? == TransmitStatus::AlreadyInFlight {
            debug!(row, "Device busy, frame skipped");
        }
    }

    session.flush().await?;
    info!(frames = budget.shown(), "HSL demo finished");
    Ok(budget.shown())
}
