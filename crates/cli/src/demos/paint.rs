// Integer HSL color sweep over the 10x10 or 40x40 grid

use anyhow::Result;
use clap::ValueEnum;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

use super::FrameBudget;
use blackbox_core::domain::geometry::{GRID10_SIZE, GRID40_SIZE};
use blackbox_core::{Color, Session, TransmitStatus};

/// Time between frames
const FRAME_DELAY: Duration = Duration::from_millis(20);

/// Grid the sweep is painted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Grid {
    #[value(name = "10")]
    Ten,
    #[value(name = "40")]
    Forty,
}

impl Grid {
    fn size(self) -> usize {
        match self {
            Grid::Ten => GRID10_SIZE,
            Grid::Forty => GRID40_SIZE,
        }
    }

    /// Hue advance per frame
    fn step(self) -> f64 {
        match self {
            Grid::Ten => 1.0,
            Grid::Forty => 0.5,
        }
    }
}

/// Color of one cell at base hue `h`
pub fn color_at(grid: Grid, h: f64, x: usize, y: usize) -> Color {
    let offset = match grid {
        Grid::Ten => x * 4 + y / 2,
        Grid::Forty => x * 3 + y / 2,
    };
    let hue = (h as usize + offset) % 256;
    Color::from_hsl8(hue as u8, 255, 128)
}

fn render(session: &Session, grid: Grid, h: f64) -> Result<()> {
    for y in 0..grid.size() {
        for x in 0..grid.size() {
            let color = color_at(grid, h, x, y);
            match grid {
                Grid::Ten => session.set_led10(x as i32, y as i32, color)?,
                Grid::Forty => session.set_led40(x as i32, y as i32, color)?,
            }
        }
    }
    Ok(())
}

/// Run until `limit` frames are shown or Ctrl+C
pub async fn run(session: &Session, grid: Grid, limit: Option<u64>) -> Result<u64> {
    let mut budget = FrameBudget::new(limit);
    let mut h = 0.0;

    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    while budget.next_frame() {
        render(session, grid, h)?;
        h = (h + grid.step()) % 256.0;

        if session.transmit(-1)? == TransmitStatus::AlreadyInFlight {
            debug!("Device busy, frame skipped");
        }

        tokio::select! {
            _ = &mut interrupted => break,
            _ = sleep(FRAME_DELAY) => {}
        }
    }

    session.flush().await?;
    info!(grid = ?grid, frames = budget.shown(), "Paint demo finished");
    Ok(budget.shown())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_offsets() {
        assert_eq!(color_at(Grid::Ten, 0.0, 0, 0), Color::from_hsl8(0, 255, 128));
        assert_eq!(color_at(Grid::Ten, 0.0, 1, 3), Color::from_hsl8(5, 255, 128));
        assert_eq!(color_at(Grid::Forty, 10.5, 2, 2), Color::from_hsl8(17, 255, 128));
    }

    #[test]
    fn test_hue_wraps_at_256() {
        assert_eq!(
            color_at(Grid::Ten, 250.0, 9, 9),
            Color::from_hsl8(((250 + 36 + 4) % 256) as u8, 255, 128)
        );
    }
}
