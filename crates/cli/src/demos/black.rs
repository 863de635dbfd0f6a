// Switch all LEDs off

use anyhow::Result;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

use blackbox_core::{Color, Session};

/// Time the device gets to latch the frame before the session closes
const SETTLE: Duration = Duration::from_millis(100);

pub async fn run(session: &Session) -> Result<u64> {
    session.fill(Color::BLACK);
    let status = session.transmit(1)?;
    sleep(SETTLE).await;
    session.flush().await?;

    info!(status = ?status, "All LEDs off");
    Ok(1)
}
