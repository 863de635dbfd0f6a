// Background sensor receive loop

use super::constants::RECEIVE_ERROR_PAUSE;
use super::session::{lock, SharedState};
use crate::port::DeviceBackend;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, trace, warn};

/// Resolves once a stop is requested, or when the session is gone
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stop| *stop).await;
}

/// Read reports until stopped or the backend goes away.
///
/// Each report lands in the shared sensor grid before its row number is
/// published, so a woken `wait_measure` always sees the new readings.
pub(crate) async fn run(
    backend: Arc<dyn DeviceBackend>,
    shared: Arc<SharedState>,
    rows: watch::Sender<Option<u8>>,
    mut stop: watch::Receiver<bool>,
) {
    debug!(backend = backend.name(), "Receive loop started");

    loop {
        if *stop.borrow() {
            break;
        }

        let result = tokio::select! {
            result = backend.next_report() => result,
            _ = stop_requested(&mut stop) => break,
        };

        match result {
            Ok(report) => {
                trace!(row = report.row, "Sensor row received");
                lock(&shared.sensors).apply(&report);
                rows.send_replace(Some(report.row));
            }
            Err(e) if e.is_timeout() => continue,
            Err(e) if e.is_fatal() => {
                error!(error = %e, "Receive loop giving up");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Sensor receive failed, retrying");
                tokio::select! {
                    _ = sleep(RECEIVE_ERROR_PAUSE) => {},
                    _ = stop_requested(&mut stop) => break,
                }
            }
        }
    }

    debug!(backend = backend.name(), "Receive loop stopped");
}
