// Session constants (no magic values)
use std::time::Duration;

/// Pause after a receive error before asking the backend again (100ms)
pub const RECEIVE_ERROR_PAUSE: Duration = Duration::from_millis(100);

/// Time the receive loop gets to stop during close (5 seconds)
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);
