//! End-to-end tests: Session over the emulated device
//!
//! Every test runs the real receive loop, transmit task and emulator tick
//! task; only the USB link is replaced.

use blackbox_core::domain::{Grid10, Grid40, LedIndex, LedMap, SENSOR_ROWS};
use blackbox_core::port::DeviceBackend;
use blackbox_core::{Color, Session, TransportError};
use blackbox_infra_emu::{EmulatorBackend, EmulatorConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

async fn open_emulator() -> (Session, Arc<EmulatorBackend>) {
    let emu = Arc::new(EmulatorBackend::new(EmulatorConfig { ms_per_frame: 2 }));
    let session = Session::open(emu.clone()).await.unwrap();
    (session, emu)
}

/// Wait for sensor rows until `done` holds
async fn measure_until(session: &Session, mut done: impl FnMut() -> bool) {
    timeout(WAIT, async {
        while !done() {
            session.wait_measure().await.unwrap();
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Transmit with row auto-advance until all rows were reported
async fn full_scan(session: &Session) {
    let mut seen = [false; SENSOR_ROWS];
    timeout(WAIT, async {
        while !seen.iter().all(|s| *s) {
            session.transmit(-1).unwrap();
            let row = session.wait_measure().await.unwrap();
            seen[row as usize] = true;
        }
    })
    .await
    .expect("scan incomplete");
}

/// Test 1: a transmitted LED shows up on the emulated panel
#[tokio::test]
async fn test_transmitted_led_is_displayed() {
    let (session, emu) = open_emulator().await;
    let led = LedIndex::new(77).unwrap();
    let pink = Color::new(255, 20, 147);

    session.set_led(77, pink).unwrap();
    session.transmit(-1).unwrap();
    session.flush().await.unwrap();

    measure_until(&session, || emu.displayed_color(led) == pink).await;

    // Only LED 77 was set
    let others_dark = LedIndex::all()
        .filter(|l| *l != led)
        .all(|l| emu.displayed_color(l) == Color::BLACK);
    assert!(others_dark);

    session.close().await;
}

/// Test 2: 40x40 and 10x10 setters land on the mapped LEDs
#[tokio::test]
async fn test_grid_setters_map_to_leds() {
    let (session, emu) = open_emulator().await;
    let map = LedMap::new();
    let green = Color::new(0, 200, 0);
    let blue = Color::new(0, 0, 200);

    // (0, 5) is LED 0; (1, 1) has no LED
    session.set_led40(0, 5, green).unwrap();
    session.set_led40(1, 1, green).unwrap();
    session.set_led10(4, 4, blue).unwrap();
    session.transmit(-1).unwrap();
    session.flush().await.unwrap();

    let first = LedIndex::new(0).unwrap();
    measure_until(&session, || emu.displayed_color(first) == green).await;

    let cell = map.leds_in(Grid10::new(4, 4).unwrap());
    assert!(!cell.is_empty());
    for led in cell {
        assert_eq!(emu.displayed_color(*led), blue);
    }
    assert!(map.led_at(Grid40::new(1, 1).unwrap()).is_none());

    let lit = LedIndex::all()
        .filter(|l| emu.displayed_color(*l) != Color::BLACK)
        .count();
    assert_eq!(lit, 1 + cell.len());

    session.close().await;
}

/// Test 3: the armed row is the one measured
#[tokio::test]
async fn test_explicit_measure_row() {
    let (session, _emu) = open_emulator().await;

    session.transmit(5).unwrap();
    let found = timeout(WAIT, async {
        loop {
            if session.wait_measure().await.unwrap() == 5 {
                return true;
            }
        }
    })
    .await
    .unwrap();
    assert!(found);

    // The row just received is in the snapshot
    let grid = session.sensor_data();
    assert!(grid.row(5).unwrap().iter().all(|v| *v >= 100));

    session.close().await;
}

/// Test 4: a full scan fills every reading with emulated light levels
#[tokio::test]
async fn test_full_scan_fills_grid() {
    let (session, _emu) = open_emulator().await;

    full_scan(&session).await;

    let flat = session.sensor_data().to_flat();
    assert!(flat.iter().all(|v| (100..220).contains(v)), "{:?}", flat);

    session.close().await;
}

/// Test 5: covering a field sensor freezes its reading
#[tokio::test]
async fn test_covered_field_sensor() {
    let (session, emu) = open_emulator().await;
    emu.cover_field(3, 4).unwrap();

    full_scan(&session).await;

    // Covered before its first measurement: never sampled
    assert_eq!(session.sensor_field(3, 4).unwrap(), 0);
    assert!(session.sensor_field(4, 3).unwrap() >= 100);
    assert!(session.sensor_field(1, 1).unwrap() >= 100);
    assert!(session.sensor_field(8, 8).unwrap() >= 100);

    session.close().await;
}

/// Test 6: repeated frames keep the panel in sync
#[tokio::test]
async fn test_animation_frames() {
    let (session, emu) = open_emulator().await;
    let led = LedIndex::new(200).unwrap();

    for level in [10u8, 60, 120, 250] {
        session.set_led(200, Color::new(level, level, level)).unwrap();
        session.transmit(-1).unwrap();
        session.flush().await.unwrap();
        measure_until(&session, || emu.displayed_color(led).r == level).await;
    }

    assert!(emu.frames_shown() >= 4);
    session.close().await;
}

/// Test 7: close releases the emulator
#[tokio::test]
async fn test_close_releases_emulator() {
    let (session, emu) = open_emulator().await;
    session.wait_measure().await.unwrap();
    session.close().await;

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

/// Test 8: dropping an open session still releases the emulator
#[tokio::test]
async fn test_drop_releases_emulator() {
    let (session, emu) = open_emulator().await;
    session.wait_measure().await.unwrap();
    drop(session);

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
