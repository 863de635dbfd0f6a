// Read-only views: sensor table, LED positions, emulator preview

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled};

use blackbox_core::domain::geometry::GRID40_SIZE;
use blackbox_core::domain::{
    led_position, Color, EdgeSide, Grid40, LedIndex, LedMap, SensorGrid, FRAME_BYTES, SENSOR_ROWS,
};
use blackbox_core::Session;

#[derive(Tabled)]
struct SensorRow {
    #[tabled(rename = "row")]
    label: String,
    #[tabled(rename = "0")]
    s0: u16,
    #[tabled(rename = "1")]
    s1: u16,
    #[tabled(rename = "2")]
    s2: u16,
    #[tabled(rename = "3")]
    s3: u16,
    #[tabled(rename = "4")]
    s4: u16,
    #[tabled(rename = "5")]
    s5: u16,
    #[tabled(rename = "6")]
    s6: u16,
    #[tabled(rename = "7")]
    s7: u16,
}

fn row_label(row: usize) -> String {
    let edge = [
        EdgeSide::Right,
        EdgeSide::Top,
        EdgeSide::Left,
        EdgeSide::Bottom,
    ]
    .into_iter()
    .find(|side| side.row() == row);

    match edge {
        Some(side) => format!("{} ({:?})", row, side).to_lowercase(),
        None => format!("{} (x={})", row, row + 1),
    }
}

pub fn sensor_table(grid: &SensorGrid) -> String {
    let rows: Vec<SensorRow> = grid
        .rows()
        .iter()
        .enumerate()
        .map(|(row, v)| SensorRow {
            label: row_label(row),
            s0: v[0],
            s1: v[1],
            s2: v[2],
            s3: v[3],
            s4: v[4],
            s5: v[5],
            s6: v[6],
            s7: v[7],
        })
        .collect();
    Table::new(rows).to_string()
}

/// Wait until every sensor row has been reported once
pub async fn full_scan(session: &Session) -> Result<SensorGrid> {
    let mut seen = [false; SENSOR_ROWS];
    while !seen.iter().all(|s| *s) {
        session.transmit(-1)?;
        let row = session.wait_measure().await?;
        if let Some(flag) = seen.get_mut(row as usize) {
            *flag = true;
        }
    }
    Ok(session.sensor_data())
}

#[derive(Serialize, Tabled)]
pub struct LedPosition {
    pub led: usize,
    pub x: u8,
    pub y: u8,
}

pub fn led_positions() -> Vec<LedPosition> {
    LedIndex::all()
        .map(|led| {
            let pos = led_position(led);
            LedPosition {
                led: led.get(),
                x: pos.x,
                y: pos.y,
            }
        })
        .collect()
}

pub fn positions_table(positions: Vec<LedPosition>) -> String {
    Table::new(positions).to_string()
}

/// 40x40 map of LED numbers, top row is y = 39
pub fn position_map(map: &LedMap) -> String {
    let mut out = String::new();
    for y in (0..GRID40_SIZE).rev() {
        out.push_str(&format!("{:>2} |", y));
        for x in 0..GRID40_SIZE {
            match Grid40::new(x as i32, y as i32)
                .ok()
                .and_then(|pos| map.led_at(pos))
            {
                Some(led) => out.push_str(&format!("{:>4}", led.get())),
                None => out.push_str("   ."),
            }
        }
        out.push('\n');
    }
    out
}

/// Render a displayed frame with truecolor blocks, top row is y = 39
pub fn render_frame(frame: &[u8; FRAME_BYTES], map: &LedMap) -> String {
    let mut out = String::new();
    for y in (0..GRID40_SIZE).rev() {
        for x in 0..GRID40_SIZE {
            let led = Grid40::new(x as i32, y as i32)
                .ok()
                .and_then(|pos| map.led_at(pos));
            match led {
                Some(led) => {
                    let offset = led.get() * 3;
                    let color = Color::from_grb([frame[offset], frame[offset + 1], frame[offset + 2]]);
                    out.push_str(&"██".truecolor(color.r, color.g, color.b).to_string());
                }
                None => out.push_str("  "),
            }
        }
        out.push('\n');
    }
    out
}
