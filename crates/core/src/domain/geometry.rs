// LED geometry: flat indices, 40x40 and 10x10 coordinate systems

use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// Number of LEDs on the panel
pub const LED_COUNT: usize = 320;

/// LEDs per physical strip segment
pub const LEDS_PER_STRIP: usize = 20;

/// Side length of the fine coordinate system
pub const GRID40_SIZE: usize = 40;

/// Side length of the coarse coordinate system
pub const GRID10_SIZE: usize = 10;

/// Upper bound of LEDs sharing one 10x10 cell
pub const MAX_LEDS_PER_CELL: usize = 4;

/// First LED of the vertical (down-up) strips
const VERTICAL_START: usize = LED_COUNT / 2;

/// Validated LED number in `0..LED_COUNT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LedIndex(u16);

impl LedIndex {
    pub fn new(index: i32) -> Result<Self> {
        DomainError::check_range("LED index", index.into(), 0, LED_COUNT as i64)?;
        Ok(Self(index as u16))
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }

    /// All LEDs in wiring order
    pub fn all() -> impl Iterator<Item = LedIndex> {
        (0..LED_COUNT as u16).map(LedIndex)
    }
}

/// Position in the 40x40 coordinate system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grid40 {
    pub x: u8,
    pub y: u8,
}

impl Grid40 {
    pub fn new(x: i32, y: i32) -> Result<Self> {
        DomainError::check_range("x (40x40)", x.into(), 0, GRID40_SIZE as i64)?;
        DomainError::check_range("y (40x40)", y.into(), 0, GRID40_SIZE as i64)?;
        Ok(Self {
            x: x as u8,
            y: y as u8,
        })
    }

    /// Enclosing cell of the coarse grid
    pub fn cell(self) -> Grid10 {
        Grid10 {
            x: self.x >> 2,
            y: self.y >> 2,
        }
    }
}

/// Position in the 10x10 coordinate system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grid10 {
    pub x: u8,
    pub y: u8,
}

impl Grid10 {
    pub fn new(x: i32, y: i32) -> Result<Self> {
        DomainError::check_range("x (10x10)", x.into(), 0, GRID10_SIZE as i64)?;
        DomainError::check_range("y (10x10)", y.into(), 0, GRID10_SIZE as i64)?;
        Ok(Self {
            x: x as u8,
            y: y as u8,
        })
    }
}

/// Position of an LED in the 40x40 system.
///
/// The first half of the LEDs run as horizontal strips (left-right,
/// alternating direction), the second half as vertical strips (down-up,
/// alternating direction). Horizontal strips sit on even x, vertical ones
/// on odd x, so no two LEDs share a position.
pub fn led_position(led: LedIndex) -> Grid40 {
    let led = led.get();
    let (x, y) = if led < VERTICAL_START {
        let strip = led / LEDS_PER_STRIP;
        let y = 5 + 4 * strip;
        let mut x = 2 * (led % LEDS_PER_STRIP);
        if strip % 2 == 1 {
            x = 38 - x;
        }
        (x, y)
    } else {
        let led = led - VERTICAL_START;
        let strip = led / LEDS_PER_STRIP;
        let x = 5 + 4 * strip;
        let mut y = 2 * (led % LEDS_PER_STRIP);
        if strip % 2 == 0 {
            y = 38 - y;
        }
        (x, y)
    };
    Grid40 {
        x: x as u8,
        y: y as u8,
    }
}

/// Reverse lookup tables for both coordinate systems
#[derive(Debug, Clone)]
pub struct LedMap {
    fine: [[Option<LedIndex>; GRID40_SIZE]; GRID40_SIZE],
    coarse: [[Vec<LedIndex>; GRID10_SIZE]; GRID10_SIZE],
}

impl LedMap {
    pub fn new() -> Self {
        let mut fine = [[None; GRID40_SIZE]; GRID40_SIZE];
        let mut coarse: [[Vec<LedIndex>; GRID10_SIZE]; GRID10_SIZE] = Default::default();

        for led in LedIndex::all() {
            let pos = led_position(led);
            fine[pos.y as usize][pos.x as usize] = Some(led);

            let cell = pos.cell();
            coarse[cell.y as usize][cell.x as usize].push(led);
        }

        Self { fine, coarse }
    }

    /// LED at a 40x40 position, if any
    pub fn led_at(&self, pos: Grid40) -> Option<LedIndex> {
        self.fine[pos.y as usize][pos.x as usize]
    }

    /// LEDs inside a 10x10 cell (0..=4 of them)
    pub fn leds_in(&self, cell: Grid10) -> &[LedIndex] {
        &self.coarse[cell.y as usize][cell.x as usize]
    }
}

impl Default for LedMap {
    fn default() -> Self {
        Self::new()
    }
}
