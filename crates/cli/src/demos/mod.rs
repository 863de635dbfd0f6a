// Demo animations
// Each demo drives an open session and returns the number of frames shown.

pub mod black;
pub mod hsl;
pub mod paint;

use clap::ValueEnum;

/// Counts frames against an optional limit
#[derive(Debug, Clone, Copy)]
pub struct FrameBudget {
    limit: Option<u64>,
    shown: u64,
}

impl FrameBudget {
    pub fn new(limit: Option<u64>) -> Self {
        Self { limit, shown: 0 }
    }

    /// Claim the next frame; false once the limit is used up
    pub fn next_frame(&mut self) -> bool {
        if self.limit.is_some_and(|limit| self.shown >= limit) {
            return false;
        }
        self.shown += 1;
        true
    }

    pub fn shown(&self) -> u64 {
        self.shown
    }
}

/// Animation run before a preview
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DemoKind {
    Black,
    Hsl,
    Paint10,
    Paint40,
}
