// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("{what} out of range: {value} (expected {min}..{max})")]
    OutOfRange {
        what: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Broken sensor report: {0}")]
    BrokenReport(String),

    #[error("Broken frame packet: {0}")]
    BrokenPacket(String),
}

impl DomainError {
    /// Check `value` against the half-open range `min..max`
    pub(crate) fn check_range(
        what: &'static str,
        value: i64,
        min: i64,
        max: i64,
    ) -> Result<()> {
        if value < min || value >= max {
            return Err(DomainError::OutOfRange {
                what,
                value,
                min,
                max,
            });
        }
        Ok(())
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;
