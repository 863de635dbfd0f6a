// Sensor Domain Model

use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// Number of sensor rows the device scans
pub const SENSOR_ROWS: usize = 12;

/// Readings per sensor row
pub const SENSORS_PER_ROW: usize = 8;

/// Total number of sensors
pub const SENSOR_COUNT: usize = SENSOR_ROWS * SENSORS_PER_ROW;

/// Side length of the square sensor field (rows 0..8)
pub const FIELD_SIZE: usize = 8;

/// One row of readings as reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorReport {
    pub row: u8,
    pub values: [u16; SENSORS_PER_ROW],
}

/// Edge rows surrounding the sensor field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeSide {
    Right,
    Top,
    Left,
    Bottom,
}

impl EdgeSide {
    pub fn row(self) -> usize {
        match self {
            EdgeSide::Right => 8,
            EdgeSide::Top => 9,
            EdgeSide::Left => 10,
            EdgeSide::Bottom => 11,
        }
    }
}

/// Snapshot of all sensor readings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SensorGrid {
    rows: [[u16; SENSORS_PER_ROW]; SENSOR_ROWS],
}

impl SensorGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store one report; rows are validated when the report is decoded
    pub fn apply(&mut self, report: &SensorReport) {
        if let Some(row) = self.rows.get_mut(report.row as usize) {
            *row = report.values;
        }
    }

    pub fn row(&self, row: usize) -> Option<&[u16; SENSORS_PER_ROW]> {
        self.rows.get(row)
    }

    pub fn rows(&self) -> &[[u16; SENSORS_PER_ROW]; SENSOR_ROWS] {
        &self.rows
    }

    /// Flat copy, row-major (`row * 8 + i`)
    pub fn to_flat(&self) -> [u16; SENSOR_COUNT] {
        let mut flat = [0; SENSOR_COUNT];
        for (chunk, row) in flat.chunks_exact_mut(SENSORS_PER_ROW).zip(self.rows.iter()) {
            chunk.copy_from_slice(row);
        }
        flat
    }

    /// Reading of a field sensor, 1-based with y pointing up
    ///
    /// # Errors
    /// Returns `DomainError::OutOfRange` unless 1 <= x, y <= 8
    pub fn field(&self, x: i32, y: i32) -> Result<u16> {
        DomainError::check_range("field x", x.into(), 1, FIELD_SIZE as i64 + 1)?;
        DomainError::check_range("field y", y.into(), 1, FIELD_SIZE as i64 + 1)?;
        let (x, y) = (x as usize, y as usize);
        Ok(self.rows[x - 1][FIELD_SIZE - y])
    }

    pub fn edge(&self, side: EdgeSide) -> &[u16; SENSORS_PER_ROW] {
        &self.rows[side.row()]
    }
}

/// Sensor row to capture after a transmit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeasureRow {
    /// Step through the rows one by one
    Next,
    Row(u8),
}

impl MeasureRow {
    /// Parse the integer form: -1 for `Next`, otherwise a row number
    ///
    /// # Errors
    /// Returns `DomainError::OutOfRange` unless -1 <= row < 12
    pub fn new(row: i32) -> Result<Self> {
        DomainError::check_range("measure row", row.into(), -1, SENSOR_ROWS as i64)?;
        if row == -1 {
            Ok(MeasureRow::Next)
        } else {
            Ok(MeasureRow::Row(row as u8))
        }
    }

    /// Row to measure given the previously measured one
    pub fn resolve(self, previous: u8) -> u8 {
        match self {
            MeasureRow::Next => ((previous as usize + 1) % SENSOR_ROWS) as u8,
            MeasureRow::Row(row) => row,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_row_bounds() {
        assert_eq!(MeasureRow::new(-1).unwrap(), MeasureRow::Next);
        assert_eq!(MeasureRow::new(0).unwrap(), MeasureRow::Row(0));
        assert_eq!(MeasureRow::new(11).unwrap(), MeasureRow::Row(11));
        assert!(MeasureRow::new(12).is_err());
        assert!(MeasureRow::new(-2).is_err());
    }

    #[test]
    fn test_measure_row_resolve() {
        assert_eq!(MeasureRow::Next.resolve(0), 1);
        assert_eq!(MeasureRow::Next.resolve(11), 0);
        assert_eq!(MeasureRow::Row(4).resolve(9), 4);
    }

    #[test]
    fn test_apply_report() {
        let mut grid = SensorGrid::new();
        grid.apply(&SensorReport {
            row: 3,
            values: [1, 2, 3, 4, 5, 6, 7, 8],
        });
        assert_eq!(grid.row(3), Some(&[1, 2, 3, 4, 5, 6, 7, 8]));
        assert_eq!(grid.to_flat()[3 * 8 + 7], 8);
        assert_eq!(grid.to_flat()[0], 0);
    }

    #[test]
    fn test_field_indexing() {
        let mut grid = SensorGrid::new();
        grid.apply(&SensorReport {
            row: 0,
            values: [10, 11, 12, 13, 14, 15, 16, 17],
        });
        // x=1 is row 0, y=8 is its first reading, y=1 its last
        assert_eq!(grid.field(1, 8).unwrap(), 10);
        assert_eq!(grid.field(1, 1).unwrap(), 17);
        assert!(grid.field(0, 1).is_err());
        assert!(grid.field(1, 9).is_err());
    }

    #[test]
    fn test_edge_rows() {
        let mut grid = SensorGrid::new();
        grid.apply(&SensorReport {
            row: 10,
            values: [7; 8],
        });
        assert_eq!(grid.edge(EdgeSide::Left), &[7; 8]);
        assert_eq!(grid.edge(EdgeSide::Right), &[0; 8]);
    }

    #[test]
    fn test_grid_serializes_as_rows() {
        let grid = SensorGrid::new();
        let json = serde_json::to_value(&grid).unwrap();
        assert_eq!(json["rows"].as_array().unwrap().len(), SENSOR_ROWS);
    }
}
