//! Immutable snapshots of the panel layout used for revert

use crate::layout::PanelRow;
use serde::{Deserialize, Serialize};

/// Point-in-time deep copy of every panel row
///
/// Rows are private and never handed out mutably, so a snapshot stays
/// identical to the layout it was taken from for its whole lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutSnapshot {
    rows: Vec<PanelRow>,
}

impl LayoutSnapshot {
    /// Capture a copy of the given rows
    pub fn capture(rows: &[PanelRow]) -> Self {
        Self {
            rows: rows.to_vec(),
        }
    }

    /// Rows in layout order
    pub fn rows(&self) -> &[PanelRow] {
        &self.rows
    }

    /// Number of rows in the snapshot
    #[inline]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Tilt angle of every row, in radians
    pub fn tilt_angles(&self) -> Vec<f64> {
        self.rows.iter().map(|row| row.tilt).collect()
    }
}
