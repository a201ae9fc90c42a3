//! Physical panel layout the optimizer mutates
//!
//! The scheduler only talks to the layout through [`PanelModel`]. Two
//! implementations are provided: [`PanelLayout`], an owned set of rows, and
//! [`SharedLayout`], a handle that lets a host keep reading the layout while a
//! run owns the write side.

use crate::error::{TiltOptimizerError, TiltOptimizerResult};
use crate::snapshot::LayoutSnapshot;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;
use uuid::Uuid;

/// One independently tiltable row of solar panels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelRow {
    /// Unique identifier
    pub id: Uuid,
    /// Display label
    pub label: String,
    /// Tilt angle in radians, positive towards the equator
    pub tilt: f64,
    /// Azimuth of the row normal in radians, 0 facing south, positive west
    pub azimuth: f64,
    /// Collector area in square meters
    pub area: f64,
    /// Module efficiency in [0, 1]
    pub efficiency: f64,
    /// Height of the row base above ground in meters
    pub base_height: f64,
}

impl PanelRow {
    /// Create a south-facing row with default collector properties
    pub fn new(label: impl Into<String>, tilt: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            tilt,
            azimuth: 0.0,
            area: 10.0,
            efficiency: 0.2,
            base_height: 0.5,
        }
    }

    /// Builder-style azimuth override
    pub fn with_azimuth(mut self, azimuth: f64) -> Self {
        self.azimuth = azimuth;
        self
    }

    /// Builder-style area override
    pub fn with_area(mut self, area: f64) -> Self {
        self.area = area;
        self
    }

    /// Builder-style efficiency override
    pub fn with_efficiency(mut self, efficiency: f64) -> Self {
        self.efficiency = efficiency;
        self
    }
}

/// Mutable physical model of tiltable panel rows
pub trait PanelModel: Send {
    /// Number of independently tiltable rows
    fn row_count(&self) -> usize;

    /// Current tilt of every row, in row order
    fn tilt_angles(&self) -> Vec<f64>;

    /// Set the tilt of one row
    fn set_tilt(&mut self, row: usize, angle: f64) -> TiltOptimizerResult<()>;

    /// Deep copy of the current state
    fn snapshot(&self) -> LayoutSnapshot;

    /// Replace the whole state with a snapshot
    fn restore(&mut self, snapshot: &LayoutSnapshot);
}

/// Owned set of panel rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PanelLayout {
    rows: Vec<PanelRow>,
}

impl PanelLayout {
    /// Create an empty layout
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a layout from rows
    pub fn from_rows(rows: Vec<PanelRow>) -> Self {
        Self { rows }
    }

    /// Add a row
    pub fn push(&mut self, row: PanelRow) {
        self.rows.push(row);
    }

    /// Rows in layout order
    pub fn rows(&self) -> &[PanelRow] {
        &self.rows
    }
}

impl PanelModel for PanelLayout {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn tilt_angles(&self) -> Vec<f64> {
        self.rows.iter().map(|row| row.tilt).collect()
    }

    fn set_tilt(&mut self, row: usize, angle: f64) -> TiltOptimizerResult<()> {
        let count = self.rows.len();
        let target = self
            .rows
            .get_mut(row)
            .ok_or(TiltOptimizerError::DimensionMismatch {
                expected: count,
                actual: row + 1,
            })?;
        target.tilt = angle.clamp(-FRAC_PI_2, FRAC_PI_2);
        Ok(())
    }

    fn snapshot(&self) -> LayoutSnapshot {
        LayoutSnapshot::capture(&self.rows)
    }

    fn restore(&mut self, snapshot: &LayoutSnapshot) {
        self.rows = snapshot.rows().to_vec();
    }
}

/// Layout whose state the host can watch while a scheduler owns it
///
/// Not `Clone`: the owner is the only writer. Hosts observe through
/// [`LayoutView`] handles from [`SharedLayout::view`].
#[derive(Debug, Default)]
pub struct SharedLayout {
    inner: Arc<RwLock<PanelLayout>>,
}

impl SharedLayout {
    /// Wrap a layout
    pub fn new(layout: PanelLayout) -> Self {
        Self {
            inner: Arc::new(RwLock::new(layout)),
        }
    }

    /// Read-only handle onto this layout
    pub fn view(&self) -> LayoutView {
        LayoutView {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Copy of the current layout
    pub fn current(&self) -> PanelLayout {
        self.inner.read().clone()
    }
}

/// Read-only handle onto a [`SharedLayout`]
#[derive(Debug, Clone)]
pub struct LayoutView {
    inner: Arc<RwLock<PanelLayout>>,
}

impl LayoutView {
    /// Copy of the current layout
    pub fn current(&self) -> PanelLayout {
        self.inner.read().clone()
    }

    /// Current tilt of every row, in row order
    pub fn tilt_angles(&self) -> Vec<f64> {
        self.inner.read().tilt_angles()
    }
}

impl PanelModel for SharedLayout {
    fn row_count(&self) -> usize {
        self.inner.read().row_count()
    }

    fn tilt_angles(&self) -> Vec<f64> {
        self.inner.read().tilt_angles()
    }

    fn set_tilt(&mut self, row: usize, angle: f64) -> TiltOptimizerResult<()> {
        self.inner.write().set_tilt(row, angle)
    }

    fn snapshot(&self) -> LayoutSnapshot {
        self.inner.read().snapshot()
    }

    fn restore(&mut self, snapshot: &LayoutSnapshot) {
        self.inner.write().restore(snapshot);
    }
}
