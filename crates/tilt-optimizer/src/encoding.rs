//! Mapping between normalized positions and physical tilt angles
//!
//! Every component of a position lies in `[0, 1]` and maps linearly onto a
//! tilt in `[-π/2, π/2]`: `angle = (2v - 1)·(π/2)`.

use crate::error::{TiltOptimizerError, TiltOptimizerResult};
use crate::layout::PanelModel;
use std::f64::consts::FRAC_PI_2;

/// Smallest representable tilt, facing away from the equator
pub const MIN_TILT: f64 = -FRAC_PI_2;

/// Largest representable tilt, facing the equator
pub const MAX_TILT: f64 = FRAC_PI_2;

/// Normalize a tilt angle into `[0, 1]`
#[inline]
pub fn encode(angle: f64) -> f64 {
    angle / FRAC_PI_2 / 2.0 + 0.5
}

/// Map a normalized value back to a tilt angle
#[inline]
pub fn decode(value: f64) -> f64 {
    (2.0 * value - 1.0) * FRAC_PI_2
}

/// Encode every angle, clamping into the valid position range
pub fn encode_all(angles: &[f64]) -> Vec<f64> {
    angles
        .iter()
        .map(|&angle| encode(angle).clamp(0.0, 1.0))
        .collect()
}

/// Decode every component of a position
pub fn decode_all(position: &[f64]) -> Vec<f64> {
    position.iter().map(|&value| decode(value)).collect()
}

/// Set each row's tilt to the decoded component, in row order
pub fn apply_position<M: PanelModel + ?Sized>(
    model: &mut M,
    position: &[f64],
) -> TiltOptimizerResult<()> {
    let rows = model.row_count();
    if rows != position.len() {
        return Err(TiltOptimizerError::DimensionMismatch {
            expected: rows,
            actual: position.len(),
        });
    }

    for (row, &value) in position.iter().enumerate() {
        model.set_tilt(row, decode(value))?;
    }
    Ok(())
}
