//! Grid-relative to earth-relative wind rotation.
//!
//! WRF writes wind components along its projected grid axes. Each grid
//! column is rotated from true north by an angle alpha; the model stores
//! `COSALPHA` and `SINALPHA` per cell. Earth-relative components are
//!
//! ```text
//! u_earth = u * cos(alpha) - v * sin(alpha)
//! v_earth = v * cos(alpha) + u * sin(alpha)
//! ```

use ndarray::{ArrayView2, ArrayViewMut3, Zip};

use crate::error::{NetCdfError, NetCdfResult};

/// Rotation cosine variable name in WRF output.
pub const COSALPHA: &str = "COSALPHA";
/// Rotation sine variable name in WRF output.
pub const SINALPHA: &str = "SINALPHA";

/// A pair of grid-relative wind components that must be rotated together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindPair {
    pub u: &'static str,
    pub v: &'static str,
}

/// Wind component pairs known in WRF output.
pub const WIND_PAIRS: [WindPair; 1] = [WindPair { u: "U10", v: "V10" }];

/// The pair a variable belongs to, if it is a wind component.
pub fn wind_pair(variable: &str) -> Option<WindPair> {
    WIND_PAIRS
        .iter()
        .copied()
        .find(|pair| pair.u == variable || pair.v == variable)
}

/// Channel indices `(u, v)` of every wind pair fully present in `variables`.
///
/// A lone component cannot be rotated and is returned as an error.
pub fn paired_channels(variables: &[String]) -> NetCdfResult<Vec<(usize, usize)>> {
    let position = |name: &str| variables.iter().position(|v| v == name);

    let mut pairs = Vec::new();
    for pair in WIND_PAIRS {
        match (position(pair.u), position(pair.v)) {
            (Some(u), Some(v)) => pairs.push((u, v)),
            (None, None) => {}
            (Some(_), None) => {
                return Err(NetCdfError::MissingVariable(format!(
                    "{} requested without {}",
                    pair.u, pair.v
                )))
            }
            (None, Some(_)) => {
                return Err(NetCdfError::MissingVariable(format!(
                    "{} requested without {}",
                    pair.v, pair.u
                )))
            }
        }
    }
    Ok(pairs)
}

/// Rotate one earth-relative pair of values.
#[inline]
pub fn rotate_to_earth(u: f32, v: f32, cosalpha: f32, sinalpha: f32) -> (f32, f32) {
    (u * cosalpha - v * sinalpha, v * cosalpha + u * sinalpha)
}

/// Rotate `(time, rows, cols)` wind fields in place.
///
/// `cosalpha` and `sinalpha` are `(rows, cols)` and apply to every step.
pub fn rotate_fields(
    mut u: ArrayViewMut3<f32>,
    mut v: ArrayViewMut3<f32>,
    cosalpha: ArrayView2<f32>,
    sinalpha: ArrayView2<f32>,
) -> NetCdfResult<()> {
    let (_, rows, cols) = u.dim();
    if v.dim() != u.dim() {
        return Err(NetCdfError::ShapeMismatch {
            variable: "v".to_string(),
            expected: u.shape().to_vec(),
            actual: v.shape().to_vec(),
        });
    }
    for (name, shape) in [(COSALPHA, cosalpha.shape()), (SINALPHA, sinalpha.shape())] {
        if shape != [rows, cols] {
            return Err(NetCdfError::ShapeMismatch {
                variable: name.to_string(),
                expected: vec![rows, cols],
                actual: shape.to_vec(),
            });
        }
    }

    for (mut u_step, mut v_step) in u.outer_iter_mut().zip(v.outer_iter_mut()) {
        Zip::from(&mut u_step)
            .and(&mut v_step)
            .and(&cosalpha)
            .and(&sinalpha)
            .for_each(|u, v, &cos, &sin| {
                let (ue, ve) = rotate_to_earth(*u, *v, cos, sin);
                *u = ue;
                *v = ve;
            });
    }
    Ok(())
}
