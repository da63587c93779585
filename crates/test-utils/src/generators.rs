//! Synthetic data generators with values that reveal where they came from.

use ndarray::{Array, Array2, Array4};

/// Value stored at `(file, t, c, row)` by [`encoded_stack`].
///
/// `file * 1_000_000 + t * 10_000 + c * 1_000 + row`, exact in `f32` for
/// up to 16 files, 99 time steps, 9 channels and 999 rows.
///
/// # Example
///
/// ```
/// use test_utils::encoded_value;
///
/// assert_eq!(encoded_value(1, 2, 3, 4), 1_023_004.0);
/// ```
pub fn encoded_value(file: usize, t: usize, c: usize, row: usize) -> f32 {
    (file * 1_000_000 + t * 10_000 + c * 1_000 + row) as f32
}

/// Inverse of [`encoded_value`]: `(file, t, c, row)`.
pub fn decode_value(value: f32) -> (usize, usize, usize, usize) {
    let v = value as usize;
    (v / 1_000_000, (v / 10_000) % 100, (v / 1_000) % 10, v % 1_000)
}

/// A `(time, channels, rows, cols)` stack where every cell holds
/// [`encoded_value`] of its own position. Columns share a value.
pub fn encoded_stack(file: usize, shape: (usize, usize, usize, usize)) -> Array4<f32> {
    Array::from_shape_fn(shape, |(t, c, h, _)| encoded_value(file, t, c, h))
}

/// A land/sea mask: land (1.0) on the left `land_cols` columns, sea elsewhere.
pub fn coastline_mask(rows: usize, cols: usize, land_cols: usize) -> Array2<f32> {
    Array::from_shape_fn((rows, cols), |(_, w)| if w < land_cols { 1.0 } else { 0.0 })
}
