//! Native WRF NetCDF reading using the netcdf library.
//!
//! [`WrfNetCdfExtractor`] opens `wrfout` files directly, reads the requested
//! variables and stacks them into the `(time, variable, rows, cols)` layout
//! the sequence assembler expects. 10 m winds are rotated to earth-relative
//! axes on the way out.

use std::path::Path;
use std::sync::Once;

use ndarray::{s, stack, Array2, Array3, Array4, ArrayView3, Axis};
use sequence_loader::{GridFile, LoaderError, VariableExtractor};
use tracing::{debug, trace};

use crate::error::{NetCdfError, NetCdfResult};
use crate::wind::{paired_channels, rotate_fields, COSALPHA, SINALPHA};

/// Turn off the HDF5 library's own error stack printing.
///
/// Failed opens are reported through [`NetCdfError`]; without this HDF5 also
/// dumps its internal trace to stderr. Runs once per process.
pub fn silence_hdf5_errors() {
    static SILENCED: Once = Once::new();

    SILENCED.call_once(|| {
        // SAFETY: null handler and client data is the documented way to
        // disable automatic printing for the default error stack.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// Reads WRF output variables straight from NetCDF.
#[derive(Debug, Clone)]
pub struct WrfNetCdfExtractor {
    rotate_winds: bool,
    expected_time_steps: Option<usize>,
}

impl Default for WrfNetCdfExtractor {
    fn default() -> Self {
        Self {
            rotate_winds: true,
            expected_time_steps: None,
        }
    }
}

impl WrfNetCdfExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject files that do not hold exactly `file_len` time steps.
    pub fn with_file_len(mut self, file_len: usize) -> Self {
        self.expected_time_steps = Some(file_len);
        self
    }

    /// Keep winds on the model grid axes.
    pub fn without_wind_rotation(mut self) -> Self {
        self.rotate_winds = false;
        self
    }

    /// Read `variables` from `path` as a `(time, variable, rows, cols)` stack.
    pub fn read(&self, path: &Path, variables: &[String]) -> NetCdfResult<Array4<f32>> {
        silence_hdf5_errors();

        let file = netcdf::open(path)
            .map_err(|e| NetCdfError::Unreadable(format!("Failed to open NetCDF: {}", e)))?;

        let mut fields = variables
            .iter()
            .map(|name| read_field(&file, name))
            .collect::<NetCdfResult<Vec<Array3<f32>>>>()?;

        let first = fields
            .first()
            .ok_or_else(|| NetCdfError::MissingVariable("no variables requested".to_string()))?;
        let shape = first.shape().to_vec();
        for (name, field) in variables.iter().zip(&fields) {
            if field.shape() != shape.as_slice() {
                return Err(NetCdfError::ShapeMismatch {
                    variable: name.clone(),
                    expected: shape.clone(),
                    actual: field.shape().to_vec(),
                });
            }
        }
        if let Some(expected) = self.expected_time_steps {
            if shape[0] != expected {
                return Err(NetCdfError::Unreadable(format!(
                    "expected {} time steps, found {}",
                    expected, shape[0]
                )));
            }
        }

        if self.rotate_winds {
            let pairs = paired_channels(variables)?;
            if !pairs.is_empty() {
                let cosalpha = read_static(&file, COSALPHA)?;
                let sinalpha = read_static(&file, SINALPHA)?;
                for (u, v) in pairs {
                    let (u_field, v_field) = pair_mut(&mut fields, u, v);
                    rotate_fields(
                        u_field.view_mut(),
                        v_field.view_mut(),
                        cosalpha.view(),
                        sinalpha.view(),
                    )?;
                    trace!(
                        u = %variables[u],
                        v = %variables[v],
                        "Rotated winds to earth-relative axes"
                    );
                }
            }
        }

        let views: Vec<ArrayView3<f32>> = fields.iter().map(|f| f.view()).collect();
        let stacked = stack(Axis(1), &views)
            .map_err(|e| NetCdfError::Unreadable(format!("Failed to stack variables: {}", e)))?;

        debug!(
            path = %path.display(),
            variables = variables.len(),
            shape = ?stacked.dim(),
            "Read WRF variables"
        );
        Ok(stacked)
    }
}

impl VariableExtractor for WrfNetCdfExtractor {
    fn extract(
        &self,
        file: &GridFile,
        variables: &[String],
    ) -> sequence_loader::Result<Array4<f32>> {
        self.read(file.path(), variables)
            .map_err(|e| LoaderError::extraction(file.path(), e.to_string()))
    }

    fn name(&self) -> &str {
        "wrf-netcdf"
    }
}

/// Read one variable as `(time, rows, cols)`.
///
/// Variables with a vertical dimension are reduced to their lowest level;
/// variables without a time dimension become a single step.
fn read_field(file: &netcdf::File, name: &str) -> NetCdfResult<Array3<f32>> {
    let var = file
        .variable(name)
        .ok_or_else(|| NetCdfError::MissingVariable(format!("{} variable", name)))?;
    let dims: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    let values: Vec<f32> = var
        .get_values(..)
        .map_err(|e| NetCdfError::Unreadable(format!("Failed to read {}: {}", name, e)))?;

    let shape_error = |e: ndarray::ShapeError| {
        NetCdfError::Unreadable(format!("{} has inconsistent shape {:?}: {}", name, dims, e))
    };
    match dims.as_slice() {
        &[rows, cols] => Array3::from_shape_vec((1, rows, cols), values).map_err(shape_error),
        &[time, rows, cols] => {
            Array3::from_shape_vec((time, rows, cols), values).map_err(shape_error)
        }
        &[time, levels, rows, cols] => {
            let full = Array4::from_shape_vec((time, levels, rows, cols), values)
                .map_err(shape_error)?;
            Ok(full.slice(s![.., 0, .., ..]).to_owned())
        }
        other => Err(NetCdfError::Unreadable(format!(
            "{} has unsupported rank {} ({:?})",
            name,
            other.len(),
            other
        ))),
    }
}

/// Read a time-invariant field from its first step.
fn read_static(file: &netcdf::File, name: &str) -> NetCdfResult<Array2<f32>> {
    let field = read_field(file, name)?;
    Ok(field.index_axis(Axis(0), 0).to_owned())
}

/// Two distinct mutable elements of a slice.
fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    assert_ne!(a, b, "pair_mut needs distinct indices");
    if a < b {
        let (left, right) = items.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}
