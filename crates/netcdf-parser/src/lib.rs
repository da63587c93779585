//! NetCDF reading for WRF model output.
//!
//! This crate provides a [`sequence_loader::VariableExtractor`] that reads
//! variables straight from `wrfout` NetCDF files, as an alternative to
//! pre-extracted `.npy` stacks.
//!
//! # Features
//!
//! - `native`: enables [`WrfNetCdfExtractor`] via the `netcdf` crate.
//!   Requires `libnetcdf` and `libhdf5` on the system.
//!
//! The wind rotation in [`wind`] is pure and always available.
//!
//! # WRF wind components
//!
//! `U10`/`V10` are written relative to the model grid. They are rotated to
//! earth-relative axes with the per-cell `COSALPHA`/`SINALPHA` fields
//! whenever both components are requested together.

pub mod error;
#[cfg(feature = "native")]
pub mod native;
pub mod wind;

pub use error::{NetCdfError, NetCdfResult};
#[cfg(feature = "native")]
pub use native::{silence_hdf5_errors, WrfNetCdfExtractor};
pub use wind::{paired_channels, rotate_fields, rotate_to_earth, wind_pair, WindPair};
