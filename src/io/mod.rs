//! # Input / Output
//! `Hdf5` helpers used by the checkpoint routines
#![cfg(feature = "hdf5")]
pub mod read_write_slice_hdf5;
pub use read_write_slice_hdf5::{dataset_shape, read_slice, write_slice};
