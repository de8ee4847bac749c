//! terrain-features: topographic descriptors from digital elevation models
//!
//! Computes per-pixel slope, curvature, aspect and irradiation proxies from
//! a regular height grid through a lazily evaluated, cached graph of
//! spatial derivatives.

pub mod types;
pub mod io;
pub mod core;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{CellSize, GeoTransform, Grid, GridStack, Indexing, TopoError, TopoResult};

pub use crate::core::{
    diff_finite, diff_gauss, rad_angle, solar_declination, sun_exposure, Differentiate,
    Differentiator, Quantity, Topography, TopographyParams,
};
pub use io::{get_latitude, get_latitude_with, GdalReprojector, Reproject};
