//! Core terrain feature computation

pub mod cache;
pub mod differentiate;
pub mod features;
pub mod grid_ops;
pub mod solar;
pub mod topography;

// Re-export main types
pub use cache::{DerivativeCache, Node};
pub use differentiate::{diff_finite, diff_gauss, Differentiate, Differentiator};
pub use features::Quantity;
pub use grid_ops::{as_float_grid, safe_divide};
pub use solar::{rad_angle, rad_angle_array, solar_declination, sun_exposure, sun_exposure_array};
pub use topography::{Topography, TopographyParams};
