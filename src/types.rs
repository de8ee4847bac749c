use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Floating point elevation grid, and every derived per-pixel field
pub type Grid = Array2<f64>;

/// Band-stacked derived fields (band x rows x cols)
pub type GridStack = Array3<f64>;

/// Physical pixel size (width along X, height along Y)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellSize {
    pub width: f64,
    pub height: f64,
}

impl CellSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Square pixels
    pub fn uniform(size: f64) -> Self {
        Self::new(size, size)
    }

    /// Same pixel with the X and Y roles exchanged
    pub fn swapped(&self) -> Self {
        Self::new(self.height, self.width)
    }

    /// Divisor that converts a pixel-unit derivative of order (dx, dy)
    /// into physical units.
    pub fn norm(&self, dx: u32, dy: u32) -> f64 {
        self.width.powi(dx as i32) * self.height.powi(dy as i32)
    }

    /// Reject sizes that would turn every normalised derivative into inf/NaN
    pub fn validate(&self) -> TopoResult<()> {
        for (name, value) in [("width", self.width), ("height", self.height)] {
            if !value.is_finite() || value == 0.0 {
                return Err(TopoError::InvalidCellSize(format!(
                    "pixel {} must be finite and non-zero, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

impl Default for CellSize {
    fn default() -> Self {
        Self::uniform(1.0)
    }
}

impl From<f64> for CellSize {
    fn from(size: f64) -> Self {
        Self::uniform(size)
    }
}

impl From<(f64, f64)> for CellSize {
    fn from((width, height): (f64, f64)) -> Self {
        Self::new(width, height)
    }
}

impl From<[f64; 2]> for CellSize {
    fn from([width, height]: [f64; 2]) -> Self {
        Self::new(width, height)
    }
}

/// A single number is broadcast to both axes, a pair is (width, height).
impl TryFrom<&[f64]> for CellSize {
    type Error = TopoError;

    fn try_from(values: &[f64]) -> TopoResult<Self> {
        match *values {
            [size] => Ok(Self::uniform(size)),
            [width, height] => Ok(Self::new(width, height)),
            _ => Err(TopoError::InvalidCellSize(format!(
                "expected a number or a (width, height) pair, got {} values: {:?}",
                values.len(),
                values
            ))),
        }
    }
}

/// Axis order of the stored DEM, same meaning as for `meshgrid`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Indexing {
    /// Rows are Y, columns are X
    #[default]
    Xy,
    /// Rows are X, columns are Y
    Ij,
}

impl fmt::Display for Indexing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Indexing::Xy => write!(f, "xy"),
            Indexing::Ij => write!(f, "ij"),
        }
    }
}

impl FromStr for Indexing {
    type Err = TopoError;

    fn from_str(s: &str) -> TopoResult<Self> {
        match s {
            "xy" => Ok(Indexing::Xy),
            "ij" => Ok(Indexing::Ij),
            other => Err(TopoError::InvalidIndexing(other.to_string())),
        }
    }
}

/// Affine mapping from pixel indices to projected coordinates (GDAL order)
///
/// ```text
/// X = top_left_x + col * pixel_width + row * rotation_x
/// Y = top_left_y + col * rotation_y  + row * pixel_height
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// From a GDAL geotransform `[c, a, b, f, d, e]`
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    /// From affine coefficients `[a, b, c, d, e, f]`, i.e.
    /// `[x_scale, x_shearing, x_translation, y_shearing, y_scale, y_translation]`
    pub fn from_affine(coeffs: [f64; 6]) -> Self {
        let [a, b, c, d, e, f] = coeffs;
        Self::from_gdal([c, a, b, f, d, e])
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// Transform for a regular, axis-aligned grid given the coordinates of
    /// its pixel centres along X and Y.
    pub fn from_pixel_centers(xs: &[f64], ys: &[f64]) -> TopoResult<Self> {
        if xs.len() < 2 || ys.len() < 2 {
            return Err(TopoError::ShapeMismatch(format!(
                "need at least two pixel centres per axis, got {} x {}",
                xs.len(),
                ys.len()
            )));
        }
        let dx = xs[1] - xs[0];
        let dy = ys[1] - ys[0];
        Ok(Self {
            top_left_x: xs[0] - dx / 2.0,
            pixel_width: dx,
            rotation_x: 0.0,
            top_left_y: ys[0] - dy / 2.0,
            rotation_y: 0.0,
            pixel_height: dy,
        })
    }

    /// Map pixel coordinates `(x, y)` = (column, row) to projected coordinates
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.top_left_x + x * self.pixel_width + y * self.rotation_x,
            self.top_left_y + x * self.rotation_y + y * self.pixel_height,
        )
    }
}

/// Error types for terrain feature computation
#[derive(Debug, thiserror::Error)]
pub enum TopoError {
    #[error("Invalid cell size: {0}")]
    InvalidCellSize(String),

    #[error("Invalid differentiator parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid indexing: {0:?} (expected \"xy\" or \"ij\")")]
    InvalidIndexing(String),

    #[error(
        "Missing georeference: the `crs` and `transform` parameters must be \
         defined when constructing the Topography to compute {0}"
    )]
    MissingGeoreference(&'static str),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Unknown quantity: {0:?}")]
    UnknownQuantity(String),

    #[error("Reprojection error: {0}")]
    Reprojection(String),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Result type for terrain feature operations
pub type TopoResult<T> = Result<T, TopoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cellsize_from_slice() {
        let one: &[f64] = &[30.0];
        assert_eq!(CellSize::try_from(one).unwrap(), CellSize::new(30.0, 30.0));

        let two: &[f64] = &[10.0, 20.0];
        assert_eq!(CellSize::try_from(two).unwrap(), CellSize::new(10.0, 20.0));

        let three: &[f64] = &[1.0, 2.0, 3.0];
        assert!(matches!(
            CellSize::try_from(three),
            Err(TopoError::InvalidCellSize(_))
        ));
    }

    #[test]
    fn test_cellsize_validate() {
        assert!(CellSize::uniform(90.0).validate().is_ok());
        assert!(CellSize::new(0.0, 1.0).validate().is_err());
        assert!(CellSize::new(1.0, f64::NAN).validate().is_err());
    }

    #[test]
    fn test_cellsize_norm() {
        let cs = CellSize::new(2.0, 3.0);
        assert_eq!(cs.norm(0, 0), 1.0);
        assert_eq!(cs.norm(1, 0), 2.0);
        assert_eq!(cs.norm(0, 2), 9.0);
        assert_eq!(cs.norm(1, 1), 6.0);
    }

    #[test]
    fn test_indexing_parse() {
        assert_eq!("xy".parse::<Indexing>().unwrap(), Indexing::Xy);
        assert_eq!("ij".parse::<Indexing>().unwrap(), Indexing::Ij);
        assert!(matches!(
            "yx".parse::<Indexing>(),
            Err(TopoError::InvalidIndexing(s)) if s == "yx"
        ));
    }

    #[test]
    fn test_geotransform_orders() {
        let affine = GeoTransform::from_affine([90.0, 0.0, 3_494_659.0, 0.0, -90.0, 5_376_052.0]);
        assert_eq!(affine.to_gdal(), [3_494_659.0, 90.0, 0.0, 5_376_052.0, 0.0, -90.0]);
        assert_eq!(affine.apply(0.0, 0.0), (3_494_659.0, 5_376_052.0));
        assert_eq!(affine.apply(2.0, 1.0), (3_494_839.0, 5_375_962.0));
    }

    #[test]
    fn test_geotransform_from_pixel_centers() {
        let gt = GeoTransform::from_pixel_centers(&[5.0, 15.0, 25.0], &[95.0, 85.0]).unwrap();
        assert_eq!(gt.top_left_x, 0.0);
        assert_eq!(gt.pixel_width, 10.0);
        assert_eq!(gt.top_left_y, 100.0);
        assert_eq!(gt.pixel_height, -10.0);
        assert!(GeoTransform::from_pixel_centers(&[1.0], &[1.0, 2.0]).is_err());
    }
}
