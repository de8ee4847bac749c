//! Topographic indices computed from a DEM
//!
//! [`Topography`] owns a floating point copy of the DEM and lazily derives
//! every quantity from cached partial derivatives. Each accessor returns a
//! shared handle to a grid shaped like the DEM; asking twice for the same
//! quantity hands back the same allocation.
//!
//! Axis order of the stored DEM follows `meshgrid` conventions: with
//! [`Indexing::Xy`] rows are Y and columns are X, with [`Indexing::Ij`] rows
//! are X. The public derivative orders always mean "X order, Y order".

use crate::core::cache::{DerivativeCache, Node};
use crate::core::differentiate::{Differentiate, Differentiator};
use crate::core::grid_ops::{as_float_grid, safe_divide};
use crate::core::solar::{rad_angle_array, solar_declination, sun_exposure_array};
use crate::io::reproject::{get_latitude_with, GdalReprojector, Reproject};
use crate::types::{CellSize, GeoTransform, Grid, Indexing, TopoError, TopoResult};
use chrono::NaiveDate;
use ndarray::{Array2, ArrayBase, Data, Ix2, Zip};
use num_traits::AsPrimitive;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

/// Fill value for curvatures where the slope vanishes
const SINGULARITY_FILL: f64 = 0.0;

/// Configuration of a [`Topography`] engine
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TopographyParams {
    /// Pixel (width, height) in physical units
    pub cellsize: CellSize,
    /// Axis order of the DEM array
    pub indexing: Indexing,
    /// Differentiation strategy and its parameters
    pub differentiator: Differentiator,
    /// Pixel-to-projected transform; only needed for latitude-dependent quantities
    pub transform: Option<GeoTransform>,
    /// Coordinate system of `transform`; only needed for latitude-dependent quantities
    pub crs: Option<String>,
}

impl TopographyParams {
    pub fn new(cellsize: impl Into<CellSize>) -> Self {
        Self {
            cellsize: cellsize.into(),
            ..Self::default()
        }
    }

    /// Build from loosely typed inputs: `cellsize` must hold one number or a
    /// `(width, height)` pair, `indexing` must be `"xy"` or `"ij"`.
    pub fn from_parts(cellsize: &[f64], indexing: &str) -> TopoResult<Self> {
        Ok(Self {
            cellsize: CellSize::try_from(cellsize)?,
            indexing: indexing.parse()?,
            ..Self::default()
        })
    }

    pub fn with_indexing(mut self, indexing: Indexing) -> Self {
        self.indexing = indexing;
        self
    }

    pub fn with_differentiator(mut self, differentiator: Differentiator) -> Self {
        self.differentiator = differentiator;
        self
    }

    pub fn with_georeference(mut self, transform: GeoTransform, crs: impl Into<String>) -> Self {
        self.transform = Some(transform);
        self.crs = Some(crs.into());
        self
    }

    pub fn validate(&self) -> TopoResult<()> {
        self.cellsize.validate()?;
        self.differentiator.validate()
    }
}

/// Calculates topographic indices at each pixel of a DEM.
///
/// The DEM is assumed to live on a regular rectangular grid. Computed
/// quantities are cached for reuse; drop the engine to release them.
/// The engine is meant for use from one thread at a time.
pub struct Topography {
    dem: Grid,
    params: TopographyParams,
    diff: Box<dyn Differentiate>,
    reprojector: Box<dyn Reproject>,
    cache: DerivativeCache,
}

impl fmt::Debug for Topography {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topography")
            .field("shape", &self.dem.dim())
            .field("params", &self.params)
            .field("differentiator", &self.diff.describe())
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl Topography {
    /// Create an engine using the differentiator configured in `params`.
    pub fn new<A, S>(dem: &ArrayBase<S, Ix2>, params: TopographyParams) -> TopoResult<Self>
    where
        A: AsPrimitive<f64>,
        S: Data<Elem = A>,
    {
        let diff = params.differentiator;
        Self::with_differentiator(dem, params, diff)
    }

    /// Create an engine with an injected differentiation strategy, which
    /// takes precedence over `params.differentiator`.
    pub fn with_differentiator<A, S, D>(
        dem: &ArrayBase<S, Ix2>,
        params: TopographyParams,
        diff: D,
    ) -> TopoResult<Self>
    where
        A: AsPrimitive<f64>,
        S: Data<Elem = A>,
        D: Differentiate + 'static,
    {
        params.validate()?;
        let dem = as_float_grid(dem);

        log::debug!(
            "Creating Topography for {}x{} DEM (cellsize {}x{}, indexing {}, {})",
            dem.nrows(),
            dem.ncols(),
            params.cellsize.width,
            params.cellsize.height,
            params.indexing,
            diff.describe()
        );

        Ok(Self {
            dem,
            params,
            diff: Box::new(diff),
            reprojector: Box::new(GdalReprojector),
            cache: DerivativeCache::new(),
        })
    }

    /// Replace the reprojection service used for latitudes
    pub fn with_reprojector<R: Reproject + 'static>(mut self, reprojector: R) -> Self {
        self.reprojector = Box::new(reprojector);
        self
    }

    pub fn dem(&self) -> &Grid {
        &self.dem
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dem.dim()
    }

    pub fn params(&self) -> &TopographyParams {
        &self.params
    }

    pub fn cache(&self) -> &DerivativeCache {
        &self.cache
    }

    /// Differentiate the DEM `dx` times in X direction and `dy` times in Y
    /// direction.
    pub fn diff(&self, dx: u32, dy: u32) -> TopoResult<Arc<Grid>> {
        self.cache.get_or_try_insert(Node::Diff(dx, dy), || {
            let (ax1, ax0, cellsize) = match self.params.indexing {
                Indexing::Xy => (dx, dy, self.params.cellsize),
                Indexing::Ij => (dy, dx, self.params.cellsize.swapped()),
            };
            log::debug!(
                "Computing derivative of order ({}, {}) with {}",
                dx,
                dy,
                self.diff.describe()
            );

            let result = self.diff.differentiate(self.dem.view(), cellsize, ax1, ax0)?;
            if result.dim() != self.dem.dim() {
                return Err(TopoError::ShapeMismatch(format!(
                    "differentiator returned {:?} for a {:?} DEM",
                    result.dim(),
                    self.dem.dim()
                )));
            }
            Ok(result)
        })
    }

    /// First derivative in X direction, `diff(1, 0)`
    pub fn d1x(&self) -> TopoResult<Arc<Grid>> {
        self.diff(1, 0)
    }

    /// First derivative in Y direction, `diff(0, 1)`
    pub fn d1y(&self) -> TopoResult<Arc<Grid>> {
        self.diff(0, 1)
    }

    /// Second derivative in X direction, `diff(2, 0)`
    pub fn d2x(&self) -> TopoResult<Arc<Grid>> {
        self.diff(2, 0)
    }

    /// Second derivative in Y direction, `diff(0, 2)`
    pub fn d2y(&self) -> TopoResult<Arc<Grid>> {
        self.diff(0, 2)
    }

    /// Square of the X slope
    pub fn dx2(&self) -> TopoResult<Arc<Grid>> {
        self.cache
            .get_or_try_insert(Node::SquaredSlopeX, || Ok(self.d1x()?.mapv(|v| v * v)))
    }

    /// Square of the Y slope
    pub fn dy2(&self) -> TopoResult<Arc<Grid>> {
        self.cache
            .get_or_try_insert(Node::SquaredSlopeY, || Ok(self.d1y()?.mapv(|v| v * v)))
    }

    /// `diff(1, 1) * D1x * D1y`
    fn cross_term(&self) -> TopoResult<Arc<Grid>> {
        self.cache.get_or_try_insert(Node::CrossTerm, || {
            let dxy = self.diff(1, 1)?;
            let d1x = self.d1x()?;
            let d1y = self.d1y()?;
            Ok(Zip::from(&*dxy)
                .and(&*d1x)
                .and(&*d1y)
                .map_collect(|&xy, &x, &y| xy * x * y))
        })
    }

    /// Squared total slope, `D1x^2 + D1y^2`
    fn p(&self) -> TopoResult<Arc<Grid>> {
        self.cache.get_or_try_insert(Node::SquaredSlope, || {
            Ok(&*self.dx2()? + &*self.dy2()?)
        })
    }

    /// `D1x^2 + D1y^2 + 1`
    fn q(&self) -> TopoResult<Arc<Grid>> {
        self.cache
            .get_or_try_insert(Node::SquaredSlopePlusOne, || Ok(self.p()?.mapv(|v| v + 1.0)))
    }

    /// Slope in X direction, same as [`Topography::d1x`]
    pub fn slope_x(&self) -> TopoResult<Arc<Grid>> {
        self.d1x()
    }

    /// Slope in Y direction, same as [`Topography::d1y`]
    pub fn slope_y(&self) -> TopoResult<Arc<Grid>> {
        self.d1y()
    }

    /// Magnitude of the gradient, `sqrt(D1x^2 + D1y^2)`
    pub fn slope(&self) -> TopoResult<Arc<Grid>> {
        self.cache
            .get_or_try_insert(Node::Slope, || Ok(self.p()?.mapv(f64::sqrt)))
    }

    /// Curvature in X direction, same as [`Topography::d2x`]
    pub fn curvature_x(&self) -> TopoResult<Arc<Grid>> {
        self.d2x()
    }

    /// Curvature in Y direction, same as [`Topography::d2y`]
    pub fn curvature_y(&self) -> TopoResult<Arc<Grid>> {
        self.d2y()
    }

    /// `sqrt(D2x^2 + D2y^2)`
    pub fn curvature(&self) -> TopoResult<Arc<Grid>> {
        self.cache.get_or_try_insert(Node::Curvature, || {
            let d2x = self.d2x()?;
            let d2y = self.d2y()?;
            Ok(Zip::from(&*d2x)
                .and(&*d2y)
                .map_collect(|&x, &y| (x * x + y * y).sqrt()))
        })
    }

    /// `D2x * D1y^2 + D1x^2 * D2y - 2 * D1xy * D1x * D1y`
    fn plan_numerator(&self) -> TopoResult<Grid> {
        let d2x = self.d2x()?;
        let d2y = self.d2y()?;
        let dx2 = self.dx2()?;
        let dy2 = self.dy2()?;
        let cross = self.cross_term()?;
        Ok(Zip::from(&*d2x)
            .and(&*dy2)
            .and(&*dx2)
            .and(&*d2y)
            .and(&*cross)
            .map_collect(|&d2x, &dy2, &dx2, &d2y, &cross| {
                d2x * dy2 + dx2 * d2y - 2.0 * cross
            }))
    }

    /// Curvature of the terrain surface in the horizontal plane.
    ///
    /// See Map Use: Reading, Analysis, Interpretation, 7th ed., p. 360.
    /// Flat pixels are assigned zero.
    pub fn plan_curvature(&self) -> TopoResult<Arc<Grid>> {
        self.cache.get_or_try_insert(Node::PlanCurvature, || {
            let numerator = self.plan_numerator()?;
            let denominator = self.p()?.mapv(|p| p.powf(1.5));
            Ok(safe_divide(&numerator, &denominator, SINGULARITY_FILL))
        })
    }

    /// Curvature of a terrain cross-section on the vertical plane
    /// perpendicular to the gradient direction. Flat pixels are assigned zero.
    pub fn tang_curvature(&self) -> TopoResult<Arc<Grid>> {
        self.cache.get_or_try_insert(Node::TangCurvature, || {
            let numerator = self.plan_numerator()?;
            let p = self.p()?;
            let q = self.q()?;
            let denominator = Zip::from(&*q)
                .and(&*p)
                .map_collect(|&q, &p| q.sqrt() * p);
            Ok(safe_divide(&numerator, &denominator, SINGULARITY_FILL))
        })
    }

    /// Curvature of a terrain cross-section on the vertical plane containing
    /// the gradient vector. Flat pixels are assigned zero.
    pub fn prof_curvature(&self) -> TopoResult<Arc<Grid>> {
        self.cache.get_or_try_insert(Node::ProfCurvature, || {
            let d2x = self.d2x()?;
            let d2y = self.d2y()?;
            let dx2 = self.dx2()?;
            let dy2 = self.dy2()?;
            let cross = self.cross_term()?;
            let numerator = Zip::from(&*d2x)
                .and(&*dx2)
                .and(&*dy2)
                .and(&*d2y)
                .and(&*cross)
                .map_collect(|&d2x, &dx2, &dy2, &d2y, &cross| {
                    d2x * dx2 + dy2 * d2y + 2.0 * cross
                });

            let p = self.p()?;
            let q = self.q()?;
            let denominator = Zip::from(&*q)
                .and(&*p)
                .map_collect(|&q, &p| q.powf(1.5) * p);
            Ok(safe_divide(&numerator, &denominator, SINGULARITY_FILL))
        })
    }

    /// Gradient direction counted counter-clockwise from east
    pub fn grad_dir(&self) -> TopoResult<Arc<Grid>> {
        self.cache.get_or_try_insert(Node::GradDir, || {
            let d1x = self.d1x()?;
            let d1y = self.d1y()?;
            Ok(Zip::from(&*d1y).and(&*d1x).map_collect(|&y, &x| y.atan2(x)))
        })
    }

    /// Gradient direction counted clockwise from north
    pub fn aspect(&self) -> TopoResult<Arc<Grid>> {
        self.cache.get_or_try_insert(Node::Aspect, || {
            Ok(self.grad_dir()?.mapv(|g| 3.0 * PI / 2.0 - g))
        })
    }

    /// Projection of the unit gradient direction on the north axis
    pub fn northness(&self) -> TopoResult<Arc<Grid>> {
        self.cache
            .get_or_try_insert(Node::Northness, || Ok(self.grad_dir()?.mapv(f64::sin)))
    }

    /// Projection of the unit gradient direction on the east axis, negated
    pub fn eastness(&self) -> TopoResult<Arc<Grid>> {
        self.cache
            .get_or_try_insert(Node::Eastness, || Ok(self.grad_dir()?.mapv(|g| -g.cos())))
    }

    /// Angle between the horizontal plane and the surface, non-negative
    pub fn slope_angle(&self) -> TopoResult<Arc<Grid>> {
        self.cache
            .get_or_try_insert(Node::SlopeAngle, || Ok(self.slope()?.mapv(f64::atan)))
    }

    /// Angle between the X axis and the surface in the XZ plane
    pub fn slope_angle_x(&self) -> TopoResult<Arc<Grid>> {
        self.cache
            .get_or_try_insert(Node::SlopeAngleX, || Ok(self.slope_x()?.mapv(f64::atan)))
    }

    /// Angle between the Y axis and the surface in the YZ plane
    pub fn slope_angle_y(&self) -> TopoResult<Arc<Grid>> {
        self.cache
            .get_or_try_insert(Node::SlopeAngleY, || Ok(self.slope_y()?.mapv(f64::atan)))
    }

    /// Sine of the slope angle
    pub fn verticality(&self) -> TopoResult<Arc<Grid>> {
        self.cache
            .get_or_try_insert(Node::Verticality, || Ok(self.slope_angle()?.mapv(f64::sin)))
    }

    pub fn verticality_x(&self) -> TopoResult<Arc<Grid>> {
        self.cache.get_or_try_insert(Node::VerticalityX, || {
            Ok(self.slope_angle_x()?.mapv(f64::sin))
        })
    }

    pub fn verticality_y(&self) -> TopoResult<Arc<Grid>> {
        self.cache.get_or_try_insert(Node::VerticalityY, || {
            Ok(self.slope_angle_y()?.mapv(f64::sin))
        })
    }

    /// Latitude in radians at each pixel.
    ///
    /// Requires both `transform` and `crs` in the engine parameters.
    pub fn latitude(&self) -> TopoResult<Arc<Grid>> {
        let (transform, crs) = self.georeference("latitude")?;
        self.cache.get_or_try_insert(Node::Latitude, || {
            let (xs, ys) = self.projected_coordinates(&transform);
            get_latitude_with(self.reprojector.as_ref(), xs.view(), ys.view(), crs)
        })
    }

    /// Cosine of the angle between surface normal and the sun at midday.
    ///
    /// `declination` is the sun declination in radians; positive values are
    /// a northward deviation, zero puts the sun in the zenith over the
    /// equator. Requires `transform` and `crs`.
    pub fn sun_exposure(&self, declination: f64) -> TopoResult<Arc<Grid>> {
        self.georeference("sun_exposure")?;
        self.cache
            .get_or_try_insert(Node::SunExposure(declination.to_bits()), || {
                let grad_dir = self.grad_dir()?;
                let slope = self.slope()?;
                let latitude = self.latitude()?;
                sun_exposure_array(grad_dir.view(), slope.view(), latitude.view(), declination)
            })
    }

    /// Cosine of the radiation angle after Herbst et al. (2006).
    ///
    /// Requires `transform` and `crs`.
    pub fn rad_angle(&self, declination: f64) -> TopoResult<Arc<Grid>> {
        self.georeference("rad_angle")?;
        self.cache
            .get_or_try_insert(Node::RadAngle(declination.to_bits()), || {
                let aspect = self.aspect()?;
                let slope = self.slope()?;
                let latitude = self.latitude()?;
                rad_angle_array(aspect.view(), slope.view(), latitude.view(), declination)
            })
    }

    /// [`Topography::sun_exposure`] with the declination of a calendar date
    pub fn sun_exposure_on(&self, date: NaiveDate) -> TopoResult<Arc<Grid>> {
        self.sun_exposure(solar_declination(date))
    }

    /// [`Topography::rad_angle`] with the declination of a calendar date
    pub fn rad_angle_on(&self, date: NaiveDate) -> TopoResult<Arc<Grid>> {
        self.rad_angle(solar_declination(date))
    }

    fn georeference(&self, quantity: &'static str) -> TopoResult<(GeoTransform, &str)> {
        match (self.params.transform, self.params.crs.as_deref()) {
            (Some(transform), Some(crs)) => Ok((transform, crs)),
            _ => Err(TopoError::MissingGeoreference(quantity)),
        }
    }

    /// Projected X and Y coordinates of every pixel index
    fn projected_coordinates(&self, transform: &GeoTransform) -> (Grid, Grid) {
        let indexing = self.params.indexing;
        let coords = Array2::from_shape_fn(self.dem.raw_dim(), |(i, j)| {
            let (px, py) = match indexing {
                Indexing::Xy => (j, i),
                Indexing::Ij => (i, j),
            };
            transform.apply(px as f64, py as f64)
        });
        (coords.mapv(|(x, _)| x), coords.mapv(|(_, y)| y))
    }
}
