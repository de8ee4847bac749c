//! Python bindings (cargo feature `python`)

use crate::core::{Differentiator, Quantity, Topography, TopographyParams};
use crate::types::{CellSize, GeoTransform, TopoError};
use numpy::{PyArray2, PyReadonlyArray2, ToPyArray};
use pyo3::exceptions::{PyRuntimeError, PyTypeError, PyValueError};
use pyo3::prelude::*;

impl From<TopoError> for PyErr {
    fn from(err: TopoError) -> PyErr {
        match err {
            TopoError::InvalidCellSize(_) => PyTypeError::new_err(err.to_string()),
            TopoError::InvalidParameter(_)
            | TopoError::InvalidIndexing(_)
            | TopoError::MissingGeoreference(_)
            | TopoError::ShapeMismatch(_)
            | TopoError::UnknownQuantity(_) => PyValueError::new_err(err.to_string()),
            _ => PyRuntimeError::new_err(err.to_string()),
        }
    }
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyTopography>()?;
    m.add_function(wrap_pyfunction!(sun_exposure, m)?)?;
    m.add_function(wrap_pyfunction!(rad_angle, m)?)?;
    Ok(())
}

fn extract_cellsize(cellsize: &PyAny) -> PyResult<CellSize> {
    let values: Vec<f64> = match cellsize.extract::<f64>() {
        Ok(size) => vec![size],
        Err(_) => cellsize.extract().map_err(|_| {
            PyTypeError::new_err(format!(
                "Expected a number or a pair for `cellsize`, but received {}",
                cellsize
            ))
        })?,
    };
    Ok(CellSize::try_from(values.as_slice())?)
}

/// Python wrapper for Topography
#[pyclass(name = "Topography")]
struct PyTopography {
    inner: Topography,
}

impl PyTopography {
    fn quantity<'py>(&self, py: Python<'py>, quantity: Quantity) -> PyResult<&'py PyArray2<f64>> {
        Ok(self.inner.compute(quantity)?.to_pyarray(py))
    }
}

#[pymethods]
impl PyTopography {
    #[new]
    #[pyo3(signature = (dem, cellsize, diff = "finite", indexing = "xy", transform = None, crs = None, sigma = 1.0))]
    fn new(
        dem: PyReadonlyArray2<f64>,
        cellsize: &PyAny,
        diff: &str,
        indexing: &str,
        transform: Option<Vec<f64>>,
        crs: Option<String>,
        sigma: f64,
    ) -> PyResult<Self> {
        let differentiator = match diff {
            "finite" => Differentiator::Finite,
            "gauss" => Differentiator::gauss(sigma),
            other => {
                return Err(PyValueError::new_err(format!(
                    "Invalid differentiator: {} (expected 'finite' or 'gauss')",
                    other
                )))
            }
        };

        let transform = match transform.as_deref() {
            None => None,
            Some(&[a, b, c, d, e, f]) => Some(GeoTransform::from_affine([a, b, c, d, e, f])),
            Some(other) => {
                return Err(PyValueError::new_err(format!(
                    "`transform` needs 6 coefficients, got {}",
                    other.len()
                )))
            }
        };

        let params = TopographyParams {
            cellsize: extract_cellsize(cellsize)?,
            indexing: indexing.parse()?,
            differentiator,
            transform,
            crs,
        };

        let inner = Topography::new(&dem.as_array(), params)?;
        Ok(PyTopography { inner })
    }

    fn diff<'py>(&self, py: Python<'py>, dx: u32, dy: u32) -> PyResult<&'py PyArray2<f64>> {
        Ok(self.inner.diff(dx, dy)?.to_pyarray(py))
    }

    /// Evaluate a quantity by name, e.g. "plan_curvature"
    fn compute<'py>(&self, py: Python<'py>, name: &str) -> PyResult<&'py PyArray2<f64>> {
        self.quantity(py, name.parse()?)
    }

    fn slope_x<'py>(&self, py: Python<'py>) -> PyResult<&'py PyArray2<f64>> {
        self.quantity(py, Quantity::SlopeX)
    }

    fn slope_y<'py>(&self, py: Python<'py>) -> PyResult<&'py PyArray2<f64>> {
        self.quantity(py, Quantity::SlopeY)
    }

    fn slope<'py>(&self, py: Python<'py>) -> PyResult<&'py PyArray2<f64>> {
        self.quantity(py, Quantity::Slope)
    }

    fn curvature<'py>(&self, py: Python<'py>) -> PyResult<&'py PyArray2<f64>> {
        self.quantity(py, Quantity::Curvature)
    }

    fn plan_curvature<'py>(&self, py: Python<'py>) -> PyResult<&'py PyArray2<f64>> {
        self.quantity(py, Quantity::PlanCurvature)
    }

    fn tang_curvature<'py>(&self, py: Python<'py>) -> PyResult<&'py PyArray2<f64>> {
        self.quantity(py, Quantity::TangCurvature)
    }

    fn prof_curvature<'py>(&self, py: Python<'py>) -> PyResult<&'py PyArray2<f64>> {
        self.quantity(py, Quantity::ProfCurvature)
    }

    fn aspect<'py>(&self, py: Python<'py>) -> PyResult<&'py PyArray2<f64>> {
        self.quantity(py, Quantity::Aspect)
    }

    fn northness<'py>(&self, py: Python<'py>) -> PyResult<&'py PyArray2<f64>> {
        self.quantity(py, Quantity::Northness)
    }

    fn eastness<'py>(&self, py: Python<'py>) -> PyResult<&'py PyArray2<f64>> {
        self.quantity(py, Quantity::Eastness)
    }

    fn latitude<'py>(&self, py: Python<'py>) -> PyResult<&'py PyArray2<f64>> {
        self.quantity(py, Quantity::Latitude)
    }

    #[pyo3(signature = (declination = 0.0))]
    fn sun_exposure<'py>(&self, py: Python<'py>, declination: f64) -> PyResult<&'py PyArray2<f64>> {
        Ok(self.inner.sun_exposure(declination)?.to_pyarray(py))
    }

    #[pyo3(signature = (declination = 0.0))]
    fn rad_angle<'py>(&self, py: Python<'py>, declination: f64) -> PyResult<&'py PyArray2<f64>> {
        Ok(self.inner.rad_angle(declination)?.to_pyarray(py))
    }

    fn __repr__(&self) -> String {
        let (rows, cols) = self.inner.dim();
        format!(
            "Topography(shape=({}, {}), indexing='{}', diff='{}')",
            rows,
            cols,
            self.inner.params().indexing,
            self.inner.params().differentiator
        )
    }
}

/// Cosine of the angle between surface normal and the midday sun
#[pyfunction]
#[pyo3(signature = (grad_dir, slope, latitude, declination = 0.0))]
fn sun_exposure<'py>(
    py: Python<'py>,
    grad_dir: PyReadonlyArray2<f64>,
    slope: PyReadonlyArray2<f64>,
    latitude: PyReadonlyArray2<f64>,
    declination: f64,
) -> PyResult<&'py PyArray2<f64>> {
    let result = crate::core::sun_exposure_array(
        grad_dir.as_array(),
        slope.as_array(),
        latitude.as_array(),
        declination,
    )?;
    Ok(result.to_pyarray(py))
}

/// Cosine of the radiation angle after Herbst et al. (2006)
#[pyfunction]
#[pyo3(signature = (aspect, slope, latitude, declination = 0.0))]
fn rad_angle<'py>(
    py: Python<'py>,
    aspect: PyReadonlyArray2<f64>,
    slope: PyReadonlyArray2<f64>,
    latitude: PyReadonlyArray2<f64>,
    declination: f64,
) -> PyResult<&'py PyArray2<f64>> {
    let result = crate::core::rad_angle_array(
        aspect.as_array(),
        slope.as_array(),
        latitude.as_array(),
        declination,
    )?;
    Ok(result.to_pyarray(py))
}
