//! Coordinate reprojection used for per-pixel latitude

use crate::types::{Grid, TopoError, TopoResult};
use gdal::spatial_ref::{CoordTransform, SpatialRef};
use ndarray::{Array2, ArrayView2};

/// EPSG code of the geographic system latitudes are reported in (WGS 84)
pub const GEOGRAPHIC_EPSG: u32 = 4326;

/// Maps projected coordinates to geographic ones.
///
/// Implementations return `(longitude, latitude)` in degrees, one pair per
/// input coordinate, in input order.
pub trait Reproject: Send + Sync {
    fn reproject(&self, xs: &[f64], ys: &[f64], crs: &str) -> TopoResult<(Vec<f64>, Vec<f64>)>;
}

/// Reprojection through GDAL/OGR.
///
/// `crs` is anything `OSRSetFromUserInput` understands, e.g. `"EPSG:31467"`,
/// a PROJ string or WKT. Both systems use traditional GIS axis order
/// (easting/longitude first).
#[derive(Debug, Clone, Copy, Default)]
pub struct GdalReprojector;

impl GdalReprojector {
    fn spatial_ref(definition: &str) -> TopoResult<SpatialRef> {
        let srs = SpatialRef::from_definition(definition)?;
        srs.set_axis_mapping_strategy(
            gdal_sys::OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER,
        );
        Ok(srs)
    }
}

impl Reproject for GdalReprojector {
    fn reproject(&self, xs: &[f64], ys: &[f64], crs: &str) -> TopoResult<(Vec<f64>, Vec<f64>)> {
        log::debug!(
            "Reprojecting {} coordinates from {} to EPSG:{}",
            xs.len(),
            crs,
            GEOGRAPHIC_EPSG
        );

        let source = Self::spatial_ref(crs)?;
        let target = Self::spatial_ref(&format!("EPSG:{}", GEOGRAPHIC_EPSG))?;
        let transform = CoordTransform::new(&source, &target)?;

        let mut lon = xs.to_vec();
        let mut lat = ys.to_vec();
        let mut z = vec![0.0; xs.len()];
        transform.transform_coords(&mut lon, &mut lat, &mut z)?;

        Ok((lon, lat))
    }
}

/// Latitude in radians for each pair of `(xs, ys)` coordinates given in
/// `crs`, using GDAL.
pub fn get_latitude(
    xs: ArrayView2<'_, f64>,
    ys: ArrayView2<'_, f64>,
    crs: &str,
) -> TopoResult<Grid> {
    get_latitude_with(&GdalReprojector, xs, ys, crs)
}

/// Latitude in radians for each pair of `(xs, ys)` coordinates given in
/// `crs`, using the supplied reprojection service.
pub fn get_latitude_with(
    reprojector: &dyn Reproject,
    xs: ArrayView2<'_, f64>,
    ys: ArrayView2<'_, f64>,
    crs: &str,
) -> TopoResult<Grid> {
    if xs.dim() != ys.dim() {
        return Err(TopoError::ShapeMismatch(format!(
            "coordinate arrays differ in shape: {:?} vs {:?}",
            xs.dim(),
            ys.dim()
        )));
    }

    let x: Vec<f64> = xs.iter().copied().collect();
    let y: Vec<f64> = ys.iter().copied().collect();
    let (_lon, lat) = reprojector.reproject(&x, &y, crs)?;

    if lat.len() != x.len() {
        return Err(TopoError::Reprojection(format!(
            "expected {} latitudes, got {}",
            x.len(),
            lat.len()
        )));
    }

    let radians = lat.into_iter().map(f64::to_radians).collect();
    Ok(Array2::from_shape_vec(xs.raw_dim(), radians)?)
}
