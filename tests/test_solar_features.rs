use approx::assert_abs_diff_eq;
use chrono::NaiveDate;
use ndarray::{Array2, Axis};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use terrain_features::core::Node;
use terrain_features::{
    rad_angle, solar_declination, sun_exposure, GeoTransform, Grid, Indexing, Quantity, Reproject,
    TopoError, TopoResult, Topography, TopographyParams,
};

/// Treats projected coordinates as longitude/latitude degrees and counts calls
struct PlateCarree {
    calls: Arc<AtomicUsize>,
}

impl PlateCarree {
    fn new() -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            PlateCarree {
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

impl Reproject for PlateCarree {
    fn reproject(&self, xs: &[f64], ys: &[f64], crs: &str) -> TopoResult<(Vec<f64>, Vec<f64>)> {
        assert_eq!(crs, "EPSG:4326");
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((xs.to_vec(), ys.to_vec()))
    }
}

struct Unreachable;

impl Reproject for Unreachable {
    fn reproject(&self, _: &[f64], _: &[f64], crs: &str) -> TopoResult<(Vec<f64>, Vec<f64>)> {
        Err(TopoError::Reprojection(format!("no definition for {}", crs)))
    }
}

/// One degree pixels, top-left corner at 10E 50N
fn transform() -> GeoTransform {
    GeoTransform::from_affine([1.0, 0.0, 10.0, 0.0, -1.0, 50.0])
}

fn georeferenced(indexing: Indexing) -> TopographyParams {
    TopographyParams::new(30.0)
        .with_indexing(indexing)
        .with_georeference(transform(), "EPSG:4326")
}

fn hills() -> Grid {
    Array2::from_shape_fn((6, 7), |(r, c)| {
        let (x, y) = (c as f64, r as f64);
        200.0 + 40.0 * (0.5 * x).sin() + 25.0 * (0.7 * y).cos()
    })
}

#[test]
fn test_latitude_follows_rows_in_xy_indexing() {
    let (reprojector, _) = PlateCarree::new();
    let dem = Array2::<f64>::zeros((5, 4));
    let topo = Topography::new(&dem, georeferenced(Indexing::Xy))
        .unwrap()
        .with_reprojector(reprojector);

    let lat = topo.latitude().unwrap();
    assert_eq!(lat.dim(), (5, 4));
    for ((r, _), &v) in lat.indexed_iter() {
        assert_abs_diff_eq!(v, (50.0 - r as f64).to_radians(), epsilon = 1e-12);
    }
}

#[test]
fn test_latitude_follows_columns_in_ij_indexing() {
    let (reprojector, _) = PlateCarree::new();
    let dem = Array2::<f64>::zeros((4, 5));
    let topo = Topography::new(&dem, georeferenced(Indexing::Ij))
        .unwrap()
        .with_reprojector(reprojector);

    let lat = topo.latitude().unwrap();
    for ((_, j), &v) in lat.indexed_iter() {
        assert_abs_diff_eq!(v, (50.0 - j as f64).to_radians(), epsilon = 1e-12);
    }
}

#[test]
fn test_flat_terrain_irradiation() {
    let (reprojector, _) = PlateCarree::new();
    let dem = Array2::from_elem((5, 4), 120.0);
    let topo = Topography::new(&dem, georeferenced(Indexing::Xy))
        .unwrap()
        .with_reprojector(reprojector);

    let declination = 0.2;
    let exposure = topo.sun_exposure(declination).unwrap();
    let radiation = topo.rad_angle(declination).unwrap();
    let lat = topo.latitude().unwrap();

    for ((idx, &e), &r) in exposure.indexed_iter().zip(radiation.iter()) {
        let delta = lat[idx] - declination;
        assert_abs_diff_eq!(e, delta.cos(), epsilon = 1e-12);
        assert_abs_diff_eq!(r, (1.0 - delta.sin()).sqrt(), epsilon = 1e-12);
    }
}

#[test]
fn test_irradiation_matches_scalar_formulas() {
    let (reprojector, _) = PlateCarree::new();
    let topo = Topography::new(&hills(), georeferenced(Indexing::Xy))
        .unwrap()
        .with_reprojector(reprojector);

    let declination = -0.35;
    let exposure = topo.sun_exposure(declination).unwrap();
    let radiation = topo.rad_angle(declination).unwrap();
    let grad_dir = topo.grad_dir().unwrap();
    let aspect = topo.aspect().unwrap();
    let slope = topo.slope().unwrap();
    let lat = topo.latitude().unwrap();

    for (idx, &e) in exposure.indexed_iter() {
        let expected = sun_exposure(grad_dir[idx], slope[idx], lat[idx], declination);
        assert_abs_diff_eq!(e, expected, epsilon = 1e-12);
        let expected = rad_angle(aspect[idx], slope[idx], lat[idx], declination);
        assert_abs_diff_eq!(radiation[idx], expected, epsilon = 1e-12);
    }
}

#[test]
fn test_latitude_is_reprojected_once() {
    let (reprojector, calls) = PlateCarree::new();
    let topo = Topography::new(&hills(), georeferenced(Indexing::Xy))
        .unwrap()
        .with_reprojector(reprojector);

    topo.sun_exposure(0.1).unwrap();
    topo.rad_angle(0.1).unwrap();
    topo.sun_exposure(-0.1).unwrap();
    topo.latitude().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let a = topo.sun_exposure(0.1).unwrap();
    let b = topo.sun_exposure(0.1).unwrap();
    let c = topo.sun_exposure(-0.1).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &c));
}

#[test]
fn test_calendar_date_declination() {
    let (reprojector, _) = PlateCarree::new();
    let topo = Topography::new(&hills(), georeferenced(Indexing::Xy))
        .unwrap()
        .with_reprojector(reprojector);

    let midsummer = NaiveDate::from_ymd_opt(2021, 6, 21).unwrap();
    let by_date = topo.sun_exposure_on(midsummer).unwrap();
    let by_angle = topo.sun_exposure(solar_declination(midsummer)).unwrap();
    assert!(Arc::ptr_eq(&by_date, &by_angle));

    let by_date = topo.rad_angle_on(midsummer).unwrap();
    let by_angle = topo.rad_angle(solar_declination(midsummer)).unwrap();
    assert!(Arc::ptr_eq(&by_date, &by_angle));
}

#[test]
fn test_reprojection_failure_is_not_cached() {
    let topo = Topography::new(&hills(), georeferenced(Indexing::Xy))
        .unwrap()
        .with_reprojector(Unreachable);

    assert!(matches!(topo.latitude(), Err(TopoError::Reprojection(_))));
    assert!(matches!(
        topo.sun_exposure(0.0),
        Err(TopoError::Reprojection(_))
    ));
    assert!(!topo.cache().contains(Node::Latitude));
    assert!(!topo.cache().contains(Node::SunExposure(0.0f64.to_bits())));

    // Terrain quantities computed on the way are kept
    assert!(topo.cache().contains(Node::GradDir));
}

#[test]
fn test_feature_stack_with_georeferenced_bands() {
    let (reprojector, _) = PlateCarree::new();
    let topo = Topography::new(&hills(), georeferenced(Indexing::Xy))
        .unwrap()
        .with_reprojector(reprojector);

    let stack = topo
        .feature_stack_named(&["slope", "latitude", "sun_exposure", "rad_angle"])
        .unwrap();
    assert_eq!(stack.dim(), (4, 6, 7));
    assert_eq!(stack.index_axis(Axis(0), 1), *topo.latitude().unwrap());
    assert_eq!(
        stack.index_axis(Axis(0), 2),
        *topo.compute(Quantity::SunExposure).unwrap()
    );
    assert_eq!(stack.index_axis(Axis(0), 3), *topo.rad_angle(0.0).unwrap());
}
