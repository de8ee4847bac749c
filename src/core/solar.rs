//! Closed-form irradiation proxies
//!
//! All angles are in radians. The array forms broadcast `slope` and
//! `latitude` against the shape of the first argument, so a single latitude
//! can be passed as a 0-d array (`ndarray::arr0(lat).view()`).

use crate::types::{TopoError, TopoResult};
use chrono::{Datelike, NaiveDate};
use ndarray::{Array, ArrayView, Dimension, Zip};
use std::f64::consts::PI;

/// Cosine of the angle between the surface normal and the sun at midday.
///
/// * `grad_dir` - gradient direction, counter-clockwise from east
/// * `slope` - inclination of the gradient
/// * `latitude` - latitude of the point
/// * `declination` - sun declination; positive is a northward deviation,
///   zero puts the sun in the zenith over the equator
pub fn sun_exposure(grad_dir: f64, slope: f64, latitude: f64, declination: f64) -> f64 {
    let delta = latitude - declination;
    let sun = [0.0, -delta.sin(), delta.cos()];
    let normal = [
        -grad_dir.cos() * slope.sin(),
        -grad_dir.sin() * slope.sin(),
        slope.cos(),
    ];
    sun.iter().zip(normal.iter()).map(|(s, n)| s * n).sum()
}

/// Cosine of the "radiation angle" after Herbst et al. (2006).
///
/// * `aspect` - gradient direction, clockwise from north
/// * `slope` - inclination of the gradient
/// * `latitude` - latitude of the point
/// * `declination` - sun declination
///
/// Herbst et al. attribute the formula to Moore, Burch & Mackenzie (1988),
/// which does not derive it; it is reproduced here as published.
pub fn rad_angle(aspect: f64, slope: f64, latitude: f64, declination: f64) -> f64 {
    let delta = latitude - declination;
    let (sin_s, cos_s) = slope.sin_cos();
    let cos_a = aspect.cos();
    let b = 1.0 + sin_s.powi(2) * cos_a.powi(2);
    let c = 2.0 * sin_s * cos_s * cos_a * delta.sin();
    let d = cos_s.powi(2) * delta.sin() - 1.0;
    (-c + (c * c - 4.0 * b * d).sqrt()) / (2.0 * b)
}

/// Elementwise [`sun_exposure`] over arrays.
pub fn sun_exposure_array<D, E, F>(
    grad_dir: ArrayView<'_, f64, D>,
    slope: ArrayView<'_, f64, E>,
    latitude: ArrayView<'_, f64, F>,
    declination: f64,
) -> TopoResult<Array<f64, D>>
where
    D: Dimension,
    E: Dimension,
    F: Dimension,
{
    let dim = grad_dir.raw_dim();
    let slope = broadcast_to(&slope, &dim, "slope")?;
    let latitude = broadcast_to(&latitude, &dim, "latitude")?;
    Ok(Zip::from(&grad_dir)
        .and(&slope)
        .and(&latitude)
        .map_collect(|&g, &s, &lat| sun_exposure(g, s, lat, declination)))
}

/// Elementwise [`rad_angle`] over arrays.
pub fn rad_angle_array<D, E, F>(
    aspect: ArrayView<'_, f64, D>,
    slope: ArrayView<'_, f64, E>,
    latitude: ArrayView<'_, f64, F>,
    declination: f64,
) -> TopoResult<Array<f64, D>>
where
    D: Dimension,
    E: Dimension,
    F: Dimension,
{
    let dim = aspect.raw_dim();
    let slope = broadcast_to(&slope, &dim, "slope")?;
    let latitude = broadcast_to(&latitude, &dim, "latitude")?;
    Ok(Zip::from(&aspect)
        .and(&slope)
        .and(&latitude)
        .map_collect(|&a, &s, &lat| rad_angle(a, s, lat, declination)))
}

/// Solar declination in radians for a calendar date (Spencer 1971).
pub fn solar_declination(date: NaiveDate) -> f64 {
    let gamma = 2.0 * PI * (date.ordinal() as f64 - 1.0) / 365.0;
    0.006918 - 0.399912 * gamma.cos() + 0.070257 * gamma.sin()
        - 0.006758 * (2.0 * gamma).cos()
        + 0.000907 * (2.0 * gamma).sin()
        - 0.002697 * (3.0 * gamma).cos()
        + 0.00148 * (3.0 * gamma).sin()
}

fn broadcast_to<'a, E, D>(
    view: &'a ArrayView<'_, f64, E>,
    dim: &D,
    name: &str,
) -> TopoResult<ArrayView<'a, f64, D>>
where
    E: Dimension,
    D: Dimension,
{
    view.broadcast(dim.clone()).ok_or_else(|| {
        TopoError::ShapeMismatch(format!(
            "{} of shape {:?} does not broadcast to {:?}",
            name,
            view.shape(),
            dim.slice()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr0, Array2};
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_sun_exposure_flat() {
        // A flat surface sees the sun at its zenith distance
        assert_abs_diff_eq!(sun_exposure(0.3, 0.0, 0.0, 0.0), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(sun_exposure(1.0, 0.0, 0.8, 0.0), 0.8f64.cos(), epsilon = 1e-12);
    }

    #[test]
    fn test_sun_exposure_facing_the_sun() {
        // Uphill towards north means facing south; tilted by the latitude it
        // faces the midday sun head-on.
        assert_abs_diff_eq!(sun_exposure(FRAC_PI_2, 0.5, 0.5, 0.0), 1.0, epsilon = 1e-12);
        // Facing away loses twice the tilt
        assert_abs_diff_eq!(
            sun_exposure(-FRAC_PI_2, 0.5, 0.5, 0.0),
            1.0f64.cos(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_declination_shifts_latitude() {
        let a = sun_exposure(0.7, 0.2, 0.9, 0.3);
        let b = sun_exposure(0.7, 0.2, 0.6, 0.0);
        assert_abs_diff_eq!(a, b, epsilon = 1e-12);

        let a = rad_angle(0.7, 0.2, 0.9, 0.3);
        let b = rad_angle(0.7, 0.2, 0.6, 0.0);
        assert_abs_diff_eq!(a, b, epsilon = 1e-12);
    }

    #[test]
    fn test_rad_angle_flat() {
        assert_abs_diff_eq!(rad_angle(1.2, 0.0, 0.0, 0.0), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(
            rad_angle(0.0, 0.0, PI / 6.0, 0.0),
            0.5f64.sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_array_forms_broadcast_scalar_latitude() {
        let grad_dir = Array2::from_shape_fn((3, 4), |(r, c)| 0.1 * (r * 4 + c) as f64);
        let slope = Array2::from_elem((3, 4), 0.25);
        let latitude = arr0(0.4);

        let exposure =
            sun_exposure_array(grad_dir.view(), slope.view(), latitude.view(), 0.1).unwrap();
        let radiation =
            rad_angle_array(grad_dir.view(), slope.view(), latitude.view(), 0.1).unwrap();
        assert_eq!(exposure.dim(), (3, 4));
        for ((idx, &g), (&e, &r)) in grad_dir
            .indexed_iter()
            .zip(exposure.iter().zip(radiation.iter()))
        {
            assert_abs_diff_eq!(e, sun_exposure(g, 0.25, 0.4, 0.1), epsilon = 1e-15);
            assert_abs_diff_eq!(r, rad_angle(g, 0.25, 0.4, 0.1), epsilon = 1e-15);
            assert_eq!(e, exposure[idx]);
        }
    }

    #[test]
    fn test_array_shape_mismatch() {
        let grad_dir = Array2::<f64>::zeros((3, 4));
        let slope = Array2::<f64>::zeros((4, 3));
        let latitude = arr0(0.0);
        assert!(matches!(
            sun_exposure_array(grad_dir.view(), slope.view(), latitude.view(), 0.0),
            Err(TopoError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_solar_declination() {
        let june = NaiveDate::from_ymd_opt(2023, 6, 21).unwrap();
        let december = NaiveDate::from_ymd_opt(2023, 12, 21).unwrap();
        let march = NaiveDate::from_ymd_opt(2023, 3, 20).unwrap();
        assert_abs_diff_eq!(solar_declination(june), 23.44f64.to_radians(), epsilon = 5e-3);
        assert_abs_diff_eq!(solar_declination(december), -23.44f64.to_radians(), epsilon = 5e-3);
        assert_abs_diff_eq!(solar_declination(march), 0.0, epsilon = 1e-2);
    }
}
