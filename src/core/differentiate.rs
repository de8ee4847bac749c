//! Spatial differentiation strategies for regular height grids
//!
//! Both built-in strategies are separable: a 1-D kernel of the requested
//! X order is correlated along the columns axis (axis 1), then a kernel of
//! the requested Y order along the rows axis (axis 0). Samples outside the
//! grid take the value of the nearest edge pixel. The result is divided by
//! `width^dx * height^dy` so derivatives come out in physical units.

use crate::types::{CellSize, Grid, TopoError, TopoResult};
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Gaussian kernels extend to `truncate * sigma` pixels on each side
const GAUSS_TRUNCATE: f64 = 4.0;

/// Largest accepted Gaussian `sigma`, in pixels
pub const MAX_GAUSS_SIGMA: f64 = 1.0e6;

/// A spatial differentiation strategy.
///
/// `grid` is the stored DEM; `dx` is the derivative order along axis 1 and
/// `dy` along axis 0, `cellsize` gives the pixel extent along those axes.
/// Implementations must return an array of the same shape as `grid`.
pub trait Differentiate: Send + Sync {
    fn differentiate(
        &self,
        grid: ArrayView2<'_, f64>,
        cellsize: CellSize,
        dx: u32,
        dy: u32,
    ) -> TopoResult<Grid>;

    /// Short description used in log output
    fn describe(&self) -> String {
        "custom differentiator".to_string()
    }
}

impl<F> Differentiate for F
where
    F: Fn(ArrayView2<'_, f64>, CellSize, u32, u32) -> TopoResult<Grid> + Send + Sync,
{
    fn differentiate(
        &self,
        grid: ArrayView2<'_, f64>,
        cellsize: CellSize,
        dx: u32,
        dy: u32,
    ) -> TopoResult<Grid> {
        self(grid, cellsize, dx, dy)
    }
}

/// Built-in differentiation strategies
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum Differentiator {
    /// Central finite differences of minimal odd window
    #[default]
    Finite,
    /// Gaussian derivative filter; `sigma` is in pixels
    Gauss { sigma: f64 },
}

impl Differentiator {
    pub fn gauss(sigma: f64) -> Self {
        Differentiator::Gauss { sigma }
    }

    pub fn validate(&self) -> TopoResult<()> {
        match *self {
            Differentiator::Finite => Ok(()),
            Differentiator::Gauss { sigma } => {
                if sigma.is_finite() && sigma > 0.0 && sigma <= MAX_GAUSS_SIGMA {
                    Ok(())
                } else {
                    Err(TopoError::InvalidParameter(format!(
                        "sigma must be a positive number of pixels up to {}, got {}",
                        MAX_GAUSS_SIGMA, sigma
                    )))
                }
            }
        }
    }
}

impl fmt::Display for Differentiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Differentiator::Finite => write!(f, "finite differences"),
            Differentiator::Gauss { sigma } => write!(f, "gaussian derivative (sigma={})", sigma),
        }
    }
}

impl Differentiate for Differentiator {
    fn differentiate(
        &self,
        grid: ArrayView2<'_, f64>,
        cellsize: CellSize,
        dx: u32,
        dy: u32,
    ) -> TopoResult<Grid> {
        match *self {
            Differentiator::Finite => diff_finite(grid, cellsize, dx, dy),
            Differentiator::Gauss { sigma } => diff_gauss(grid, cellsize, dx, dy, sigma),
        }
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

/// Derivative of order `(dx, dy)` by successive central differencing in X
/// and then Y.
pub fn diff_finite(
    grid: ArrayView2<'_, f64>,
    cellsize: CellSize,
    dx: u32,
    dy: u32,
) -> TopoResult<Grid> {
    let wx = central_diff_weights(finite_window(dx), dx as usize)?;
    let wy = central_diff_weights(finite_window(dy), dy as usize)?;
    let image = correlate1d(grid, &wx, Axis(1));
    let image = correlate1d(image.view(), &wy, Axis(0));
    Ok(image / cellsize.norm(dx, dy))
}

/// Gaussian derivative filter of order `(dx, dy)`.
///
/// Equivalent to smoothing the grid with a Gaussian of standard deviation
/// `sigma` pixels and then differentiating. Kernels wider than the grid are
/// folded onto its extent.
pub fn diff_gauss(
    grid: ArrayView2<'_, f64>,
    cellsize: CellSize,
    dx: u32,
    dy: u32,
    sigma: f64,
) -> TopoResult<Grid> {
    Differentiator::gauss(sigma).validate()?;
    let (rows, cols) = grid.dim();
    let kx = folded_gaussian_kernel(sigma, dx as usize, cols.saturating_sub(1));
    let ky = folded_gaussian_kernel(sigma, dy as usize, rows.saturating_sub(1));
    let image = correlate1d(grid, &kx, Axis(1));
    let image = correlate1d(image.view(), &ky, Axis(0));
    Ok(image / cellsize.norm(dx, dy))
}

/// Window length used for a finite-difference derivative of `order`:
/// the smallest odd number of points giving at least second order accuracy.
pub fn finite_window(order: u32) -> usize {
    (order + 1 + order % 2) as usize
}

/// Central-difference weights for the `order`-th derivative on `points`
/// equally spaced samples centred on zero (Fornberg's algorithm).
///
/// Weight `k` multiplies the sample at offset `k - points / 2`.
pub fn central_diff_weights(points: usize, order: usize) -> TopoResult<Vec<f64>> {
    if points < order + 1 {
        return Err(TopoError::InvalidParameter(format!(
            "{} points are not enough for a derivative of order {}",
            points, order
        )));
    }
    if points % 2 == 0 {
        return Err(TopoError::InvalidParameter(format!(
            "central differences need an odd number of points, got {}",
            points
        )));
    }

    let half = (points / 2) as f64;
    let nodes: Vec<f64> = (0..points).map(|i| i as f64 - half).collect();

    // c[j][k]: weight of node j for the k-th derivative at 0
    let mut c = vec![vec![0.0; order + 1]; points];
    c[0][0] = 1.0;
    let mut c1 = 1.0;
    let mut c4 = nodes[0];

    for i in 1..points {
        let mn = i.min(order);
        let mut c2 = 1.0;
        let c5 = c4;
        c4 = nodes[i];

        for j in 0..i {
            let c3 = nodes[i] - nodes[j];
            c2 *= c3;
            if j == i - 1 {
                for k in (1..=mn).rev() {
                    c[i][k] = c1 * (k as f64 * c[i - 1][k - 1] - c5 * c[i - 1][k]) / c2;
                }
                c[i][0] = -c1 * c5 * c[i - 1][0] / c2;
            }
            for k in (1..=mn).rev() {
                c[j][k] = (c4 * c[j][k] - k as f64 * c[j][k - 1]) / c3;
            }
            c[j][0] = c4 * c[j][0] / c3;
        }
        c1 = c2;
    }

    Ok(c.into_iter().map(|row| row[order]).collect())
}

/// Correlation kernel for the `order`-th derivative of a sampled Gaussian.
///
/// The kernel has `2 * radius + 1` taps with `radius = round(4 * sigma)`;
/// the order-0 kernel sums to one and even-order kernels sum to zero.
/// Tap `k` multiplies the sample at offset `k - radius`.
pub fn gaussian_kernel1d(sigma: f64, order: usize) -> Vec<f64> {
    folded_gaussian_kernel(sigma, order, usize::MAX)
}

/// [`gaussian_kernel1d`] with every tap beyond `max_radius` added onto the
/// outermost tap on its side.
///
/// Under nearest-edge extension on a lane of `max_radius + 1` samples, all
/// taps at `|offset| >= max_radius` read the same edge sample, so the
/// folded kernel gives identical results.
fn folded_gaussian_kernel(sigma: f64, order: usize, max_radius: usize) -> Vec<f64> {
    let radius = (GAUSS_TRUNCATE * sigma + 0.5) as usize;
    let fold = radius.min(max_radius);
    let sigma2 = sigma * sigma;
    let phi = |x: usize| (-0.5 * (x as f64).powi(2) / sigma2).exp();

    // phi^(n)(x) = q_n(x) * phi(x), with q_{n+1} = q_n' - x q_n / sigma^2
    let mut q = vec![0.0; order + 1];
    q[0] = 1.0;
    for _ in 0..order {
        let mut next = vec![0.0; order + 1];
        for j in 0..=order {
            if j < order {
                next[j] += (j + 1) as f64 * q[j + 1];
            }
            if j > 0 {
                next[j] -= q[j - 1] / sigma2;
            }
        }
        q = next;
    }
    let poly = |x: f64| q.iter().rev().fold(0.0, |acc, coeff| acc * x + coeff);

    let total: f64 = phi(0) + 2.0 * (1..=radius).map(&phi).sum::<f64>();

    // Both sides accumulate in the same order so odd kernels stay exactly
    // antisymmetric after folding.
    let mut kernel = vec![0.0; 2 * fold + 1];
    let mut smooth = vec![0.0; 2 * fold + 1];
    for x in 0..=radius {
        let weight = phi(x) / total;
        let slot = x.min(fold);
        // Correlating with phi^(n)(-x) is convolving with phi^(n)(x)
        kernel[fold + slot] += poly(-(x as f64)) * weight;
        smooth[fold + slot] += weight;
        if x > 0 {
            kernel[fold - slot] += poly(x as f64) * weight;
            smooth[fold - slot] += weight;
        }
    }

    // Truncation leaves even derivative kernels with a small response to
    // constants; remove it so flat terrain has zero curvature.
    if order > 0 && order % 2 == 0 {
        let bias: f64 = kernel.iter().sum();
        for (k, w) in kernel.iter_mut().zip(smooth.iter()) {
            *k -= bias * w;
        }
    }
    kernel
}

/// One-dimensional correlation along `axis` with nearest-edge extension.
///
/// Taps are accumulated in mirrored pairs so that an antisymmetric kernel
/// cancels exactly on constant input.
fn correlate1d(input: ArrayView2<'_, f64>, kernel: &[f64], axis: Axis) -> Grid {
    if kernel == [1.0] || input.is_empty() {
        return input.to_owned();
    }

    let radius = kernel.len() / 2;
    let mut output = Array2::<f64>::zeros(input.raw_dim());

    for (lane, mut out) in input.lanes(axis).into_iter().zip(output.lanes_mut(axis)) {
        let last = lane.len() - 1;
        for i in 0..=last {
            let mut acc = kernel[radius] * lane[i];
            for k in 1..=radius {
                let ahead = lane[(i + k).min(last)];
                let behind = lane[i.saturating_sub(k)];
                acc += kernel[radius + k] * ahead + kernel[radius - k] * behind;
            }
            out[i] = acc;
        }
    }

    output
}
