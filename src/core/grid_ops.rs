use crate::types::Grid;
use ndarray::{ArrayBase, Data, Ix2, Zip};
use num_traits::AsPrimitive;

/// Private floating point copy of a numeric grid
pub fn as_float_grid<A, S>(array: &ArrayBase<S, Ix2>) -> Grid
where
    A: AsPrimitive<f64>,
    S: Data<Elem = A>,
{
    array.mapv(|v| v.as_())
}

/// Elementwise `a / b` where every non-finite quotient (0/0, x/0, inf/inf)
/// is replaced by `fill`.
pub fn safe_divide(a: &Grid, b: &Grid, fill: f64) -> Grid {
    Zip::from(a).and(b).map_collect(|&num, &den| {
        let ratio = num / den;
        if ratio.is_finite() {
            ratio
        } else {
            fill
        }
    })
}
