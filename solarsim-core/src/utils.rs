//! Module containing miscellaneous utility functions.

/// return max <f64> of arr, NaN for an empty slice
pub fn arrmax(arr: &[f64]) -> f64 {
    arr.iter().copied().fold(f64::NAN, f64::max)
}

/// return min <f64> of arr, NaN for an empty slice
pub fn arrmin(arr: &[f64]) -> f64 {
    arr.iter().copied().fold(f64::NAN, f64::min)
}

/// Return first index of `arr` greater than or equal to `cut`, or `None` if
/// no element reaches it
pub fn first_geq(arr: &[f64], cut: f64) -> Option<usize> {
    arr.iter().position(|&x| x >= cut)
}

/// Piecewise-linear interpolation of `y_data_in` over `x_data_in` at `x`.
///
/// Points whose x is not strictly greater than the last kept x are dropped,
/// so plateaus in `x_data_in` resolve to their first sample.
/// Without `extrapolate`, values outside the data range are clamped to the
/// end values.
pub fn interpolate(x: f64, x_data_in: &[f64], y_data_in: &[f64], extrapolate: bool) -> f64 {
    let mut x_data: Vec<f64> = Vec::with_capacity(x_data_in.len());
    let mut y_data: Vec<f64> = Vec::with_capacity(y_data_in.len());
    for (&xi, &yi) in x_data_in.iter().zip(y_data_in) {
        if x_data.last().map_or(true, |&last_x| xi > last_x) {
            x_data.push(xi);
            y_data.push(yi);
        }
    }
    let size = x_data.len();
    match size {
        0 => return f64::NAN,
        1 => return y_data[0],
        _ => {}
    }

    let i = if x >= x_data[size - 2] {
        size - 2
    } else {
        x_data
            .windows(2)
            .position(|w| x <= w[1])
            .unwrap_or(size - 2)
    };
    let xl = x_data[i];
    let mut yl = y_data[i];
    let xr = x_data[i + 1];
    let mut yr = y_data[i + 1];
    if !extrapolate {
        if x < xl {
            yr = yl;
        }
        if x > xr {
            yl = yr;
        }
    }
    let dydx = (yr - yl) / (xr - xl);
    yl + dydx * (x - xl)
}

/// Checks that `xs` is strictly increasing
pub fn is_strictly_increasing(xs: &[f64]) -> bool {
    xs.windows(2).all(|w| w[0] < w[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate() {
        let xs = [0.0, 1.0, 2.0];
        let ys = [0.0, 10.0, 30.0];
        assert_eq!(interpolate(0.5, &xs, &ys, false), 5.0);
        assert_eq!(interpolate(1.5, &xs, &ys, false), 20.0);
        assert_eq!(interpolate(2.0, &xs, &ys, false), 30.0);
    }

    #[test]
    fn test_interpolate_clamps_without_extrapolation() {
        let xs = [0.0, 1.0, 2.0];
        let ys = [0.0, 10.0, 30.0];
        assert_eq!(interpolate(-1.0, &xs, &ys, false), 0.0);
        assert_eq!(interpolate(5.0, &xs, &ys, false), 30.0);
        assert_eq!(interpolate(3.0, &xs, &ys, true), 50.0);
        assert_eq!(interpolate(-1.0, &xs, &ys, true), -10.0);
    }

    #[test]
    fn test_interpolate_drops_plateaus() {
        // repeated x values keep the first sample
        let xs = [0.0, 0.0, 1.0, 1.0, 2.0];
        let ys = [0.0, 1.0, 2.0, 3.0, 4.0];
        assert_eq!(interpolate(0.5, &xs, &ys, false), 1.0);
        assert_eq!(interpolate(1.5, &xs, &ys, false), 3.0);
    }

    #[test]
    fn test_interpolate_degenerate() {
        assert!(interpolate(1.0, &[], &[], false).is_nan());
        assert_eq!(interpolate(4.0, &[2.0], &[7.0], false), 7.0);
        assert_eq!(interpolate(4.0, &[2.0, 2.0], &[7.0, 9.0], false), 7.0);
    }

    #[test]
    fn test_first_geq() {
        let sums = [1.0, 3.0, 6.0];
        assert_eq!(first_geq(&sums, 3.0), Some(1));
        assert_eq!(first_geq(&sums, 7.0), None);
    }

    #[test]
    fn test_arrmax_arrmin() {
        assert_eq!(arrmax(&[1.0, 5.0, -2.0]), 5.0);
        assert_eq!(arrmin(&[1.0, 5.0, -2.0]), -2.0);
        assert!(arrmax(&[]).is_nan());
    }
}
