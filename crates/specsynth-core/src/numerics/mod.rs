pub mod dtw;

pub use dtw::dynamic_time_warping_distance;

fn kahan_add(sum: &mut f64, correction: &mut f64, value: f64) {
    let corrected = value - *correction;
    let next = *sum + corrected;
    *correction = (next - *sum) - corrected;
    *sum = next;
}

pub fn stable_sum(values: &[f64]) -> f64 {
    stable_sum_iter(values.iter().copied())
}

pub fn stable_sum_iter(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut correction = 0.0;

    for value in values {
        kahan_add(&mut sum, &mut correction, value);
    }

    sum
}

pub fn stable_mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(stable_sum(values) / values.len() as f64)
}

pub fn deterministic_argsort(values: &[f64]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..values.len()).collect();
    indices.sort_unstable_by(|lhs, rhs| {
        values[*lhs]
            .total_cmp(&values[*rhs])
            .then_with(|| lhs.cmp(rhs))
    });
    indices
}

pub fn linear_grid(start: f64, end: f64, count: usize) -> Option<Vec<f64>> {
    if count < 2 {
        return None;
    }

    let step = (end - start) / ((count - 1) as f64);
    let mut grid = Vec::with_capacity(count);
    for index in 0..count {
        grid.push(start + step * (index as f64));
    }

    if let Some(last) = grid.last_mut() {
        *last = end;
    }

    Some(grid)
}

/// Geometric sequence from `start` to `end` inclusive; both bounds must be positive.
pub fn logarithmic_grid(start: f64, end: f64, count: usize) -> Option<Vec<f64>> {
    if start <= 0.0 || end <= 0.0 {
        return None;
    }

    let exponents = linear_grid(start.log10(), end.log10(), count)?;
    let mut grid: Vec<f64> = exponents
        .into_iter()
        .map(|exponent| 10.0_f64.powf(exponent))
        .collect();
    grid[0] = start;
    if let Some(last) = grid.last_mut() {
        *last = end;
    }
    Some(grid)
}

/// Grids of length one are allowed here; single-point axes show up in scans.
pub fn single_or_linear_grid(start: f64, end: f64, count: usize) -> Option<Vec<f64>> {
    match count {
        0 => None,
        1 => Some(vec![start]),
        _ => linear_grid(start, end, count),
    }
}

fn is_non_decreasing(x_grid: &[f64]) -> bool {
    x_grid.windows(2).all(|window| window[0] <= window[1])
}

fn bracketing_segment(x: f64, x_grid: &[f64]) -> usize {
    match x_grid.binary_search_by(|probe| probe.total_cmp(&x)) {
        Ok(index) => index.clamp(1, x_grid.len() - 1),
        Err(upper) => upper.clamp(1, x_grid.len() - 1),
    }
}

fn interpolate_segment(x: f64, x_grid: &[f64], y_grid: &[f64], upper: usize) -> f64 {
    let lower = upper - 1;
    let x0 = x_grid[lower];
    let x1 = x_grid[upper];
    if x == x1 || x1 == x0 {
        return y_grid[upper];
    }
    if x == x0 {
        return y_grid[lower];
    }

    let interpolation = (x - x0) / (x1 - x0);
    y_grid[lower] + interpolation * (y_grid[upper] - y_grid[lower])
}

/// Linear interpolation that extends the first and last segments outside the grid.
pub fn interpolate_linear_extrapolated(x: f64, x_grid: &[f64], y_grid: &[f64]) -> Option<f64> {
    if x_grid.len() < 2 || x_grid.len() != y_grid.len() || !is_non_decreasing(x_grid) {
        return None;
    }

    Some(interpolate_segment(
        x,
        x_grid,
        y_grid,
        bracketing_segment(x, x_grid),
    ))
}

/// Resamples `(x_grid, y_grid)` onto every point of `targets`.
pub fn resample_linear_extrapolated(
    targets: &[f64],
    x_grid: &[f64],
    y_grid: &[f64],
) -> Option<Vec<f64>> {
    targets
        .iter()
        .map(|&x| interpolate_linear_extrapolated(x, x_grid, y_grid))
        .collect()
}

/// Divides by the series maximum. Returns `None` when the maximum is not positive.
pub fn max_normalized(values: &[f64]) -> Option<Vec<f64>> {
    let maximum = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if maximum <= 0.0 || !maximum.is_finite() {
        return None;
    }
    Some(values.iter().map(|value| value / maximum).collect())
}

pub fn relative_difference(lhs: f64, rhs: f64, relative_floor: f64) -> f64 {
    let scale = lhs.abs().max(rhs.abs()).max(relative_floor);
    (lhs - rhs).abs() / scale
}

#[cfg(test)]
mod tests {
    use super::{
        deterministic_argsort, interpolate_linear_extrapolated, linear_grid, logarithmic_grid,
        max_normalized, relative_difference, resample_linear_extrapolated, single_or_linear_grid,
        stable_mean, stable_sum,
    };

    #[test]
    fn stable_sum_reduces_order_loss_for_large_and_small_values() {
        let input = [1.0e16, 1.0, -1.0e16];
        assert_eq!(stable_sum(&input), 0.0);
        assert_eq!(stable_mean(&[]), None);
        assert_eq!(stable_mean(&[1.0, 2.0, 3.0]), Some(2.0));
    }

    #[test]
    fn deterministic_argsort_orders_by_value_then_index() {
        let values = [2.0, 1.0, f64::NAN, 1.0, -0.0, 0.0];
        let order = deterministic_argsort(&values);
        assert_eq!(order, vec![4, 5, 1, 3, 0, 2]);
    }

    #[test]
    fn linear_grid_is_inclusive_and_rejects_invalid_counts() {
        assert_eq!(linear_grid(0.0, 1.0, 1), None);
        let grid = linear_grid(0.0, 2.0, 5).expect("grid");
        assert_eq!(grid, vec![0.0, 0.5, 1.0, 1.5, 2.0]);
        assert_eq!(single_or_linear_grid(3.0, 9.0, 1), Some(vec![3.0]));
        assert_eq!(single_or_linear_grid(3.0, 9.0, 0), None);
    }

    #[test]
    fn logarithmic_grid_spaces_decades_evenly() {
        let grid = logarithmic_grid(1.0e17, 1.0e20, 4).expect("grid");
        assert_eq!(grid.len(), 4);
        assert_eq!(grid[0], 1.0e17);
        assert_eq!(grid[3], 1.0e20);
        assert!(relative_difference(grid[1], 1.0e18, 1.0e-300) < 1.0e-12);
        assert!(relative_difference(grid[2], 1.0e19, 1.0e-300) < 1.0e-12);
        assert_eq!(logarithmic_grid(0.0, 1.0, 3), None);
    }

    #[test]
    fn extrapolating_interpolation_extends_boundary_segments() {
        let x_grid = [0.0, 1.0, 2.0];
        let y_grid = [10.0, 20.0, 40.0];

        assert_eq!(
            interpolate_linear_extrapolated(-1.0, &x_grid, &y_grid),
            Some(0.0)
        );
        assert_eq!(
            interpolate_linear_extrapolated(3.0, &x_grid, &y_grid),
            Some(60.0)
        );
        assert_eq!(
            resample_linear_extrapolated(&[0.5, 1.5], &x_grid, &y_grid),
            Some(vec![15.0, 30.0])
        );
    }

    #[test]
    fn interpolation_rejects_invalid_grids() {
        assert_eq!(interpolate_linear_extrapolated(0.5, &[0.0], &[1.0]), None);
        assert_eq!(
            interpolate_linear_extrapolated(0.5, &[0.0, 1.0], &[1.0]),
            None
        );
        assert_eq!(
            interpolate_linear_extrapolated(0.5, &[0.0, 2.0, 1.0], &[0.0, 2.0, 1.0]),
            None
        );
    }

    #[test]
    fn max_normalization_requires_a_positive_peak() {
        assert_eq!(max_normalized(&[1.0, 4.0, 2.0]), Some(vec![0.25, 1.0, 0.5]));
        assert_eq!(max_normalized(&[0.0, 0.0]), None);
        assert_eq!(max_normalized(&[]), None);
    }
}
