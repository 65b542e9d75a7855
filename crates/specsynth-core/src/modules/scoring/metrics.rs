use crate::numerics::{dynamic_time_warping_distance, stable_mean, stable_sum_iter};

/// Mean over reference points of the Euclidean distance to the closest
/// candidate point in (wavelength, normalized intensity) space.
pub(super) fn nearest_point_distance(
    reference: (&[f64], &[f64]),
    candidate: (&[f64], &[f64]),
) -> Option<f64> {
    let (reference_x, reference_y) = reference;
    let (candidate_x, candidate_y) = candidate;
    if reference_x.is_empty() || candidate_x.is_empty() {
        return None;
    }

    let distances: Vec<f64> = reference_x
        .iter()
        .zip(reference_y)
        .map(|(x, y)| {
            candidate_x
                .iter()
                .zip(candidate_y)
                .map(|(cx, cy)| (x - cx).hypot(y - cy))
                .fold(f64::INFINITY, f64::min)
        })
        .collect();
    stable_mean(&distances)
}

/// `Σ(ŷ−ȳ)² / Σ(y−ȳ)²` with `y` the truth; values above one are inverted.
pub(super) fn coefficient_of_determination(truth: &[f64], prediction: &[f64]) -> Option<f64> {
    let mean = stable_mean(truth)?;
    let total = stable_sum_iter(truth.iter().map(|y| (y - mean).powi(2)));
    if total == 0.0 {
        return None;
    }
    let regression = stable_sum_iter(prediction.iter().map(|y| (y - mean).powi(2)));

    let r_squared = regression / total;
    if r_squared > 1.0 {
        Some(1.0 / r_squared)
    } else {
        Some(r_squared)
    }
}

pub(super) fn dtw_distance(lhs: &[f64], rhs: &[f64]) -> Option<f64> {
    dynamic_time_warping_distance(lhs, rhs)
}

/// Pearson correlation, clamped to `[-1, 1]`; `None` for a constant series.
pub(super) fn pearson_correlation(lhs: &[f64], rhs: &[f64]) -> Option<f64> {
    if lhs.len() != rhs.len() {
        return None;
    }
    let lhs_mean = stable_mean(lhs)?;
    let rhs_mean = stable_mean(rhs)?;

    let covariance = stable_sum_iter(
        lhs.iter()
            .zip(rhs)
            .map(|(x, y)| (x - lhs_mean) * (y - rhs_mean)),
    );
    let lhs_spread = stable_sum_iter(lhs.iter().map(|x| (x - lhs_mean).powi(2)));
    let rhs_spread = stable_sum_iter(rhs.iter().map(|y| (y - rhs_mean).powi(2)));
    if lhs_spread == 0.0 || rhs_spread == 0.0 {
        return None;
    }

    Some((covariance / (lhs_spread * rhs_spread).sqrt()).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::{
        coefficient_of_determination, nearest_point_distance, pearson_correlation,
    };

    #[test]
    fn nearest_point_distance_is_zero_for_identical_point_sets() {
        let x = [1.0, 2.0, 3.0];
        let y = [0.1, 1.0, 0.3];
        assert_eq!(nearest_point_distance((&x, &y), (&x, &y)), Some(0.0));

        let shifted = [0.1, 1.0, 0.3 + 0.3];
        let distance = nearest_point_distance((&x, &y), (&x, &shifted)).expect("distance");
        assert!((distance - 0.1).abs() < 1.0e-12);
    }

    #[test]
    fn r_squared_inverts_values_above_one() {
        let truth = [0.0, 0.5, 1.0];
        assert_eq!(coefficient_of_determination(&truth, &truth), Some(1.0));

        // Σ(ŷ−ȳ)² = 2.0 against Σ(y−ȳ)² = 0.5
        let amplified = [-0.5, 0.5, 1.5];
        let r_squared = coefficient_of_determination(&truth, &amplified).expect("r2");
        assert!((r_squared - 0.25).abs() < 1.0e-12);

        assert_eq!(coefficient_of_determination(&[1.0, 1.0], &truth[..2]), None);
    }

    #[test]
    fn pearson_correlation_detects_anticorrelation_and_constants() {
        let rising = [0.0, 0.5, 1.0];
        let falling = [1.0, 0.5, 0.0];
        assert_eq!(pearson_correlation(&rising, &rising), Some(1.0));
        assert_eq!(pearson_correlation(&rising, &falling), Some(-1.0));
        assert_eq!(pearson_correlation(&rising, &[1.0, 1.0, 1.0]), None);
        assert_eq!(pearson_correlation(&rising, &falling[..2]), None);
    }
}
