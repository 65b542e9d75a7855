/// Exact dynamic time warping cost between two series using the absolute
/// difference as local cost. Runs in `O(n·m)` time with two DP rows.
///
/// Returns `None` if either series is empty.
pub fn dynamic_time_warping_distance(lhs: &[f64], rhs: &[f64]) -> Option<f64> {
    if lhs.is_empty() || rhs.is_empty() {
        return None;
    }

    let columns = rhs.len();
    let mut previous = vec![f64::INFINITY; columns + 1];
    let mut current = vec![f64::INFINITY; columns + 1];
    previous[0] = 0.0;

    for &left in lhs {
        current[0] = f64::INFINITY;
        for (column, &right) in rhs.iter().enumerate() {
            let cost = (left - right).abs();
            let best = previous[column]
                .min(previous[column + 1])
                .min(current[column]);
            current[column + 1] = cost + best;
        }
        std::mem::swap(&mut previous, &mut current);
    }

    Some(previous[columns])
}
