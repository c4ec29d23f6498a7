//! Percentile ranking with averaged ties.
//!
//! `pct(x_i) = rank_i / n`, where `rank_i` is the 1-based ascending rank of
//! `x_i` and tied values share the mean of the ranks they span. The result
//! lies in `(0, 1]` and does not depend on input order.

/// Percentile rank of every value, in input order.
///
/// NaN values sort after every number; callers are expected to pass
/// finite values.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn percentile_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && values[order[end]].total_cmp(&values[order[start]]).is_eq() {
            end += 1;
        }

        // Ranks start..end (0-based) are 1-based start+1..=end.
        let average = (start + 1 + end) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = average / n as f64;
        }
        start = end;
    }

    ranks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_values_rank_linearly() {
        let ranks = percentile_ranks(&[30.0, 10.0, 20.0, 40.0]);
        let expected = [0.75, 0.25, 0.5, 1.0];
        for (got, want) in ranks.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12);
        }
    }

    #[test]
    fn ties_share_the_average_rank() {
        let ranks = percentile_ranks(&[5.0, 5.0, 1.0, 5.0]);
        // 1.0 is rank 1; the three 5.0 values span ranks 2..=4, mean 3.
        assert!((ranks[2] - 0.25).abs() < 1e-12);
        for i in [0, 1, 3] {
            assert!((ranks[i] - 0.75).abs() < 1e-12);
        }
    }

    #[test]
    fn all_equal_values_rank_at_midpoint() {
        let ranks = percentile_ranks(&[0.0; 4]);
        assert!(ranks.iter().all(|r| (r - 0.625).abs() < 1e-12));
    }

    #[test]
    fn ranks_stay_in_unit_interval() {
        let values: Vec<f64> = (0..50).map(|i| f64::from(i % 7)).collect();
        for rank in percentile_ranks(&values) {
            assert!(rank > 0.0 && rank <= 1.0);
        }
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(percentile_ranks(&[]).is_empty());
    }
}
