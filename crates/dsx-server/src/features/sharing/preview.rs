//! Preview frame selection
//!
//! A preview keeps full content for `ceil(fraction * n)` of a dataset's `n`
//! items, spread evenly from the first item to the last. The choice depends
//! only on `n` and `fraction`.

/// Slack for float products that should land on an integer, e.g. `0.05 * 20`
const EPSILON: f64 = 1e-9;

/// Number of items with full content in a preview of `n` items
pub fn preview_count(n: usize, fraction: f64) -> usize {
    if n == 0 {
        return 0;
    }
    if !fraction.is_finite() || fraction <= 0.0 {
        return 1;
    }
    let raw = (fraction * n as f64 - EPSILON).ceil();
    (raw.max(1.0) as usize).min(n)
}

/// Sorted, distinct indices in `0..n` of the items kept in full
///
/// ```
/// use dsx_server::features::sharing::preview::select_preview_indices;
///
/// assert_eq!(select_preview_indices(20, 0.05), vec![0]);
/// assert_eq!(select_preview_indices(20, 0.2), vec![0, 6, 13, 19]);
/// assert!(select_preview_indices(0, 0.2).is_empty());
/// ```
pub fn select_preview_indices(n: usize, fraction: f64) -> Vec<usize> {
    let count = preview_count(n, fraction);
    match count {
        0 => Vec::new(),
        1 => vec![0],
        _ => {
            let last = (n - 1) as f64;
            let steps = (count - 1) as f64;
            let mut indices: Vec<usize> = (0..count)
                .map(|i| ((i as f64 * last / steps).round() as usize).min(n - 1))
                .collect();
            indices.dedup();
            indices
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_selections() {
        assert_eq!(select_preview_indices(20, 0.05), vec![0]);
        assert_eq!(select_preview_indices(20, 0.2), vec![0, 6, 13, 19]);
        assert_eq!(select_preview_indices(1, 0.05), vec![0]);
        assert_eq!(select_preview_indices(3, 1.0), vec![0, 1, 2]);
        assert_eq!(select_preview_indices(100, 0.05), vec![0, 25, 50, 74, 99]);
        assert!(select_preview_indices(0, 0.5).is_empty());
    }

    #[test]
    fn test_count_is_clamped() {
        assert_eq!(preview_count(0, 0.2), 0);
        assert_eq!(preview_count(10, 0.0001), 1);
        assert_eq!(preview_count(10, 1.0), 10);
        assert_eq!(preview_count(21, 0.05), 2);
        assert_eq!(preview_count(10, f64::NAN), 1);
    }

    proptest! {
        #[test]
        fn prop_indices_bounded_sorted_distinct(n in 0usize..500, fraction in 0.001f64..=1.0) {
            let indices = select_preview_indices(n, fraction);
            if n == 0 {
                prop_assert!(indices.is_empty());
            } else {
                prop_assert!(!indices.is_empty());
                prop_assert!(indices.len() <= n);
                prop_assert!(indices.len() <= preview_count(n, fraction));
                prop_assert_eq!(indices[0], 0);
                prop_assert!(indices.iter().all(|&i| i < n));
                prop_assert!(indices.windows(2).all(|w| w[0] < w[1]));
            }
        }

        #[test]
        fn prop_selection_is_deterministic(n in 0usize..500, fraction in 0.001f64..=1.0) {
            prop_assert_eq!(select_preview_indices(n, fraction), select_preview_indices(n, fraction));
        }

        #[test]
        fn prop_last_item_kept_when_two_or_more(n in 2usize..500, fraction in 0.001f64..=1.0) {
            let indices = select_preview_indices(n, fraction);
            if preview_count(n, fraction) >= 2 {
                prop_assert_eq!(*indices.last().unwrap(), n - 1);
            }
        }
    }
}
