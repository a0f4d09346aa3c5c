/// Utility helpers for ArchivePlayer
use rand::Rng;

/// Wrap `current + step` into `[0, len)`.
///
/// Works for any sign of `step`. An empty list always yields `0`.
pub fn circular_index(current: usize, step: i64, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let len = len as i64;
    (current as i64).wrapping_add(step).rem_euclid(len) as usize
}

/// Return a shuffled copy of `items` (Fisher-Yates, last index down to 1).
pub fn shuffle<T: Clone>(items: &[T]) -> Vec<T> {
    shuffle_with(items, &mut rand::thread_rng())
}

pub fn shuffle_with<T: Clone, R: Rng + ?Sized>(items: &[T], rng: &mut R) -> Vec<T> {
    let mut out = items.to_vec();
    for i in (1..out.len()).rev() {
        let j = rng.gen_range(0..=i);
        out.swap(i, j);
    }
    out
}

/// Format seconds as `mm:ss`, or `h:mm:ss` past the hour.
/// Unknown, negative or non-finite input renders as `00:00`.
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "00:00".to_string();
    }
    let total = seconds.floor() as u64;
    let hours = total / 3600;
    let mins = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}", mins, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    #[test]
    fn circular_index_wraps_both_ways() {
        assert_eq!(circular_index(2, 1, 3), 0);
        assert_eq!(circular_index(0, -1, 3), 2);
        assert_eq!(circular_index(1, -7, 3), 0);
        assert_eq!(circular_index(4, 0, 0), 0);
    }

    #[test]
    fn shuffle_leaves_input_untouched() {
        let input = vec![1, 2, 3, 4, 5];
        let _ = shuffle(&input);
        assert_eq!(input, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn shuffle_distribution_is_uniform() {
        // 6 permutations of 3 items, 60k draws -> 10k expected each.
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut counts: HashMap<Vec<u8>, u32> = HashMap::new();
        let draws = 60_000;
        for _ in 0..draws {
            *counts.entry(shuffle_with(&[0u8, 1, 2], &mut rng)).or_default() += 1;
        }
        assert_eq!(counts.len(), 6);

        let expected = draws as f64 / 6.0;
        let chi_square: f64 = counts
            .values()
            .map(|&seen| {
                let diff = seen as f64 - expected;
                diff * diff / expected
            })
            .sum();
        // df = 5, p = 0.001 critical value is 20.52
        assert!(chi_square < 20.52, "chi-square too large: {chi_square}");
    }

    #[test]
    fn format_duration_handles_hours_and_garbage() {
        assert_eq!(format_duration(f64::NAN), "00:00");
        assert_eq!(format_duration(-4.0), "00:00");
        assert_eq!(format_duration(65.9), "01:05");
        assert_eq!(format_duration(3_725.0), "1:02:05");
    }

    proptest! {
        #[test]
        fn circular_index_stays_in_bounds(
            current in 0usize..10_000,
            step in -100_000i64..100_000,
            len in 1usize..500,
        ) {
            let idx = circular_index(current, step, len);
            prop_assert!(idx < len);
        }

        #[test]
        fn shuffle_is_a_permutation(items in prop::collection::vec(0u32..1000, 0..64)) {
            let shuffled = shuffle(&items);
            prop_assert_eq!(shuffled.len(), items.len());

            let mut a = items.clone();
            let mut b = shuffled;
            a.sort_unstable();
            b.sort_unstable();
            prop_assert_eq!(a, b);
        }
    }
}
