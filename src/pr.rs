//! Personal-record comparator logic.
//!
//! Pure functions over set lists and the cached historical best. A set
//! competes only once it is completed with both fields filled; ordering is
//! weight descending with reps descending as tie-break.

use std::cmp::Ordering;

use crate::types::{BestSet, SetRecord};

/// Comparable key of a set: present only for completed sets with both
/// fields filled.
pub fn set_key(set: &SetRecord) -> Option<(f64, u32)> {
    if !set.completed {
        return None;
    }
    match (set.weight, set.reps) {
        (Some(weight), Some(reps)) => Some((weight, reps)),
        _ => None,
    }
}

fn cmp_key(a: (f64, u32), b: (f64, u32)) -> Ordering {
    a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
}

/// Index of the session-best completed set under (weight desc, reps desc).
///
/// The first index wins ties, so at most one set per entry is ever flagged.
pub fn session_best(sets: &[SetRecord]) -> Option<usize> {
    let mut best: Option<(usize, (f64, u32))> = None;
    for (i, set) in sets.iter().enumerate() {
        let Some(key) = set_key(set) else { continue };
        match best {
            Some((_, best_key)) => {
                if cmp_key(key, best_key) == Ordering::Greater {
                    best = Some((i, key));
                }
            }
            None => best = Some((i, key)),
        }
    }
    best.map(|(i, _)| i)
}

/// True when (weight, reps) strictly exceeds the historical best: strictly
/// greater weight, or equal weight with strictly greater reps.
pub fn beats_best(weight: f64, reps: u32, best: &BestSet) -> bool {
    match weight.total_cmp(&best.weight) {
        Ordering::Greater => true,
        Ordering::Equal => reps > best.reps,
        Ordering::Less => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn done(weight: f64, reps: u32) -> SetRecord {
        SetRecord {
            weight: Some(weight),
            reps: Some(reps),
            completed: true,
        }
    }

    #[test]
    fn set_key_requires_completion_and_both_fields() {
        assert_eq!(set_key(&done(100.0, 5)), Some((100.0, 5)));

        let incomplete = SetRecord {
            weight: Some(100.0),
            reps: Some(5),
            completed: false,
        };
        assert_eq!(set_key(&incomplete), None);

        let half_filled = SetRecord {
            weight: Some(100.0),
            reps: None,
            completed: true,
        };
        assert_eq!(set_key(&half_filled), None);
    }

    #[test]
    fn session_best_prefers_heavier_weight_over_more_reps() {
        // Higher weight wins despite fewer reps.
        let sets = vec![done(100.0, 5), done(105.0, 3)];
        assert_eq!(session_best(&sets), Some(1));
    }

    #[test]
    fn session_best_breaks_weight_ties_by_reps() {
        let sets = vec![done(100.0, 5), done(100.0, 8)];
        assert_eq!(session_best(&sets), Some(1));
    }

    #[test]
    fn session_best_first_index_wins_exact_ties() {
        let sets = vec![done(100.0, 5), done(100.0, 5)];
        assert_eq!(session_best(&sets), Some(0));
    }

    #[test]
    fn session_best_ignores_incomplete_sets() {
        let sets = vec![
            SetRecord {
                weight: Some(200.0),
                reps: Some(1),
                completed: false,
            },
            done(100.0, 5),
        ];
        assert_eq!(session_best(&sets), Some(1));
    }

    #[test]
    fn session_best_of_nothing_is_none() {
        assert_eq!(session_best(&[]), None);
        assert_eq!(session_best(&[SetRecord::blank()]), None);
    }

    #[test]
    fn beats_best_strictly_greater_weight() {
        let best = BestSet {
            weight: 100.0,
            reps: 5,
        };
        assert!(beats_best(105.0, 3, &best));
        assert!(!beats_best(100.0, 5, &best));
        assert!(!beats_best(95.0, 20, &best));
    }

    #[test]
    fn beats_best_equal_weight_more_reps() {
        let best = BestSet {
            weight: 100.0,
            reps: 5,
        };
        assert!(beats_best(100.0, 6, &best));
        assert!(!beats_best(100.0, 4, &best));
    }
}
