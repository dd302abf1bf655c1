/// Minute interval over the scheduling horizon, half-open `[start, end)`.
pub type Interval = (u32, u32);

/// Merges overlapping or adjacent intervals into a sorted disjoint list
///
/// # Arguments
///
/// * 'intervals' - intervals in any order
pub fn merge(intervals: &[Interval]) -> Vec<Interval> {
    let mut sorted: Vec<Interval> = intervals.iter().filter(|(s, e)| s < e).cloned().collect();
    sorted.sort();

    let mut result: Vec<Interval> = Vec::with_capacity(sorted.len());
    for (start, end) in sorted {
        match result.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => result.push((start, end)),
        }
    }

    result
}

/// Subtracts a set of intervals from a base set
///
/// The subtrahend is merged first, then every base interval is split against it
/// with a single forward sweep.
///
/// # Arguments
///
/// * 'base' - sorted disjoint base intervals
/// * 'sub' - intervals to remove, any order
pub fn subtract(base: &[Interval], sub: &[Interval]) -> Vec<Interval> {
    if sub.is_empty() {
        return base.to_vec();
    }
    let merged_sub = merge(sub);

    let mut result: Vec<Interval> = Vec::new();
    for &(base_start, base_end) in base {
        let mut cursor = base_start;
        for &(sub_start, sub_end) in merged_sub.iter() {
            if sub_end <= cursor || sub_start >= base_end {
                continue;
            }
            if sub_start > cursor {
                result.push((cursor, sub_start));
            }
            cursor = cursor.max(sub_end);
            if cursor >= base_end {
                break;
            }
        }
        if cursor < base_end {
            result.push((cursor, base_end));
        }
    }

    result
}

/// Intersects two sorted disjoint interval lists
///
/// # Arguments
///
/// * 'left' - sorted disjoint intervals
/// * 'right' - sorted disjoint intervals
pub fn intersect(left: &[Interval], right: &[Interval]) -> Vec<Interval> {
    let mut result: Vec<Interval> = Vec::new();
    let (mut i, mut j) = (0usize, 0usize);

    while i < left.len() && j < right.len() {
        let start = left[i].0.max(right[j].0);
        let end = left[i].1.min(right[j].1);
        if start < end {
            result.push((start, end));
        }
        if left[i].1 <= right[j].1 {
            i += 1;
        } else {
            j += 1;
        }
    }

    result
}

/// Clips intervals to `[0, limit)`
///
/// # Arguments
///
/// * 'intervals' - sorted disjoint intervals
/// * 'limit' - upper bound (non-inclusive)
pub fn clip(intervals: &[Interval], limit: u32) -> Vec<Interval> {
    intervals
        .iter()
        .filter(|(s, _)| *s < limit)
        .map(|&(s, e)| (s, e.min(limit)))
        .filter(|(s, e)| s < e)
        .collect()
}

/// True if `[start, end)` overlaps any interval in the sorted disjoint list
pub fn overlaps_any(start: u32, end: u32, intervals: &[Interval]) -> bool {
    intervals.iter().any(|&(s, e)| start < e && s < end)
}

/// Sum of minutes covered by the sorted disjoint list
pub fn covered_minutes(intervals: &[Interval]) -> u32 {
    intervals.iter().map(|(s, e)| e - s).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_overlapping_and_adjacent() {
        let merged = merge(&[(10, 20), (5, 12), (20, 25), (40, 50)]);
        assert_eq!(merged, vec![(5, 25), (40, 50)]);
    }

    #[test]
    fn test_merge_drops_empty() {
        assert_eq!(merge(&[(10, 10), (3, 7)]), vec![(3, 7)]);
    }

    #[test]
    fn test_subtract_splits_base() {
        let result = subtract(&[(0, 100)], &[(20, 30), (50, 60)]);
        assert_eq!(result, vec![(0, 20), (30, 50), (60, 100)]);
    }

    #[test]
    fn test_subtract_consumes_whole_base() {
        assert_eq!(subtract(&[(10, 20)], &[(0, 40)]), Vec::<Interval>::new());
    }

    #[test]
    fn test_subtract_unsorted_subtrahend() {
        let result = subtract(&[(0, 1440)], &[(1410, 1440), (30, 450)]);
        assert_eq!(result, vec![(0, 30), (450, 1410)]);
    }

    #[test]
    fn test_intersect() {
        let result = intersect(&[(0, 50), (60, 100)], &[(40, 70), (90, 200)]);
        assert_eq!(result, vec![(40, 50), (60, 70), (90, 100)]);
    }

    #[test]
    fn test_clip() {
        assert_eq!(clip(&[(0, 10), (20, 40)], 25), vec![(0, 10), (20, 25)]);
        assert_eq!(clip(&[(30, 40)], 25), Vec::<Interval>::new());
    }

    #[test]
    fn test_overlaps_any_half_open() {
        let list = vec![(10, 20)];
        assert!(overlaps_any(15, 25, &list));
        assert!(!overlaps_any(20, 30, &list));
        assert!(!overlaps_any(0, 10, &list));
    }

    #[test]
    fn test_covered_minutes() {
        assert_eq!(covered_minutes(&[(0, 10), (20, 25)]), 15);
    }
}
