pub mod render;

use serde::Serialize;

/// One slot in the pager: a page number or an ellipsis standing in for the
/// hidden numbers between two shown ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PagerEntry {
    Page(usize),
    Gap,
}

impl PagerEntry {
    pub fn page(&self) -> Option<usize> {
        match self {
            PagerEntry::Page(n) => Some(*n),
            PagerEntry::Gap => None,
        }
    }

    pub fn is_gap(&self) -> bool {
        matches!(self, PagerEntry::Gap)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PagerState {
    pub current: usize,
    pub total: usize,
    pub max_numbers: usize,
}

impl PagerState {
    /// Clamps every field into range: `total >= 1`, `max_numbers >= 1` and
    /// `1 <= current <= total`.
    pub fn new(current: usize, total: usize, max_numbers: usize) -> Self {
        let total = total.max(1);
        Self {
            current: current.clamp(1, total),
            total,
            max_numbers: max_numbers.max(1),
        }
    }

    /// Builds the state from the raw `p` query value. Missing, non-numeric
    /// and zero values select page 1, values past the end select the last
    /// page.
    pub fn from_query(raw: Option<&str>, total: usize, max_numbers: usize) -> Self {
        Self::new(parse_page_param(raw), total, max_numbers)
    }

    pub fn window(&self) -> Vec<PagerEntry> {
        compute_window(self.current, self.total, self.max_numbers)
    }

    pub fn is_first(&self) -> bool {
        self.current == 1
    }

    pub fn is_last(&self) -> bool {
        self.current == self.total
    }

    pub fn prev(&self) -> usize {
        self.current.saturating_sub(1).max(1)
    }

    pub fn next(&self) -> usize {
        self.current.saturating_add(1).min(self.total)
    }
}

/// Parses a 1-based page number the way the site reads `?p=`: leading
/// integer digits count, anything unparsable or below 1 falls back to 1.
/// Digit runs too large for `usize` saturate, so they clamp to the last page.
pub fn parse_page_param(raw: Option<&str>) -> usize {
    let raw = match raw {
        Some(raw) => raw.trim(),
        None => return 1,
    };
    let digits: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
    match digits.parse::<usize>() {
        Ok(n) if n >= 1 => n,
        Ok(_) => 1,
        Err(_) if digits.chars().any(|c| c != '0') => usize::MAX,
        Err(_) => 1,
    }
}

/// Computes the page numbers shown in the pager.
///
/// Page 1 and `total` are always present. Around `current` sits a window of
/// `max_numbers` pages, shifted so it stays inside `[1, total]`. With an even
/// budget the window reaches one page further right than left. A gap is
/// emitted only where at least one page is hidden.
///
/// Out-of-range input is clamped rather than rejected: `total` and
/// `max_numbers` to at least 1, `current` into `[1, total]`.
pub fn compute_window(current: usize, total: usize, max_numbers: usize) -> Vec<PagerEntry> {
    let PagerState {
        current,
        total,
        max_numbers,
    } = PagerState::new(current, total, max_numbers);

    if max_numbers >= total {
        return (1..=total).map(PagerEntry::Page).collect();
    }

    // i128 holds every usize, so the shifts below cannot wrap
    let (current, total, max_numbers) = (current as i128, total as i128, max_numbers as i128);
    let half = max_numbers / 2;
    let mut left = current - half;
    let mut right = current + (max_numbers - 1 - half);

    if left < 1 {
        right += 1 - left;
        left = 1;
    }
    if right > total {
        left -= right - total;
        right = total;
    }
    left = left.max(1);

    let mut out = vec![PagerEntry::Page(1)];
    if left > 2 {
        out.push(PagerEntry::Gap);
    }
    for n in left.max(2)..=right.min(total - 1) {
        out.push(PagerEntry::Page(n as usize));
    }
    if right < total - 1 {
        out.push(PagerEntry::Gap);
    }
    if total > 1 {
        out.push(PagerEntry::Page(total as usize));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use PagerEntry::{Gap, Page};

    #[test]
    fn single_page_is_just_one() {
        assert_eq!(compute_window(1, 1, 5), vec![Page(1)]);
        assert_eq!(compute_window(1, 1, 1), vec![Page(1)]);
    }

    #[test]
    fn budget_covering_total_lists_every_page() {
        assert_eq!(
            compute_window(3, 5, 5),
            vec![Page(1), Page(2), Page(3), Page(4), Page(5)]
        );
        assert_eq!(compute_window(2, 3, 7), vec![Page(1), Page(2), Page(3)]);
    }

    #[test]
    fn window_at_start_shifts_right() {
        assert_eq!(
            compute_window(1, 10, 3),
            vec![Page(1), Page(2), Page(3), Gap, Page(10)]
        );
    }

    #[test]
    fn window_in_middle_has_two_gaps() {
        assert_eq!(
            compute_window(5, 10, 3),
            vec![Page(1), Gap, Page(4), Page(5), Page(6), Gap, Page(10)]
        );
    }

    #[test]
    fn window_at_end_shifts_left() {
        assert_eq!(
            compute_window(10, 10, 3),
            vec![Page(1), Gap, Page(8), Page(9), Page(10)]
        );
    }

    #[test]
    fn even_budget_leans_right() {
        // half = 2: two pages left of current, one page right of it
        assert_eq!(
            compute_window(6, 20, 4),
            vec![Page(1), Gap, Page(4), Page(5), Page(6), Page(7), Gap, Page(20)]
        );
    }

    #[test]
    fn no_gap_when_nothing_is_hidden() {
        // left == 2 means page 2 follows the anchor directly
        assert_eq!(
            compute_window(3, 10, 3),
            vec![Page(1), Page(2), Page(3), Page(4), Gap, Page(10)]
        );
        // right == total - 1 means the window touches the last anchor
        assert_eq!(
            compute_window(8, 10, 3),
            vec![Page(1), Gap, Page(7), Page(8), Page(9), Page(10)]
        );
    }

    #[test]
    fn budget_of_one() {
        assert_eq!(
            compute_window(5, 10, 1),
            vec![Page(1), Gap, Page(5), Gap, Page(10)]
        );
        assert_eq!(compute_window(1, 10, 1), vec![Page(1), Gap, Page(10)]);
    }

    #[test]
    fn malformed_input_is_clamped() {
        assert_eq!(compute_window(0, 0, 0), vec![Page(1)]);
        assert_eq!(compute_window(99, 10, 3), compute_window(10, 10, 3));
        assert_eq!(compute_window(0, 10, 3), compute_window(1, 10, 3));
        assert_eq!(compute_window(5, 10, 0), compute_window(5, 10, 1));
    }

    #[test]
    fn parse_page_param_defaults_and_truncates() {
        assert_eq!(parse_page_param(None), 1);
        assert_eq!(parse_page_param(Some("")), 1);
        assert_eq!(parse_page_param(Some("abc")), 1);
        assert_eq!(parse_page_param(Some("0")), 1);
        assert_eq!(parse_page_param(Some("-3")), 1);
        assert_eq!(parse_page_param(Some("4")), 4);
        assert_eq!(parse_page_param(Some("12px")), 12);
        assert_eq!(parse_page_param(Some("0000")), 1);
        assert_eq!(parse_page_param(Some("99999999999999999999999")), usize::MAX);
    }

    #[test]
    fn state_from_query_clamps_to_total() {
        let state = PagerState::from_query(Some("42"), 7, 5);
        assert_eq!(state.current, 7);
        assert!(state.is_last());
        assert_eq!(state.next(), 7);
        assert_eq!(state.prev(), 6);

        let state = PagerState::from_query(Some("99999999999999999999999"), 10, 5);
        assert_eq!(state.current, 10);

        let state = PagerState::from_query(None, 0, 0);
        assert_eq!((state.current, state.total, state.max_numbers), (1, 1, 1));
        assert!(state.is_first() && state.is_last());
        assert_eq!(state.prev(), 1);
    }

    #[test]
    fn huge_totals_keep_their_anchors() {
        let max = usize::MAX;
        assert_eq!(
            compute_window(1, max, 5),
            vec![Page(1), Page(2), Page(3), Page(4), Page(5), Gap, Page(max)]
        );
        assert_eq!(
            compute_window(max, max, 3),
            vec![Page(1), Gap, Page(max - 2), Page(max - 1), Page(max)]
        );

        let big = 1usize << 63;
        assert_eq!(
            compute_window(1, big, 5),
            vec![Page(1), Page(2), Page(3), Page(4), Page(5), Gap, Page(big)]
        );
        assert_eq!(
            compute_window(big / 2, big, 3),
            vec![Page(1), Gap, Page(big / 2 - 1), Page(big / 2), Page(big / 2 + 1), Gap, Page(big)]
        );

        let state = PagerState::new(max, max, 5);
        assert_eq!(state.next(), max);
        assert_eq!(state.prev(), max - 1);
    }

    #[test]
    fn window_properties_hold_across_inputs() {
        for total in 1..=40usize {
            for max_numbers in 1..=45usize {
                for current in 1..=total {
                    let w = compute_window(current, total, max_numbers);
                    let ctx = (current, total, max_numbers);
                    assert_eq!(w, compute_window(current, total, max_numbers), "{ctx:?}");

                    let pages: Vec<usize> = w.iter().filter_map(PagerEntry::page).collect();
                    assert!(pages.windows(2).all(|p| p[0] < p[1]), "{ctx:?}");
                    assert_eq!(w.first(), Some(&Page(1)), "{ctx:?}");
                    assert_eq!(w.last(), Some(&Page(total)), "{ctx:?}");
                    assert!(pages.contains(&current), "{ctx:?}");
                    assert!(pages.len() <= max_numbers + 2, "{ctx:?}");
                    assert!(w.iter().filter(|e| e.is_gap()).count() <= 2, "{ctx:?}");

                    for (i, entry) in w.iter().enumerate() {
                        if !entry.is_gap() {
                            continue;
                        }
                        let before = i.checked_sub(1).and_then(|j| w[j].page());
                        let after = w.get(i + 1).and_then(PagerEntry::page);
                        match (before, after) {
                            (Some(a), Some(b)) => assert!(b > a + 1, "{ctx:?}"),
                            _ => panic!("gap without numbers on both sides {ctx:?}"),
                        }
                    }

                    if max_numbers >= total {
                        assert_eq!(pages, (1..=total).collect::<Vec<_>>(), "{ctx:?}");
                        assert!(!w.iter().any(PagerEntry::is_gap), "{ctx:?}");
                    }
                }
            }
        }
    }
}
