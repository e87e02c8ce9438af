//! crates/problem_dojo_core/src/view.rs
//!
//! Pure, synchronous views over a merged collection: difficulty filtering,
//! practice ordering and fixed-size pagination.

use crate::domain::Problem;

/// Number of records on one page.
pub const PAGE_SIZE: usize = 20;

/// An inclusive difficulty range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyRange {
    pub min: i64,
    pub max: i64,
}

impl Default for DifficultyRange {
    fn default() -> Self {
        Self { min: 0, max: 8000 }
    }
}

impl DifficultyRange {
    pub fn contains(&self, difficulty: f64) -> bool {
        self.min as f64 <= difficulty && difficulty <= self.max as f64
    }
}

/// Keeps problems with a known difficulty inside `range`, least practised first.
///
/// Ordering is by solve count, then by last solve time with never-solved problems
/// treated as time 0. The sort is stable, so equal keys keep catalog order.
pub fn filter_and_sort(problems: &[Problem], range: DifficultyRange) -> Vec<&Problem> {
    let mut selected: Vec<&Problem> = problems
        .iter()
        .filter(|p| p.difficulty.is_some_and(|d| range.contains(d)))
        .collect();
    selected.sort_by_key(|p| (p.solve_count, p.last_solved.unwrap_or(0)));
    selected
}

/// One page of a longer listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number.
    pub page: usize,
    pub page_count: usize,
    pub total: usize,
}

/// Returns page `page` (1-based) of `items`. Pages past the end are empty.
pub fn paginate<T: Clone>(items: &[T], page: usize) -> Page<T> {
    let page = page.max(1);
    let total = items.len();
    let start = (page - 1).saturating_mul(PAGE_SIZE).min(total);
    let end = start.saturating_add(PAGE_SIZE).min(total);
    Page {
        items: items[start..end].to_vec(),
        page,
        page_count: total.div_ceil(PAGE_SIZE),
        total,
    }
}
