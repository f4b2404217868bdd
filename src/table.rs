use crate::problem::ProblemRecord;
use crate::store::{Flag, FlagStore};
use std::cmp::Ordering;
use strum::{Display, EnumString};
use tracing::{debug, warn};

pub const PAGE_SIZES: [usize; 4] = [5, 10, 20, 50];
pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub keyword: String,
    pub min_rating: f64,
    pub max_rating: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingBounds {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SortColumn {
    Completed,
    Name,
    #[default]
    Rating,
    Difficulty,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub completed: usize,
    pub remaining: usize,
}

/// One page of a table view.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<'a> {
    pub number: usize,
    pub size: usize,
    pub total: usize,
    pub rows: &'a [ProblemRecord],
}

impl RatingBounds {
    /// Observed bounds of `records`, unbounded when there are none.
    pub fn of(records: &[ProblemRecord]) -> Self {
        records.iter().fold(
            Self {
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            },
            |b, r| Self {
                min: b.min.min(r.rating),
                max: b.max.max(r.rating),
            },
        )
        .or_unbounded()
    }

    fn or_unbounded(self) -> Self {
        if self.min > self.max {
            Self {
                min: f64::NEG_INFINITY,
                max: f64::INFINITY,
            }
        } else {
            self
        }
    }

    pub fn contains(&self, rating: f64) -> bool {
        self.min <= rating && rating <= self.max
    }
}

impl Filter {
    pub fn new(keyword: impl Into<String>, min_rating: f64, max_rating: f64) -> Self {
        Self {
            keyword: keyword.into(),
            min_rating,
            max_rating,
        }
    }

    /// Empty keyword and the dataset's own rating range.
    pub fn cleared(records: &[ProblemRecord]) -> Self {
        let bounds = RatingBounds::of(records);
        Self::new("", bounds.min, bounds.max)
    }

    pub fn matches(&self, record: &ProblemRecord) -> bool {
        let bounds = RatingBounds {
            min: self.min_rating,
            max: self.max_rating,
        };
        bounds.contains(record.rating) && matches_keyword(record, &self.keyword.to_lowercase())
    }

    pub fn apply(&self, records: &[ProblemRecord]) -> Vec<ProblemRecord> {
        records.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

fn matches_keyword(record: &ProblemRecord, keyword: &str) -> bool {
    record.name.to_lowercase().contains(keyword)
        || record
            .difficulty
            .map(|d| d.to_string().to_lowercase().contains(keyword))
            .unwrap_or(false)
}

/// Records whose name or difficulty contains `keyword` (ignoring case) and
/// whose rating lies in `[min_rating, max_rating]`, in their original order.
pub fn filter(
    records: &[ProblemRecord],
    keyword: &str,
    min_rating: f64,
    max_rating: f64,
) -> Vec<ProblemRecord> {
    Filter::new(keyword, min_rating, max_rating).apply(records)
}

/// Stable sort by one column.
pub fn sort(records: &mut [ProblemRecord], column: SortColumn, order: SortOrder) {
    records.sort_by(|a, b| {
        let ord = compare(a, b, column);
        match order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        }
    });
}

/// Filter then sort. Missing rating bounds fall back to the dataset's own range.
pub fn view(
    records: &[ProblemRecord],
    keyword: &str,
    min_rating: Option<f64>,
    max_rating: Option<f64>,
    column: SortColumn,
    order: SortOrder,
) -> Vec<ProblemRecord> {
    let cleared = Filter::cleared(records);
    let filter = Filter::new(
        keyword,
        min_rating.unwrap_or(cleared.min_rating),
        max_rating.unwrap_or(cleared.max_rating),
    );
    let mut rows = filter.apply(records);
    sort(&mut rows, column, order);
    rows
}

fn compare(a: &ProblemRecord, b: &ProblemRecord, column: SortColumn) -> Ordering {
    match column {
        SortColumn::Completed => a.completed.cmp(&b.completed),
        SortColumn::Name => a
            .name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name)),
        SortColumn::Rating => a.rating.total_cmp(&b.rating),
        // unresolved difficulty sorts first
        SortColumn::Difficulty => a.difficulty.cmp(&b.difficulty),
    }
}

/// Flip `completed` on the record with `id` and persist the new flag.
///
/// Returns false when no record has that id. Persist failures are logged and
/// otherwise ignored; the in-memory state wins for the session.
pub fn toggle<S>(records: &mut [ProblemRecord], id: u32, store: &mut S) -> bool
where
    S: FlagStore + ?Sized,
{
    let Some(record) = records.iter_mut().find(|r| r.id == id) else {
        debug!(id, "toggle on unknown problem");
        return false;
    };
    record.completed = !record.completed;

    let flag = Flag::from_completed(record.completed);
    if let Err(e) = store.set(&id.to_string(), flag.as_str()) {
        warn!(id, error = %e, "failed to persist completion flag");
    }
    true
}

/// Whether `store` holds the flag matching `completed` for `id`.
pub fn is_persisted<S>(store: &S, id: u32, completed: bool) -> bool
where
    S: FlagStore + ?Sized,
{
    let expected = Flag::from_completed(completed).as_str();
    matches!(store.get(&id.to_string()), Ok(Some(flag)) if flag == expected)
}

impl Summary {
    pub fn of(records: &[ProblemRecord]) -> Self {
        let completed = records.iter().filter(|r| r.completed).count();
        Self {
            total: records.len(),
            completed,
            remaining: records.len() - completed,
        }
    }
}

pub fn parse_page_size(s: &str) -> Result<usize, String> {
    let size: usize = s.parse().map_err(|e| format!("{}", e))?;
    if PAGE_SIZES.contains(&size) {
        Ok(size)
    } else {
        Err(format!("page size must be one of {:?}", PAGE_SIZES))
    }
}

/// Slice out 1-based page `number`. Out of range pages are empty.
pub fn paginate(records: &[ProblemRecord], number: usize, size: usize) -> Page<'_> {
    let size = size.max(1);
    let start = number.saturating_sub(1).saturating_mul(size).min(records.len());
    let end = start.saturating_add(size).min(records.len());
    Page {
        number,
        size,
        total: records.len(),
        rows: if number == 0 { &[] } else { &records[start..end] },
    }
}

impl Page<'_> {
    /// `"11-20 of 42 problems"`
    pub fn range_label(&self) -> String {
        if self.rows.is_empty() {
            return format!("0 of {} problems", self.total);
        }
        let first = (self.number - 1) * self.size + 1;
        format!(
            "{}-{} of {} problems",
            first,
            first + self.rows.len() - 1,
            self.total
        )
    }
}
