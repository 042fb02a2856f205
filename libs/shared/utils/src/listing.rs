use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub key: String,
    pub direction: SortDirection,
}

/// A comparable field value. Values of different kinds order by kind,
/// and `Missing` sorts after present values in either direction.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue<'a> {
    Text(&'a str),
    Number(f64),
    Flag(bool),
    Missing,
}

impl SortValue<'_> {
    fn rank(&self) -> u8 {
        match self {
            SortValue::Text(_) => 0,
            SortValue::Number(_) => 1,
            SortValue::Flag(_) => 2,
            SortValue::Missing => 3,
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortValue::Text(a), SortValue::Text(b)) => {
                // Case-insensitive first, like a locale compare, then raw for ties.
                a.to_lowercase()
                    .cmp(&b.to_lowercase())
                    .then_with(|| a.cmp(b))
            }
            (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
            (SortValue::Flag(a), SortValue::Flag(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Rows that can be shown in a directory view.
pub trait Listable {
    /// Fields matched by the free-text search box.
    fn search_fields(&self) -> Vec<&str>;

    /// Value used by equality filters such as `status` or `specialty`.
    fn filter_value(&self, field: &str) -> Option<&str>;

    fn sort_value(&self, key: &str) -> SortValue<'_>;
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

/// Filter, then sort, then paginate.
///
/// Changing the search text or any equality filter sends the view back to
/// page 1. Sorting keeps the current page.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    search: String,
    filters: BTreeMap<String, String>,
    sort: Option<SortState>,
    page: usize,
    page_size: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl ListQuery {
    pub fn new(page_size: usize) -> Self {
        Self {
            search: String::new(),
            filters: BTreeMap::new(),
            sort: None,
            page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn sort(&self) -> Option<&SortState> {
        self.sort.as_ref()
    }

    pub fn set_search(&mut self, text: &str) {
        let text = text.trim();
        if self.search != text {
            self.search = text.to_string();
            self.page = 1;
        }
    }

    /// `None` or an empty value clears the filter.
    pub fn set_filter(&mut self, field: &str, value: Option<&str>) {
        let changed = match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => self.filters.insert(field.to_string(), v.to_string()).as_deref() != Some(v),
            None => self.filters.remove(field).is_some(),
        };
        if changed {
            self.page = 1;
        }
    }

    /// Selecting the current key flips the direction, a new key starts ascending.
    pub fn toggle_sort(&mut self, key: &str) {
        self.sort = Some(match self.sort.take() {
            Some(current) if current.key == key => SortState {
                key: current.key,
                direction: current.direction.toggled(),
            },
            _ => SortState {
                key: key.to_string(),
                direction: SortDirection::Asc,
            },
        });
    }

    pub fn set_sort(&mut self, key: &str, direction: SortDirection) {
        self.sort = Some(SortState {
            key: key.to_string(),
            direction,
        });
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }

    pub fn with_search(mut self, text: &str) -> Self {
        self.set_search(text);
        self
    }

    pub fn with_filter(mut self, field: &str, value: Option<&str>) -> Self {
        self.set_filter(field, value);
        self
    }

    pub fn with_sort(mut self, key: &str, direction: SortDirection) -> Self {
        self.set_sort(key, direction);
        self
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.set_page(page);
        self
    }

    fn matches<T: Listable>(&self, item: &T) -> bool {
        let search_ok = self.search.is_empty() || {
            let needle = self.search.to_lowercase();
            item.search_fields()
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        };

        search_ok
            && self.filters.iter().all(|(field, wanted)| {
                item.filter_value(field)
                    .is_some_and(|value| value.eq_ignore_ascii_case(wanted))
            })
    }

    pub fn apply<'a, T: Listable>(&self, items: &'a [T]) -> Page<&'a T> {
        let mut rows: Vec<&T> = items.iter().filter(|item| self.matches(*item)).collect();

        if let Some(sort) = &self.sort {
            rows.sort_by(|a, b| {
                let (a, b) = (a.sort_value(&sort.key), b.sort_value(&sort.key));
                match (&a, &b) {
                    (SortValue::Missing, SortValue::Missing) => Ordering::Equal,
                    (SortValue::Missing, _) => Ordering::Greater,
                    (_, SortValue::Missing) => Ordering::Less,
                    _ => match sort.direction {
                        SortDirection::Asc => a.compare(&b),
                        SortDirection::Desc => a.compare(&b).reverse(),
                    },
                }
            });
        }

        let total_items = rows.len();
        let total_pages = total_items.div_ceil(self.page_size).max(1);
        let start = (self.page - 1).saturating_mul(self.page_size);

        let items: Vec<&T> = rows.into_iter().skip(start).take(self.page_size).collect();

        debug!(
            "List query matched {} rows, page {}/{} holds {}",
            total_items,
            self.page,
            total_pages,
            items.len()
        );

        Page {
            items,
            page: self.page,
            page_size: self.page_size,
            total_items,
            total_pages,
        }
    }
}
