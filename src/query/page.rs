//! Page requests and the filter/sort/slice pipeline.

use crate::error::{RegistryError, Result};
use crate::types::{Company, SortDirection, SortField};

/// Parameters of a page request. Pages are 1-based.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
    /// Matched against the director name only, case-insensitively.
    pub filter: Option<String>,
    pub sort: Option<(SortField, SortDirection)>,
}

impl PageRequest {
    pub fn new(page: usize, page_size: usize) -> Self {
        Self {
            page,
            page_size,
            filter: None,
            sort: None,
        }
    }

    pub fn with_filter(mut self, text: impl Into<String>) -> Self {
        self.filter = Some(text.into());
        self
    }

    pub fn with_sort(mut self, field: SortField, direction: SortDirection) -> Self {
        self.sort = Some((field, direction));
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(RegistryError::InvalidOperation(
                "Page size must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Filter, sort and slice `records`.
    ///
    /// Sorting is stable, so equal keys keep their input order in both
    /// directions. A page past the end (or page 0) comes back empty with the
    /// real page count.
    pub fn apply(&self, records: &[Company]) -> Result<Page> {
        self.validate()?;

        let needle = self
            .filter
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);

        let mut matched: Vec<&Company> = match &needle {
            Some(q) => records
                .iter()
                .filter(|c| c.director_full_name.to_lowercase().contains(q.as_str()))
                .collect(),
            None => records.iter().collect(),
        };

        if let Some((field, direction)) = self.sort {
            let mut keyed: Vec<(String, &Company)> = matched
                .into_iter()
                .map(|c| (c.field(field).to_lowercase(), c))
                .collect();

            keyed.sort_by(|a, b| match direction {
                SortDirection::Asc => a.0.cmp(&b.0),
                SortDirection::Desc => b.0.cmp(&a.0),
            });

            matched = keyed.into_iter().map(|(_, c)| c).collect();
        }

        let total_records = matched.len();
        let total_pages = total_records.div_ceil(self.page_size);

        let records = match self.page.checked_sub(1) {
            Some(index) => matched
                .into_iter()
                .skip(index.saturating_mul(self.page_size))
                .take(self.page_size)
                .cloned()
                .collect(),
            None => Vec::new(),
        };

        Ok(Page {
            records,
            total_pages,
            current_page: self.page,
            total_records,
        })
    }
}

/// One page of results.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page {
    pub records: Vec<Company>,
    pub total_pages: usize,
    /// Echo of the requested page.
    pub current_page: usize,
    /// Number of records that passed the filter.
    pub total_records: usize,
}

impl Page {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
