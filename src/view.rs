//! Table view state: current page, filter text and sort toggle.

use crate::query::PageRequest;
use crate::types::{SortDirection, SortField};

/// Rows per page when none is given.
pub const DEFAULT_PAGE_SIZE: usize = 5;

/// What a paginated company table is currently showing.
///
/// Feed it to [`Registry::load_view`](crate::Registry::load_view) to fetch
/// the matching page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableState {
    page: usize,
    page_size: usize,
    filter: String,
    sort: Option<(SortField, SortDirection)>,
    total_pages: usize,
}

impl TableState {
    pub fn new(page_size: usize) -> Self {
        Self {
            page: 1,
            page_size,
            filter: String::new(),
            sort: None,
            total_pages: 0,
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn sort(&self) -> Option<(SortField, SortDirection)> {
        self.sort
    }

    /// Page count from the last load.
    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    /// Change the filter text and go back to the first page.
    pub fn set_filter(&mut self, text: impl Into<String>) {
        self.filter = text.into();
        self.page = 1;
    }

    /// Cycle sorting on `field`: ascending, descending, unsorted.
    /// Picking a different field starts it ascending.
    pub fn toggle_sort(&mut self, field: SortField) {
        self.sort = match self.sort {
            Some((current, SortDirection::Asc)) if current == field => {
                Some((field, SortDirection::Desc))
            }
            Some((current, SortDirection::Desc)) if current == field => None,
            _ => Some((field, SortDirection::Asc)),
        };
    }

    /// Move to `page`. Pages outside `1..=total_pages` are ignored.
    pub fn go_to_page(&mut self, page: usize) -> bool {
        if page == 0 || page > self.total_pages {
            return false;
        }
        self.page = page;
        true
    }

    /// Clear filter and sort, keeping the page.
    pub fn reset(&mut self) {
        self.filter.clear();
        self.sort = None;
    }

    /// The request for the page currently shown.
    pub fn request(&self) -> PageRequest {
        let mut request = PageRequest::new(self.page, self.page_size);
        if !self.filter.is_empty() {
            request = request.with_filter(self.filter.clone());
        }
        if let Some((field, direction)) = self.sort {
            request = request.with_sort(field, direction);
        }
        request
    }

    /// Record the page count of a fresh load. Returns true when the current
    /// page fell past the end and was moved back to the last page.
    pub(crate) fn apply_total_pages(&mut self, total_pages: usize) -> bool {
        self.total_pages = total_pages;
        if total_pages > 0 && self.page > total_pages {
            self.page = total_pages;
            return true;
        }
        false
    }
}

impl Default for TableState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

/// One entry in a pagination bar.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageLink {
    Page(usize),
    /// Skipped pages between two links.
    Gap,
}

/// Links for a pagination bar: the first page, the pages either side of
/// `current`, and the last page, with gaps where pages are skipped.
pub fn page_window(current: usize, total: usize) -> Vec<PageLink> {
    if total == 0 {
        return Vec::new();
    }

    let mut pages = vec![1];
    let start = current.saturating_sub(1).max(2);
    let end = current.saturating_add(1).min(total - 1);
    pages.extend(start..=end);
    if total > 1 {
        pages.push(total);
    }

    let mut links = Vec::with_capacity(pages.len() + 2);
    let mut previous = 0;
    for page in pages {
        if previous > 0 && page > previous + 1 {
            links.push(PageLink::Gap);
        }
        links.push(PageLink::Page(page));
        previous = page;
    }
    links
}
