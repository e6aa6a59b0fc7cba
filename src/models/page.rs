use serde::{Deserialize, Serialize};

/// One page of a paged list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u32,
    pub last: bool,
}

impl<T> Page<T> {
    /// Index of the page that follows this one, or `None` once the server reports
    /// the last page.
    pub fn next_page(&self) -> Option<u32> {
        if self.last {
            None
        } else {
            Some(self.page + 1)
        }
    }
}
