//! Cursor pagination types

use serde::{Deserialize, Serialize};

/// Opaque page position (an object id)
pub type Cursor = u64;

/// Largest page the API will return
pub const MAX_PAGE_SIZE: u32 = 200;

/// Cursor descriptor returned alongside list responses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub older_id: Option<Cursor>,
    #[serde(default)]
    pub newer_id: Option<Cursor>,
    #[serde(default)]
    pub future_id: Option<Cursor>,
    #[serde(default)]
    pub count: Option<u32>,
}

/// A decoded list page
#[derive(Debug, Clone)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub pagination: Option<Pagination>,
}

impl<T> ListResponse<T> {
    /// Cursor for the next older page, if the server reported one
    pub fn older_cursor(&self) -> Option<Cursor> {
        self.pagination.and_then(|p| p.older_id)
    }
}

/// Query options for list endpoints
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub count: Option<u32>,
    pub older_id: Option<Cursor>,
    pub newer_id: Option<Cursor>,
}

impl ListOptions {
    /// Options for a full-size first page
    pub fn first_page(count: u32) -> Self {
        Self {
            count: Some(count),
            ..Default::default()
        }
    }

    /// Same page size, positioned before `cursor`
    pub fn older_than(self, cursor: Cursor) -> Self {
        Self {
            older_id: Some(cursor),
            newer_id: None,
            ..self
        }
    }

    /// Render as query parameters; zero values are omitted
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(count) = self.count.filter(|c| *c > 0) {
            params.push(("count", count.to_string()));
        }
        if let Some(older) = self.older_id.filter(|c| *c > 0) {
            params.push(("older_id", older.to_string()));
        }
        if let Some(newer) = self.newer_id.filter(|c| *c > 0) {
            params.push(("newer_id", newer.to_string()));
        }
        params
    }
}
