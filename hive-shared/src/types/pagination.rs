use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u64 = 30;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

fn default_page() -> u64 { 1 }
fn default_page_size() -> u64 { DEFAULT_PAGE_SIZE }

impl PaginationParams {
    pub fn new(page: u64, page_size: u64) -> Self {
        Self { page, page_size }
    }

    /// Page number, never below 1.
    pub fn page(&self) -> u64 {
        self.page.max(1)
    }

    /// Saturates instead of overflowing; never exceeds `i64::MAX` so it can
    /// be bound as a SQL OFFSET.
    pub fn offset(&self) -> u64 {
        (self.page() - 1).saturating_mul(self.limit()).min(i64::MAX as u64)
    }

    pub fn limit(&self) -> u64 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, page_size: DEFAULT_PAGE_SIZE }
    }
}

/// One page of results plus the total count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub count: u64,
    pub page: u64,
    pub page_size: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, count: u64, params: &PaginationParams) -> Self {
        Self {
            items,
            count,
            page: params.page(),
            page_size: params.limit(),
        }
    }

    /// Slice an already-filtered, already-ordered collection.
    pub fn from_vec(all: Vec<T>, params: &PaginationParams) -> Self {
        let count = all.len() as u64;
        let items = all
            .into_iter()
            .skip(params.offset() as usize)
            .take(params.limit() as usize)
            .collect();
        Self::new(items, count, params)
    }

    pub fn has_next(&self) -> bool {
        self.page.saturating_mul(self.page_size) < self.count
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            count: self.count,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// Paginated success envelope: `{success, status_code, message?, data, count, next, previous}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Paginated<T: Serialize> {
    pub success: bool,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: Vec<T>,
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
}

impl<T: Serialize> Paginated<T> {
    /// `base_path` is the request path without query string; links keep it relative.
    pub fn new(page: Page<T>, base_path: &str) -> Self {
        Self::with_query(page, base_path, None)
    }

    /// Like [`Paginated::new`], but links carry every parameter of `query`
    /// other than `page` and `page_size`, so filters survive paging.
    pub fn with_query(page: Page<T>, base_path: &str, query: Option<&str>) -> Self {
        let kept: Vec<&str> = query
            .unwrap_or_default()
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter(|pair| {
                let key = pair.split('=').next().unwrap_or_default();
                key != "page" && key != "page_size"
            })
            .collect();
        let prefix = if kept.is_empty() { String::new() } else { format!("{}&", kept.join("&")) };
        let link = |n: u64| format!("{base_path}?{prefix}page={n}&page_size={}", page.page_size);
        let next = page.has_next().then(|| link(page.page.saturating_add(1)));
        let previous = page.has_previous().then(|| link(page.page - 1));
        Self {
            success: true,
            status_code: StatusCode::OK.as_u16(),
            message: None,
            data: page.items,
            count: page.count,
            next,
            previous,
        }
    }
}

impl<T: Serialize> IntoResponse for Paginated<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_clamped() {
        let params = PaginationParams::new(0, 500);
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), MAX_PAGE_SIZE);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn links_follow_position() {
        let params = PaginationParams::new(2, 10);
        let page = Page::from_vec((0..25).collect::<Vec<u32>>(), &params);
        assert_eq!(page.items, (10..20).collect::<Vec<u32>>());

        let envelope = Paginated::new(page, "/projects");
        assert_eq!(envelope.count, 25);
        assert_eq!(envelope.next.as_deref(), Some("/projects?page=3&page_size=10"));
        assert_eq!(envelope.previous.as_deref(), Some("/projects?page=1&page_size=10"));
    }

    #[test]
    fn last_page_has_no_next() {
        let params = PaginationParams::new(3, 10);
        let page = Page::from_vec((0..25).collect::<Vec<u32>>(), &params);
        assert_eq!(page.items.len(), 5);
        let envelope = Paginated::new(page, "/projects");
        assert!(envelope.next.is_none());
    }

    #[test]
    fn huge_page_numbers_do_not_overflow() {
        let params = PaginationParams::new(u64::MAX, 100);
        assert_eq!(params.offset(), i64::MAX as u64);

        let page = Page::new(Vec::<u32>::new(), 10, &params);
        assert!(!page.has_next());
        let envelope = Paginated::new(page, "/projects");
        assert!(envelope.next.is_none());
        assert!(envelope.previous.is_some());
    }

    #[test]
    fn links_keep_filters() {
        let params = PaginationParams::new(1, 30);
        let page = Page::from_vec((0..100).collect::<Vec<u32>>(), &params);
        let envelope = Paginated::with_query(page, "/projects", Some("status=OPEN&page=1&tags=rust&page_size=30"));
        assert_eq!(
            envelope.next.as_deref(),
            Some("/projects?status=OPEN&tags=rust&page=2&page_size=30")
        );
        assert!(envelope.previous.is_none());
    }

    #[test]
    fn empty_query_keeps_plain_links() {
        let params = PaginationParams::new(2, 10);
        let page = Page::from_vec((0..25).collect::<Vec<u32>>(), &params);
        let envelope = Paginated::with_query(page, "/credits/ledger", Some(""));
        assert_eq!(envelope.next.as_deref(), Some("/credits/ledger?page=3&page_size=10"));
    }

    #[test]
    fn defaults_when_query_is_empty() {
        let params: PaginationParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), DEFAULT_PAGE_SIZE);
    }
}
