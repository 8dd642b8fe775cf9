use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::extractors::RequestUrl;

#[derive(Serialize, Debug)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// A list response, either the bare records or a page envelope.
#[derive(Serialize, Debug)]
#[serde(untagged)]
pub enum Listing<T> {
    Plain(Vec<T>),
    Paged(Page<T>),
}

fn positive(raw: Option<&String>) -> Option<i64> {
    raw.and_then(|s| s.parse::<i64>().ok()).filter(|n| *n > 0)
}

#[derive(Deserialize, Debug, Default)]
pub struct LimitOffsetParams {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl LimitOffsetParams {
    /// The effective limit; `None` means the listing is not paginated.
    pub fn limit(&self, default_limit: Option<i64>) -> Option<i64> {
        positive(self.limit.as_ref()).or(default_limit)
    }

    pub fn offset(&self) -> i64 {
        self.offset
            .as_ref()
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|n| *n >= 0)
            .unwrap_or(0)
    }
}

/// Resolved limit/offset window for one request.
#[derive(Debug, Clone, Copy)]
pub struct LimitOffset {
    pub limit: Option<i64>,
    pub offset: i64,
}

impl LimitOffset {
    pub fn new(params: &LimitOffsetParams, default_limit: Option<i64>) -> Self {
        match params.limit(default_limit) {
            Some(limit) => Self {
                limit: Some(limit),
                offset: params.offset(),
            },
            None => Self {
                limit: None,
                offset: 0,
            },
        }
    }

    /// Values for `LIMIT ? OFFSET ?`; SQLite reads a negative limit as unbounded.
    pub fn sql_window(&self) -> (i64, i64) {
        (self.limit.unwrap_or(-1), self.offset)
    }

    pub fn paginate<T>(&self, url: &RequestUrl, count: i64, results: Vec<T>) -> Listing<T> {
        let Some(limit) = self.limit else {
            return Listing::Plain(results);
        };
        let offset = self.offset;

        // Both values come straight from the query string.
        let next = offset
            .checked_add(limit)
            .filter(|end| *end < count)
            .map(|end| url.with_param("offset", end));
        let previous = if offset <= 0 {
            None
        } else if offset.saturating_sub(limit) <= 0 {
            Some(url.without_param("offset"))
        } else {
            Some(url.with_param("offset", offset - limit))
        };

        Listing::Paged(Page {
            count,
            next,
            previous,
            results,
        })
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct PageNumberParams {
    pub page: Option<String>,
}

/// Resolved page-number window for one request.
#[derive(Debug, Clone, Copy)]
pub struct PageNumber {
    pub page: i64,
    pub page_size: i64,
    pub num_pages: i64,
}

impl PageNumber {
    /// Fails with 404 for pages that are not numbers or lie outside the listing.
    pub fn new(params: &PageNumberParams, count: i64, page_size: i64) -> Result<Self, AppError> {
        let page_size = page_size.max(1);
        let num_pages = ((count + page_size - 1) / page_size).max(1);

        let page = match params.page.as_deref() {
            None => 1,
            Some("last") => num_pages,
            Some(raw) => raw.parse::<i64>().map_err(|_| invalid_page())?,
        };
        if page < 1 || page > num_pages {
            return Err(invalid_page());
        }

        Ok(Self {
            page,
            page_size,
            num_pages,
        })
    }

    pub fn sql_window(&self) -> (i64, i64) {
        (self.page_size, (self.page - 1) * self.page_size)
    }

    pub fn paginate<T>(&self, url: &RequestUrl, count: i64, results: Vec<T>) -> Page<T> {
        let next = (self.page < self.num_pages).then(|| url.with_param("page", self.page + 1));
        let previous = match self.page {
            1 => None,
            2 => Some(url.without_param("page")),
            page => Some(url.with_param("page", page - 1)),
        };

        Page {
            count,
            next,
            previous,
            results,
        }
    }
}

fn invalid_page() -> AppError {
    AppError::NotFoundDetail("Invalid page.")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(query: &str) -> RequestUrl {
        RequestUrl::new(Some("testserver"), "/api/v1/posts/", Some(query))
    }

    #[test]
    fn unpaginated_without_limit() {
        let window = LimitOffset::new(&LimitOffsetParams::default(), None);
        assert_eq!(window.sql_window(), (-1, 0));
        assert!(matches!(
            window.paginate(&url(""), 3, vec![1, 2, 3]),
            Listing::Plain(v) if v.len() == 3
        ));
    }

    #[test]
    fn default_limit_applies_and_bad_values_fall_back() {
        let params = LimitOffsetParams {
            limit: Some("zero".into()),
            offset: Some("-4".into()),
        };
        let window = LimitOffset::new(&params, Some(5));
        assert_eq!(window.sql_window(), (5, 0));
    }

    #[test]
    fn limit_offset_links() {
        let params = LimitOffsetParams {
            limit: Some("2".into()),
            offset: Some("2".into()),
        };
        let window = LimitOffset::new(&params, None);
        let Listing::Paged(page) = window.paginate(&url("limit=2&offset=2"), 5, vec![3, 4]) else {
            panic!("expected a page");
        };
        assert_eq!(page.count, 5);
        assert_eq!(
            page.next.as_deref(),
            Some("http://testserver/api/v1/posts/?limit=2&offset=4")
        );
        assert_eq!(
            page.previous.as_deref(),
            Some("http://testserver/api/v1/posts/?limit=2")
        );
    }

    #[test]
    fn last_window_has_no_next() {
        let params = LimitOffsetParams {
            limit: Some("2".into()),
            offset: Some("4".into()),
        };
        let window = LimitOffset::new(&params, None);
        let Listing::Paged(page) = window.paginate(&url("limit=2&offset=4"), 5, vec![5]) else {
            panic!("expected a page");
        };
        assert!(page.next.is_none());
        assert_eq!(
            page.previous.as_deref(),
            Some("http://testserver/api/v1/posts/?limit=2&offset=2")
        );
    }

    #[test]
    fn extreme_windows_do_not_overflow() {
        let max = i64::MAX.to_string();
        let params = LimitOffsetParams {
            limit: Some(max.clone()),
            offset: Some("1".into()),
        };
        let window = LimitOffset::new(&params, None);
        let query = format!("limit={max}&offset=1");
        let Listing::Paged(page) = window.paginate(&url(&query), 3, vec![2, 3]) else {
            panic!("expected a page");
        };
        assert!(page.next.is_none());
        assert_eq!(
            page.previous,
            Some(format!("http://testserver/api/v1/posts/?limit={max}"))
        );

        let params = LimitOffsetParams {
            limit: Some("2".into()),
            offset: Some(max.clone()),
        };
        let window = LimitOffset::new(&params, None);
        let Listing::Paged(page) = window.paginate(&url(""), 3, Vec::<i32>::new()) else {
            panic!("expected a page");
        };
        assert!(page.next.is_none());
        assert_eq!(
            page.previous,
            Some(format!("http://testserver/api/v1/posts/?offset={}", i64::MAX - 2))
        );
    }

    #[test]
    fn page_numbers() {
        let params = PageNumberParams {
            page: Some("2".into()),
        };
        let window = PageNumber::new(&params, 25, 10).unwrap();
        assert_eq!(window.sql_window(), (10, 10));
        let page = window.paginate(&url("page=2"), 25, vec![0; 10]);
        assert_eq!(page.next.as_deref(), Some("http://testserver/api/v1/posts/?page=3"));
        assert_eq!(page.previous.as_deref(), Some("http://testserver/api/v1/posts/"));
    }

    #[test]
    fn invalid_pages() {
        for raw in ["0", "4", "abc"] {
            let params = PageNumberParams {
                page: Some(raw.into()),
            };
            assert!(PageNumber::new(&params, 25, 10).is_err());
        }
        let empty = PageNumber::new(&PageNumberParams::default(), 0, 10).unwrap();
        assert_eq!(empty.num_pages, 1);
        let last = PageNumber::new(&PageNumberParams { page: Some("last".into()) }, 25, 10).unwrap();
        assert_eq!(last.page, 3);
    }
}
