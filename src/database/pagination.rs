use serde::Serialize;

use super::form::{Form, QueryData};
use crate::constants::MAX_PAGE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    pub page: i64,
    pub limit: i64,
}

impl PageQuery {
    /// Reads `page` (1-based) and `limit`; out-of-range values fall back to defaults.
    pub fn from_form(form: &Form, default_limit: i64) -> Self {
        let page = form.get_number::<i64>("page").filter(|p| *p >= 1).unwrap_or(1);
        let limit = form
            .get_number::<i64>("limit")
            .filter(|l| (1..=MAX_PAGE_SIZE).contains(l))
            .unwrap_or(default_limit);

        Self { page, limit }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[derive(Serialize, Debug)]
pub struct PageContext<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> PageContext<T> {
    /// `extra` carries the filters of the current request into the page links.
    pub fn from_rows(
        rows: Vec<T>,
        total_rows: i64,
        query: PageQuery,
        base_url: &str,
        extra: &QueryData,
    ) -> Self {
        if rows.is_empty() {
            return Self::no_rows(total_rows);
        }

        let next = (query.page * query.limit < total_rows)
            .then(|| page_link(base_url, extra, query.page + 1, query.limit));
        let previous =
            (query.page > 1).then(|| page_link(base_url, extra, query.page - 1, query.limit));

        Self {
            count: total_rows,
            next,
            previous,
            results: rows,
        }
    }

    pub fn no_rows(total_rows: i64) -> Self {
        Self {
            count: total_rows,
            next: None,
            previous: None,
            results: vec![],
        }
    }
}

fn page_link(base_url: &str, extra: &QueryData, page: i64, limit: i64) -> String {
    let mut pairs: QueryData = extra
        .iter()
        .filter(|(k, _)| k != "page" && k != "limit")
        .cloned()
        .collect();
    // the first page is addressed without a page number
    if page > 1 {
        pairs.push(("page".to_string(), page.to_string()));
    }
    pairs.push(("limit".to_string(), limit.to_string()));

    match serde_urlencoded::to_string(&pairs) {
        Ok(query) => format!("{base_url}?{query}"),
        Err(e) => {
            log::warn!("Failed to encode page link: {e}");
            base_url.to_string()
        }
    }
}
