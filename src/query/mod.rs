use serde::Deserialize;

use crate::config::QueryConfig;
use crate::resources::{ResourceDescriptor, DEFAULT_ORDER_COLUMN};

/// Raw query string as received. Everything is a string so malformed values
/// degrade to defaults instead of failing extraction.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub order_by: Option<String>,
    pub order_dir: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Upper bound on the page number. Pages past this point address rows no
/// deployment will ever hold, and keeping it small guarantees
/// `(page - 1) * limit` stays well inside i64.
const MAX_PAGE: i64 = 1_000_000;

/// Validated list parameters, ready for SQL generation.
#[derive(Debug, Clone)]
pub struct ListParams {
    pub page: i64,
    pub limit: i64,
    pub offset: i64,
    pub order_column: &'static str,
    pub order_dir: SortDirection,
    pub search: Option<String>,
}

impl ListParams {
    /// Parse and validate against one resource's descriptor. The policy
    /// everywhere is defensive defaults over rejection: out-of-range
    /// pagination clamps, an unlisted `order_by` degrades to the default
    /// column, search text is sanitized and truncated.
    pub fn resolve(query: &ListQuery, descriptor: &ResourceDescriptor, config: &QueryConfig) -> Self {
        let page = parse_positive(query.page.as_deref())
            .filter(|p| *p <= MAX_PAGE)
            .unwrap_or(1);
        let limit = parse_positive(query.limit.as_deref())
            .unwrap_or(config.default_limit)
            .min(config.max_limit);
        let offset = (page - 1) * limit;

        let order_column = query
            .order_by
            .as_deref()
            .and_then(|requested| {
                descriptor
                    .order_columns
                    .iter()
                    .copied()
                    .find(|allowed| *allowed == requested)
            })
            .unwrap_or(DEFAULT_ORDER_COLUMN);

        // Ascending only on the literal "asc"; anything else is descending.
        let order_dir = match query.order_dir.as_deref() {
            Some("asc") => SortDirection::Asc,
            _ => SortDirection::Desc,
        };

        let search = query
            .search
            .as_deref()
            .map(|s| sanitize_search(s, config.max_search_len))
            .filter(|s| !s.is_empty());

        Self {
            page,
            limit,
            offset,
            order_column,
            order_dir,
            search,
        }
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        if total <= 0 {
            0
        } else {
            (total + self.limit - 1) / self.limit
        }
    }
}

fn parse_positive(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| s.trim().parse::<i64>().ok()).filter(|n| *n >= 1)
}

/// Reduce free-text search input to a bounded character class: ASCII
/// letters/digits, space, hyphen, and the Arabic block, truncated to
/// `max_len` characters. Bounds both the injection surface and pathological
/// pattern cost before the text reaches an ILIKE predicate.
pub fn sanitize_search(input: &str, max_len: usize) -> String {
    input
        .chars()
        .filter(|c| {
            c.is_ascii_alphanumeric()
                || *c == ' '
                || *c == '-'
                || ('\u{0600}'..='\u{06FF}').contains(c)
        })
        .take(max_len)
        .collect::<String>()
        .trim()
        .to_string()
}
