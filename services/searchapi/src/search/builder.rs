//! SQL text generation for search queries.
//!
//! # Purpose
//! Translates a [`SearchInput`] plus the caller's access snapshot into the
//! SQL statement executed against `search.resources`. The builder is a pure
//! function of its inputs (including `now`), so the emitted text is stable
//! and tests assert it byte-for-byte.
//!
//! # Notes
//! Rendering mirrors the fixed grammar of the store: every comparison and
//! every boolean group carries its own parentheses; the top-level WHERE
//! joins its conjuncts without an extra outer pair. Literals are inlined
//! with quote escaping; the only bound parameter in the service is the seed
//! uid array of the relationship traversal.
use crate::api::types::{SearchFilter, SearchInput};
use crate::rbac::UserData;
use crate::search::access::rbac_clause;
use chrono::{DateTime, Duration, Months, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Items,
    Count,
    Uids,
}

/// A renderable boolean expression.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A single comparison; rendered inside its own parentheses.
    Comp(String),
    /// The literal NULL, the fail-closed position in the access predicate.
    Null,
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

impl Expr {
    pub fn comp(body: impl Into<String>) -> Expr {
        Expr::Comp(body.into())
    }

    pub fn render(&self) -> String {
        match self {
            Expr::Comp(body) => format!("({body})"),
            Expr::Null => "NULL".to_string(),
            Expr::And(children) if children.len() == 1 => children[0].render(),
            Expr::Or(children) if children.len() == 1 => children[0].render(),
            Expr::And(children) => format!("({})", join_rendered(children, " AND ")),
            Expr::Or(children) => format!("({})", join_rendered(children, " OR ")),
        }
    }
}

fn join_rendered(children: &[Expr], separator: &str) -> String {
    children
        .iter()
        .map(Expr::render)
        .collect::<Vec<_>>()
        .join(separator)
}

/// Render the WHERE clause body: conjuncts joined without an outer pair.
pub fn render_conjuncts(conjuncts: &[Expr]) -> String {
    join_rendered(conjuncts, " AND ")
}

/// Escape and single-quote a literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Postgres array literal with double-quoted elements.
pub fn array_literal(values: &[String]) -> String {
    let elements = values
        .iter()
        .map(|value| format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect::<Vec<_>>()
        .join(",");
    format!("'{{{elements}}}'")
}

/// Accessor for a data property in filter position.
fn data_ref(property: &str) -> String {
    format!("\"data\"->>'{property}'")
}

// Top-level columns are referenced directly; everything else lives in the
// jsonb document.
fn is_column(property: &str) -> bool {
    property == "cluster" || property == "uid"
}

const DATE_TOKENS: [&str; 5] = ["hour", "day", "week", "month", "year"];

fn date_cutoff(token: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match token {
        "hour" => Some(now - Duration::hours(1)),
        "day" => Some(now - Duration::days(1)),
        "week" => Some(now - Duration::days(7)),
        "month" => now.checked_sub_months(Months::new(1)),
        "year" => now.checked_sub_months(Months::new(12)),
        _ => None,
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

// Split a leading comparison operator off a filter value. Two-character
// operators are matched before their one-character prefixes.
fn split_operator(value: &str) -> Option<(&'static str, &str)> {
    for op in ["!=", ">=", "<=", "!", ">", "<", "="] {
        if let Some(rest) = value.strip_prefix(op) {
            return Some((op, rest));
        }
    }
    None
}

fn membership(property: &str, values: &[String], negated: bool) -> Expr {
    let keyword = if negated { "NOT IN" } else { "IN" };
    if is_column(property) {
        let list = values
            .iter()
            .map(|value| quote_literal(value))
            .collect::<Vec<_>>()
            .join(", ");
        return Expr::comp(format!("\"{property}\" {keyword} ({list})"));
    }
    // kind matches case-insensitively; the UI sends display casing while
    // the indexer stores the original.
    if property == "kind" && !negated {
        return Expr::comp(format!(
            "{} ILIKE ANY ({})",
            data_ref(property),
            array_literal(values)
        ));
    }
    let list = values
        .iter()
        .map(|value| quote_literal(value))
        .collect::<Vec<_>>()
        .join(", ");
    Expr::comp(format!("{} {keyword} ({list})", data_ref(property)))
}

/// Compile one filter into an expression. Returns None for a filter with no
/// usable values.
pub fn filter_expr(filter: &SearchFilter, now: DateTime<Utc>) -> Option<Expr> {
    let mut in_values: Vec<String> = Vec::new();
    let mut not_values: Vec<String> = Vec::new();
    let mut comparisons: Vec<Expr> = Vec::new();

    for raw in &filter.values {
        let value = raw.trim();
        if value.is_empty() {
            continue;
        }
        match split_operator(value) {
            Some(("!", rest)) | Some(("!=", rest)) => not_values.push(rest.to_lowercase()),
            Some(("=", rest)) => in_values.push(rest.to_lowercase()),
            Some((op, rest)) => comparisons.push(Expr::comp(format!(
                "{} {op} {}",
                data_ref(&filter.property),
                quote_literal(rest)
            ))),
            None => {
                if let Some(cutoff) = DATE_TOKENS
                    .contains(&value)
                    .then(|| date_cutoff(value, now))
                    .flatten()
                {
                    comparisons.push(Expr::comp(format!(
                        "{} > {}",
                        data_ref(&filter.property),
                        quote_literal(&format_timestamp(cutoff))
                    )));
                } else {
                    in_values.push(value.to_lowercase());
                }
            }
        }
    }

    let mut parts = Vec::new();
    if !in_values.is_empty() {
        parts.push(membership(&filter.property, &in_values, false));
    }
    if !not_values.is_empty() {
        parts.push(membership(&filter.property, &not_values, true));
    }
    parts.extend(comparisons);

    match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(Expr::Or(parts)),
    }
}

/// Keyword match against `jsonb_each_text(data)`. The literal keeps the
/// caller's casing; only plain filter values are lower-cased.
pub fn keyword_expr(keyword: &str) -> Expr {
    Expr::comp(format!(
        "\"value\" LIKE '%{}%'",
        keyword.replace('\'', "''")
    ))
}

fn limit_clause(limit: Option<i64>, default_limit: i64) -> String {
    match limit {
        Some(n) if n < 0 => String::new(),
        Some(n) => format!(" LIMIT {n}"),
        None => format!(" LIMIT {default_limit}"),
    }
}

/// Build the full statement for one search input in the given mode.
pub fn build_search_sql(
    input: &SearchInput,
    user: &UserData,
    mode: QueryMode,
    default_limit: i64,
    now: DateTime<Utc>,
) -> String {
    let select = match mode {
        QueryMode::Items => "SELECT DISTINCT \"uid\", \"cluster\", \"data\"",
        QueryMode::Count => "SELECT COUNT(\"uid\")",
        QueryMode::Uids => "SELECT \"uid\"",
    };
    let mut from = "\"search\".\"resources\"".to_string();
    if !input.keywords.is_empty() {
        from.push_str(", jsonb_each_text(\"data\")");
    }

    let mut conjuncts: Vec<Expr> = Vec::new();
    for filter in &input.filters {
        if let Some(expr) = filter_expr(filter, now) {
            conjuncts.push(expr);
        }
    }
    for keyword in &input.keywords {
        conjuncts.push(keyword_expr(keyword));
    }
    conjuncts.push(rbac_clause(user));

    let limit = match mode {
        QueryMode::Count => String::new(),
        _ => limit_clause(input.limit, default_limit),
    };

    format!(
        "{select} FROM {from} WHERE {}{limit}",
        render_conjuncts(&conjuncts)
    )
}
