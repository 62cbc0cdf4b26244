//! Autocomplete: distinct observed values for one property.
use crate::api::types::SearchInput;
use crate::config::COMPLETE_LIMIT_FACTOR;
use crate::rbac::UserData;
use crate::search::access::rbac_clause;
use crate::search::builder::{Expr, filter_expr, render_conjuncts};
use crate::store::{Database, StoreError, StoreResult};
use chrono::{DateTime, Utc};

/// Distinct non-null values of `property`, scoped by the optional filters
/// and the caller's access predicate, in ascending order.
pub fn build_complete_sql(
    property: &str,
    query: &SearchInput,
    user: &UserData,
    default_limit: i64,
    now: DateTime<Utc>,
) -> String {
    let selector = if property == "cluster" {
        "\"cluster\"".to_string()
    } else {
        format!("\"data\"->>'{property}'")
    };

    let mut conjuncts: Vec<Expr> = Vec::new();
    for filter in &query.filters {
        if let Some(expr) = filter_expr(filter, now) {
            conjuncts.push(expr);
        }
    }
    conjuncts.push(Expr::comp(format!("{selector} IS NOT NULL")));
    if property == "cluster" {
        conjuncts.push(Expr::comp("\"cluster\" != ''"));
    }
    conjuncts.push(rbac_clause(user));

    let limit = match query.limit {
        Some(n) if n < 0 => String::new(),
        Some(n) => format!(" LIMIT {n}"),
        None => format!(" LIMIT {}", default_limit * COMPLETE_LIMIT_FACTOR),
    };

    format!(
        "SELECT DISTINCT {selector} FROM \"search\".\"resources\" WHERE {} ORDER BY {selector} ASC{limit}",
        render_conjuncts(&conjuncts)
    )
}

/// Run the autocomplete query and post-process the value list. When every
/// value parses as a number the response is `isNumber` plus the observed
/// range; when every value parses as a timestamp it is just `isDate`.
pub async fn resolve_complete(
    db: &dyn Database,
    property: &str,
    query: &SearchInput,
    user: &UserData,
    default_limit: i64,
    now: DateTime<Utc>,
) -> StoreResult<Vec<String>> {
    if property.is_empty() {
        return Err(StoreError::Query(
            "no property specified for autocomplete".to_string(),
        ));
    }
    let sql = build_complete_sql(property, query, user, default_limit, now);
    let values: Vec<String> = db
        .query_values(&sql)
        .await?
        .into_iter()
        .flatten()
        .filter(|value| !value.is_empty())
        .collect();

    if values.is_empty() {
        return Ok(values);
    }

    let numbers: Option<Vec<f64>> = values.iter().map(|v| v.parse::<f64>().ok()).collect();
    if let Some(numbers) = numbers {
        let (mut min_at, mut max_at) = (0usize, 0usize);
        for (index, number) in numbers.iter().enumerate() {
            if *number < numbers[min_at] {
                min_at = index;
            }
            if *number > numbers[max_at] {
                max_at = index;
            }
        }
        let mut result = vec!["isNumber".to_string(), values[min_at].clone()];
        if max_at != min_at {
            result.push(values[max_at].clone());
        }
        return Ok(result);
    }

    let all_dates = values
        .iter()
        .all(|value| DateTime::parse_from_rfc3339(value).is_ok());
    if all_dates {
        return Ok(vec!["isDate".to_string()]);
    }

    Ok(values)
}
