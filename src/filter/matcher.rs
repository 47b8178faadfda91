//! Evaluates the filter language against JSON rows for stores that keep
//! their data in memory. Semantics follow the SQL the `Filter` generates:
//! comparisons against NULL are false, ascending sorts put NULLs last.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::types::{FilterData, FilterOp, SortDirection};

/// Filter, sort, and page `rows` according to `filter`.
pub fn apply<'r, I>(rows: I, filter: &FilterData) -> Result<Vec<Value>, FilterError>
where
    I: IntoIterator<Item = &'r Value>,
{
    let mut selected = Vec::new();
    for row in rows {
        let keep = match filter.where_clause {
            Some(ref where_data) => matches(row, where_data)?,
            None => true,
        };
        if keep {
            selected.push(row.clone());
        }
    }

    if let Some(ref order) = filter.order {
        let infos = FilterOrder::validate_and_parse(order)?;
        selected.sort_by(|a, b| {
            for info in &infos {
                let ord = sort_values(field(a, &info.column), field(b, &info.column));
                let ord = match info.sort {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }

    let offset = match filter.offset {
        Some(o) if o < 0 => return Err(FilterError::NegativeWindow("offset", o)),
        Some(o) => o as usize,
        None => 0,
    };
    let limit = match filter.limit {
        Some(l) if l < 0 => return Err(FilterError::NegativeWindow("limit", l)),
        Some(l) => l as usize,
        None => usize::MAX,
    };

    Ok(selected.into_iter().skip(offset).take(limit).collect())
}

/// Does `row` satisfy the where clause?
pub fn matches(row: &Value, where_data: &Value) -> Result<bool, FilterError> {
    let obj = match where_data {
        Value::Null => return Ok(true),
        Value::Object(obj) => obj,
        _ => return Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
    };

    for (key, value) in obj {
        let ok = match key.as_str() {
            "$and" => {
                let arr = value.as_array().ok_or_else(|| FilterError::InvalidOperatorData("$and requires array".to_string()))?;
                let mut all = true;
                for v in arr {
                    if !matches(row, v)? { all = false; break; }
                }
                all
            }
            "$or" => {
                let arr = value.as_array().ok_or_else(|| FilterError::InvalidOperatorData("$or requires array".to_string()))?;
                let mut any = false;
                for v in arr {
                    if matches(row, v)? { any = true; break; }
                }
                any
            }
            "$not" => !matches(row, value)?,
            op if op.starts_with('$') => return Err(FilterError::UnsupportedOperator(op.to_string())),
            column => field_matches(field(row, column), value)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn field<'a>(row: &'a Value, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&Value::Null)
}

fn field_matches(actual: &Value, condition: &Value) -> Result<bool, FilterError> {
    match condition {
        Value::Object(obj) if !obj.is_empty() && obj.keys().all(|k| k.starts_with('$')) => {
            for (op_key, op_val) in obj {
                let op = FilterOp::parse(op_key).ok_or_else(|| FilterError::UnsupportedOperator(op_key.clone()))?;
                if !apply_op(actual, op, op_val)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        other => apply_op(actual, FilterOp::Eq, other),
    }
}

fn apply_op(actual: &Value, op: FilterOp, expected: &Value) -> Result<bool, FilterError> {
    Ok(match op {
        FilterOp::Eq if expected.is_null() => actual.is_null(),
        FilterOp::Ne if expected.is_null() => !actual.is_null(),
        _ if actual.is_null() => false,
        FilterOp::Eq => values_equal(actual, expected),
        FilterOp::Ne => !values_equal(actual, expected),
        FilterOp::Gt => compare(actual, expected) == Some(Ordering::Greater),
        FilterOp::Gte => matches!(compare(actual, expected), Some(Ordering::Greater | Ordering::Equal)),
        FilterOp::Lt => compare(actual, expected) == Some(Ordering::Less),
        FilterOp::Lte => matches!(compare(actual, expected), Some(Ordering::Less | Ordering::Equal)),
        FilterOp::Like => like(actual, expected, false),
        FilterOp::ILike => like(actual, expected, true),
        FilterOp::In => match expected {
            Value::Array(values) => values.iter().any(|v| values_equal(actual, v)),
            other => values_equal(actual, other),
        },
        FilterOp::Between => match expected {
            Value::Array(bounds) if bounds.len() == 2 => {
                matches!(compare(actual, &bounds[0]), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(compare(actual, &bounds[1]), Some(Ordering::Less | Ordering::Equal))
            }
            _ => return Err(FilterError::InvalidOperatorData("$between requires array with 2 values".to_string())),
        },
    })
}

fn values_equal(a: &Value, b: &Value) -> bool {
    a == b || compare(a, b) == Some(Ordering::Equal)
}

fn as_instant(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::String(x), Value::String(y)) => match (as_instant(x), as_instant(y)) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => Some(x.cmp(y)),
        },
        _ => None,
    }
}

fn sort_values(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => compare(a, b).unwrap_or(Ordering::Equal),
    }
}

fn like(actual: &Value, pattern: &Value, case_insensitive: bool) -> bool {
    let (Some(text), Some(pattern)) = (actual.as_str(), pattern.as_str()) else {
        return false;
    };
    if case_insensitive {
        like_match(&text.to_lowercase().chars().collect::<Vec<_>>(), &pattern.to_lowercase().chars().collect::<Vec<_>>())
    } else {
        like_match(&text.chars().collect::<Vec<_>>(), &pattern.chars().collect::<Vec<_>>())
    }
}

// `%` matches any run, `_` matches one character.
fn like_match(text: &[char], pattern: &[char]) -> bool {
    let mut dp = vec![false; text.len() + 1];
    dp[0] = true;
    for &p in pattern {
        let mut next = vec![false; text.len() + 1];
        match p {
            '%' => {
                let mut seen = false;
                for i in 0..=text.len() {
                    seen |= dp[i];
                    next[i] = seen;
                }
            }
            _ => {
                for i in 1..=text.len() {
                    next[i] = dp[i - 1] && (p == '_' || text[i - 1] == p);
                }
            }
        }
        dp = next;
    }
    dp[text.len()]
}
