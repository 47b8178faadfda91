use serde_json::Value;

use super::error::FilterError;
use super::filter::validate_identifier;
use super::types::{FilterOp, FilterWhereInfo, FilterWhereOptions};

/// Translates a JSON where clause into a parameterised SQL predicate.
pub struct FilterWhere<'a> {
    param_values: Vec<Value>,
    param_index: usize,
    options: &'a FilterWhereOptions,
}

impl<'a> FilterWhere<'a> {
    pub fn new(starting_param_index: usize, options: &'a FilterWhereOptions) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
            options,
        }
    }

    /// Returns an empty string when the clause has no conditions.
    pub fn generate(where_data: &Value, starting_param_index: usize, options: &FilterWhereOptions) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = FilterWhere::new(starting_param_index, options);
        let parts = filter_where.parse_where_data(where_data)?;
        Ok((parts.join(" AND "), filter_where.param_values))
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null | Value::Object(_) => Ok(()),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn parse_where_data(&mut self, where_data: &Value) -> Result<Vec<String>, FilterError> {
        match where_data {
            Value::Null => Ok(vec![]),
            Value::Object(obj) => {
                let mut parts = Vec::with_capacity(obj.len());
                for (key, value) in obj {
                    if key.starts_with('$') {
                        parts.push(self.parse_logical_operator(key, value)?);
                    } else {
                        parts.extend(self.parse_field_condition(key, value)?);
                    }
                }
                Ok(parts)
            }
            _ => Err(FilterError::InvalidWhereClause("Unsupported WHERE format".to_string())),
        }
    }

    fn parse_logical_operator(&mut self, op: &str, value: &Value) -> Result<String, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value.as_array().ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                if arr.is_empty() {
                    return Ok(if op == "$and" { "TRUE" } else { "FALSE" }.to_string());
                }
                let mut sql_parts = Vec::with_capacity(arr.len());
                for v in arr {
                    sql_parts.push(format!("({})", self.nested(v)?));
                }
                let joiner = if op == "$and" { " AND " } else { " OR " };
                Ok(format!("({})", sql_parts.join(joiner)))
            }
            "$not" => Ok(format!("NOT ({})", self.nested(value)?)),
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn nested(&mut self, value: &Value) -> Result<String, FilterError> {
        let (sql, params) = FilterWhere::generate(value, self.param_index, self.options)?;
        self.param_index += params.len();
        self.param_values.extend(params);
        Ok(if sql.is_empty() { "TRUE".to_string() } else { sql })
    }

    fn parse_field_condition(&mut self, field: &str, value: &Value) -> Result<Vec<String>, FilterError> {
        validate_identifier(field).map_err(FilterError::InvalidColumn)?;

        let mut parts = vec![];
        match value {
            Value::Object(obj) if obj.keys().all(|k| k.starts_with('$')) && !obj.is_empty() => {
                for (op_key, op_val) in obj {
                    let operator = FilterOp::parse(op_key)
                        .ok_or_else(|| FilterError::UnsupportedOperator(op_key.clone()))?;
                    let info = FilterWhereInfo { column: field.to_string(), operator, data: op_val.clone() };
                    parts.push(self.build_sql_condition(&info)?);
                }
            }
            // Implicit equality: { field: value }
            _ => {
                let info = FilterWhereInfo { column: field.to_string(), operator: FilterOp::Eq, data: value.clone() };
                parts.push(self.build_sql_condition(&info)?);
            }
        }
        Ok(parts)
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> Result<String, FilterError> {
        let column = condition.column.as_str();
        let quoted_column = format!("\"{}\"", column);
        let data = &condition.data;

        Ok(match condition.operator {
            FilterOp::Eq if data.is_null() => format!("{} IS NULL", quoted_column),
            FilterOp::Eq => format!("{} = {}", quoted_column, self.param(column, data.clone())),
            FilterOp::Ne if data.is_null() => format!("{} IS NOT NULL", quoted_column),
            FilterOp::Ne => format!("{} <> {}", quoted_column, self.param(column, data.clone())),
            FilterOp::Gt => format!("{} > {}", quoted_column, self.param(column, data.clone())),
            FilterOp::Gte => format!("{} >= {}", quoted_column, self.param(column, data.clone())),
            FilterOp::Lt => format!("{} < {}", quoted_column, self.param(column, data.clone())),
            FilterOp::Lte => format!("{} <= {}", quoted_column, self.param(column, data.clone())),
            FilterOp::Like => format!("{} LIKE {}", quoted_column, self.raw_param(data.clone())),
            FilterOp::ILike => format!("{} ILIKE {}", quoted_column, self.raw_param(data.clone())),
            FilterOp::In => match data {
                Value::Array(values) if values.is_empty() => "1=0".to_string(),
                Value::Array(values) => {
                    let params: Vec<String> = values.iter().map(|v| self.param(column, v.clone())).collect();
                    format!("{} IN ({})", quoted_column, params.join(", "))
                }
                other => format!("{} = {}", quoted_column, self.param(column, other.clone())),
            },
            FilterOp::Between => match data {
                Value::Array(values) if values.len() == 2 => {
                    let low = self.param(column, values[0].clone());
                    let high = self.param(column, values[1].clone());
                    format!("{} BETWEEN {} AND {}", quoted_column, low, high)
                }
                _ => return Err(FilterError::InvalidOperatorData("$between requires array with 2 values".to_string())),
            },
        })
    }

    fn param(&mut self, column: &str, value: Value) -> String {
        let placeholder = self.raw_param(value);
        match self.options.cast_for(column) {
            Some(cast) => format!("{}::{}", placeholder, cast),
            None => placeholder,
        }
    }

    fn raw_param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}
