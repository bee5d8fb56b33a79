// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Operator encoding: `query_params` values may be a plain scalar (implicit
//! equality) or a string of the form `<op>::<arg>`.

use serde_json::Value;

use crate::error::ApiMakerError;

/// A parsed `query_params` value.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    Eq(Value),
    Lt(Value),
    Le(Value),
    Gt(Value),
    Ge(Value),
    Ne(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Between(Value, Value),
    NotBetween(Value, Value),
}

impl Operator {
    /// `true` for every variant except [`Operator::Eq`]; mutating actions on
    /// a versioned entity may only use equality on the concurrency property.
    pub const fn is_equality(&self) -> bool {
        matches!(self, Self::Eq(_))
    }

    /// The SQL comparison keyword/operator for the single-value variants.
    pub const fn sql_operand(&self) -> &'static str {
        match self {
            Self::Eq(_) => "=",
            Self::Lt(_) => "<",
            Self::Le(_) => "<=",
            Self::Gt(_) => ">",
            Self::Ge(_) => ">=",
            Self::Ne(_) => "!=",
            Self::In(_) => "IN",
            Self::NotIn(_) => "NOT IN",
            Self::Between(_, _) => "BETWEEN",
            Self::NotBetween(_, _) => "NOT BETWEEN",
        }
    }
}

/// Parse a `query_params` value into an [`Operator`]. A plain (non-string,
/// or string without the `op::` prefix) value is implicit equality.
pub fn parse(value: &Value) -> Result<Operator, ApiMakerError> {
    let Some(s) = value.as_str() else {
        return Ok(Operator::Eq(value.clone()));
    };

    let Some((op, arg)) = s.split_once("::") else {
        return Ok(Operator::Eq(value.clone()));
    };

    match op {
        "lt" => Ok(Operator::Lt(Value::String(arg.to_string()))),
        "le" => Ok(Operator::Le(Value::String(arg.to_string()))),
        "eq" => Ok(Operator::Eq(Value::String(arg.to_string()))),
        "ne" => Ok(Operator::Ne(Value::String(arg.to_string()))),
        "gt" => Ok(Operator::Gt(Value::String(arg.to_string()))),
        "ge" => Ok(Operator::Ge(Value::String(arg.to_string()))),
        "in" => Ok(Operator::In(split_list(arg))),
        "not-in" => Ok(Operator::NotIn(split_list(arg))),
        "between" => {
            let (a, b) = split_pair(arg, "between")?;
            Ok(Operator::Between(a, b))
        }
        "not-between" => {
            let (a, b) = split_pair(arg, "not-between")?;
            Ok(Operator::NotBetween(a, b))
        }
        other => Err(ApiMakerError::BadRequest(format!(
            "invalid operator: {other}"
        ))),
    }
}

fn split_list(arg: &str) -> Vec<Value> {
    arg.split(',')
        .filter(|s| !s.is_empty())
        .map(|s| Value::String(s.to_string()))
        .collect()
}

fn split_pair(arg: &str, op: &str) -> Result<(Value, Value), ApiMakerError> {
    let mut parts = arg.split(',');
    let a = parts
        .next()
        .ok_or_else(|| ApiMakerError::BadRequest(format!("{op} requires two values")))?;
    let b = parts
        .next()
        .ok_or_else(|| ApiMakerError::BadRequest(format!("{op} requires two values")))?;
    Ok((Value::String(a.to_string()), Value::String(b.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_scalar_is_equality() {
        assert_eq!(parse(&Value::from(5)).unwrap(), Operator::Eq(Value::from(5)));
    }

    #[test]
    fn between_splits_two_values() {
        let op = parse(&Value::String("between::1200,1300".into())).unwrap();
        assert_eq!(
            op,
            Operator::Between(Value::String("1200".into()), Value::String("1300".into()))
        );
        assert_eq!(op.sql_operand(), "BETWEEN");
    }

    #[test]
    fn ne_is_a_recognized_operator() {
        let op = parse(&Value::String("ne::5".into())).unwrap();
        assert_eq!(op, Operator::Ne(Value::String("5".into())));
        assert!(!op.is_equality());
    }

    #[test]
    fn in_splits_comma_list() {
        let op = parse(&Value::String("in::1,2,3".into())).unwrap();
        assert_eq!(
            op,
            Operator::In(vec![
                Value::String("1".into()),
                Value::String("2".into()),
                Value::String("3".into())
            ])
        );
    }

    #[test]
    fn unknown_operator_is_bad_request() {
        assert!(parse(&Value::String("foo::1".into())).is_err());
    }
}
