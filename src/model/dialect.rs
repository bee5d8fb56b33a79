// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Per-engine SQL differences: placeholder syntax, concurrency-token
//! generators, and `RETURNING` support.

use crate::error::ApiMakerError;

/// One of the three supported relational engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Postgres,
    MySQL,
    Oracle,
}

impl Dialect {
    /// Parse the `x-am-engine` value, case-insensitive.
    pub fn from_str(value: &str) -> Result<Self, ApiMakerError> {
        match value.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" => Ok(Self::MySQL),
            "oracle" => Ok(Self::Oracle),
            other => Err(ApiMakerError::Spec(format!("unknown engine: {other}"))),
        }
    }

    /// Render a bound parameter reference for `name`, wrapping it in the
    /// engine's date/time conversion function when `column_type` requires one.
    pub fn placeholder(&self, name: &str, column_type: &str) -> String {
        match self {
            Self::Postgres | Self::MySQL => format!("%({name})s"),
            Self::Oracle => match column_type {
                "date" => format!("TO_DATE(:{name},'YYYY-MM-DD')"),
                "date-time" => {
                    format!("TO_TIMESTAMP(:{name},'YYYY-MM-DD\"T\"HH24:MI:SS.FF')")
                }
                "time" => format!("TO_TIME(:{name},'HH24:MI:SS.FF')"),
                _ => format!(":{name}"),
            },
        }
    }

    /// Expression generating a new concurrency-token value for `version_type`.
    pub fn concurrency_generator(&self, version_type: &str, column_name: &str) -> String {
        match version_type {
            "uuid" => match self {
                Self::Postgres => "gen_random_uuid()".to_string(),
                Self::Oracle => "SYS_GUID()".to_string(),
                Self::MySQL => "UUID()".to_string(),
            },
            "timestamp" => "CURRENT_TIMESTAMP".to_string(),
            "serial" => format!("{column_name} + 1"),
            other => other.to_string(),
        }
    }

    /// Whether this engine supports `INSERT ... RETURNING`.
    pub const fn supports_returning(&self) -> bool {
        !matches!(self, Self::MySQL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_engines() {
        assert_eq!(Dialect::from_str("postgres").unwrap(), Dialect::Postgres);
        assert_eq!(Dialect::from_str("PostgreSQL").unwrap(), Dialect::Postgres);
        assert_eq!(Dialect::from_str("mysql").unwrap(), Dialect::MySQL);
        assert_eq!(Dialect::from_str("Oracle").unwrap(), Dialect::Oracle);
    }

    #[test]
    fn rejects_unknown_engine() {
        assert!(Dialect::from_str("clickhouse").is_err());
    }

    #[test]
    fn postgres_and_mysql_share_named_placeholder_syntax() {
        assert_eq!(Dialect::Postgres.placeholder("id", "integer"), "%(id)s");
        assert_eq!(Dialect::MySQL.placeholder("id", "integer"), "%(id)s");
    }

    #[test]
    fn oracle_wraps_date_time_columns() {
        assert_eq!(
            Dialect::Oracle.placeholder("d", "date"),
            "TO_DATE(:d,'YYYY-MM-DD')"
        );
        assert_eq!(
            Dialect::Oracle.placeholder("ts", "date-time"),
            "TO_TIMESTAMP(:ts,'YYYY-MM-DD\"T\"HH24:MI:SS.FF')"
        );
        assert_eq!(
            Dialect::Oracle.placeholder("t", "time"),
            "TO_TIME(:t,'HH24:MI:SS.FF')"
        );
        assert_eq!(Dialect::Oracle.placeholder("id", "integer"), ":id");
    }

    #[test]
    fn concurrency_generators_match_contract_table() {
        assert_eq!(
            Dialect::Postgres.concurrency_generator("uuid", "v"),
            "gen_random_uuid()"
        );
        assert_eq!(
            Dialect::Oracle.concurrency_generator("uuid", "v"),
            "SYS_GUID()"
        );
        assert_eq!(
            Dialect::MySQL.concurrency_generator("uuid", "v"),
            "UUID()"
        );
        assert_eq!(
            Dialect::Postgres.concurrency_generator("timestamp", "v"),
            "CURRENT_TIMESTAMP"
        );
        assert_eq!(
            Dialect::Postgres.concurrency_generator("serial", "v"),
            "v + 1"
        );
    }

    #[test]
    fn only_mysql_lacks_returning() {
        assert!(Dialect::Postgres.supports_returning());
        assert!(Dialect::Oracle.supports_returning());
        assert!(!Dialect::MySQL.supports_returning());
    }
}
