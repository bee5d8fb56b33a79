// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Crate-wide error type and its mapping to HTTP status codes.

use thiserror::Error;

/// Errors that can occur while compiling or executing an [`crate::operation::Operation`].
#[derive(Debug, Error)]
pub enum ApiMakerError {
    /// The OpenAPI document could not be parsed into a model, or a model
    /// lookup (schema, property, relation) failed.
    #[error("spec error: {0}")]
    Spec(String),

    /// The operation itself is malformed: unknown action, unknown property,
    /// a key supplied where it should not be, a missing required key.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An update or delete carried a concurrency token that did not match
    /// the row's current value.
    #[error("concurrency violation: {0}")]
    ConcurrencyViolation(String),

    /// An update or delete matched zero rows.
    #[error("no records were modified")]
    NoRecordsModified,

    /// The underlying database driver returned an error.
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl ApiMakerError {
    /// HTTP status code this error maps to, per the error taxonomy.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Spec(_) => 500,
            Self::BadRequest(_) => 400,
            Self::ConcurrencyViolation(_) => 400,
            Self::NoRecordsModified => 400,
            Self::Db(_) => 500,
        }
    }
}

pub type ApiMakerResult<T> = Result<T, ApiMakerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(ApiMakerError::Spec("x".into()).status_code(), 500);
        assert_eq!(ApiMakerError::BadRequest("x".into()).status_code(), 400);
        assert_eq!(
            ApiMakerError::ConcurrencyViolation("x".into()).status_code(),
            400
        );
        assert_eq!(ApiMakerError::NoRecordsModified.status_code(), 400);
    }

    #[test]
    fn display_messages_are_prefixed() {
        let err = ApiMakerError::BadRequest("unknown property: foo".into());
        assert_eq!(err.to_string(), "bad request: unknown property: foo");
    }
}
