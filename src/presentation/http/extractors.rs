//! Custom Extractors
//!
//! Axum extractors for request parsing.

use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};

use crate::application::dto::request::PageQuery;
use crate::shared::error::AppError;
use crate::shared::pagination::PageRequest;

/// `?page=&page_size=`, clamped to the allowed range.
#[derive(Debug, Clone, Copy)]
pub struct Pagination(pub PageRequest);

impl<S> FromRequestParts<S> for Pagination
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<PageQuery>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        Ok(Pagination(PageRequest::new(query.page, query.page_size)))
    }
}

/// Parse a Snowflake ID taken from the path.
pub fn parse_id(raw: &str, what: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid {} ID", what)))
}
