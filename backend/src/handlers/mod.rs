//! HTTP handlers for the Stock Back Office

use axum::{http::header, response::IntoResponse, response::Response};
use serde::Deserialize;

use crate::models::Pagination;
use crate::AppState;

pub mod catalog;
pub mod health;
pub mod movement;
pub mod reporting;
pub mod stock;

pub use catalog::*;
pub use health::*;
pub use movement::*;
pub use reporting::*;
pub use stock::*;

/// Search and paging parameters shared by catalog listings
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Pagination bounded by the configured page sizes
pub(crate) fn pagination(state: &AppState, page: Option<u32>, per_page: Option<u32>) -> Pagination {
    Pagination::new(
        page,
        per_page,
        state.config.ledger.default_page_size,
        state.config.ledger.max_page_size,
    )
}

pub(crate) fn wants_csv(format: Option<&str>) -> bool {
    format.is_some_and(|f| f.eq_ignore_ascii_case("csv"))
}

pub(crate) fn csv_attachment(filename: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}
