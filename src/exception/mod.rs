//! The top-level failure boundary of the dispatcher
//!
//! Every failure raised while serving a request ends up in one
//! [`ExceptionFilter`], which turns it into the response the client sees.

use crate::error::TrellisError;
use crate::template::escape_html;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

/// Turns a failed request into a response.
pub trait ExceptionFilter: Send + Sync + 'static {
    fn catch(&self, error: &anyhow::Error) -> Response;
}

/// Writes the failure and its cause chain into the page. Meant for development.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiagnosticFilter;

impl ExceptionFilter for DiagnosticFilter {
    fn catch(&self, error: &anyhow::Error) -> Response {
        let mut body = String::from("<pre>\n");
        if let Some(kind) = error.downcast_ref::<TrellisError>() {
            if kind.is_configuration() {
                body.push_str("Configuration error\n\n");
            }
        }
        body.push_str(&escape_html(&format!("{:?}", error)));
        body.push_str("\n</pre>\n");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            body,
        )
            .into_response()
    }
}

/// Hides every internal detail from the client.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProductionFilter;

impl ExceptionFilter for ProductionFilter {
    fn catch(&self, _error: &anyhow::Error) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}
