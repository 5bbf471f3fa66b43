//! Responses the harness produces itself.

use crate::embed::harness::{ERROR_HTML, ErrorPageVars};
use crate::error::CompileError;
use crate::utils::html::escape;
use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use std::fmt::Write;

/// Lines of source shown on each side of the error line.
const SOURCE_RADIUS: usize = 5;

/// HTTP 500 page describing `err`.
pub fn error_page(err: &CompileError) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        render_error_page(err),
    )
        .into_response()
}

pub fn render_error_page(err: &CompileError) -> String {
    let location = render_location(err);
    let meta = err
        .meta_error
        .as_deref()
        .map(|m| format!("<p class=\"meta\">{}</p>", escape(m)))
        .unwrap_or_default();
    let source = render_source(err);

    ERROR_HTML.render(&ErrorPageVars {
        title: &escape(&err.title),
        description: &escape(&err.description),
        location: &location,
        source: &source,
        meta: &meta,
    })
}

fn render_location(err: &CompileError) -> String {
    if err.path.is_empty() {
        return String::new();
    }
    let mut label = format!("{} ({})", err.path, err.source_type);
    if err.line > 0 {
        label = format!("{}:{} ({})", err.path, err.line, err.source_type);
    }
    match &err.link {
        Some(link) => format!(
            "<div class=\"location\"><a href=\"{}\">{}</a></div>",
            escape(link),
            escape(&label)
        ),
        None => format!("<div class=\"location\">{}</div>", escape(&label)),
    }
}

fn render_source(err: &CompileError) -> String {
    let lines = err.context_lines(SOURCE_RADIUS);
    if lines.is_empty() {
        return String::new();
    }
    let mut out = String::from("<table class=\"source\">\n");
    for (n, text) in lines {
        let class = if n == err.line { " class=\"error\"" } else { "" };
        let _ = writeln!(
            out,
            "<tr{class}><td class=\"line\">{n}</td><td>{}</td></tr>",
            escape(text)
        );
    }
    out.push_str("</table>");
    out
}

/// Empty 204, for favicon probes while the app is broken.
pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

pub fn plain(status: StatusCode, message: impl Into<String>) -> Response {
    let mut response = Response::new(Body::from(message.into()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
