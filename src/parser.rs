//! Combined-log-format line parser
//!
//! One static regex over the whole line, no grammar engine. A line either
//! yields a [`Hit`] or a [`ParseError`]; parse failures are per-line and
//! never stop ingestion.

use crate::hit::Hit;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Combined log format: client, ident, http-user, [timestamp],
/// "request-line", status, size, "referrer", "user-agent".
///
/// Only client, request-line, status and size are retained; the other
/// fields are consumed so the line as a whole is validated.
#[allow(clippy::expect_used)]
static LOG_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?x)^
        (\S+)\s+          # client
        (\S+)\s+          # ident
        (\S+)\s+          # http username
        \[([^\]]*)\]\s+   # timestamp
        "([^"]*)"\s+      # HTTP request line
        (\d+)\s+          # response status
        (\d+)\s+          # response size
        "([^"]*)"\s+      # referrer
        "([^"]*)"         # user agent
        "#,
    )
    .expect("access log pattern is valid")
});

/// Per-line parse failure. Recoverable: the line is dropped with a
/// diagnostic and the worker loop continues.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// The line does not match the access log grammar at all
    #[error("line does not match the access log format")]
    NoMatch,

    /// The line matched but its request-line has no path token
    #[error("request line has no path")]
    MissingPath,

    /// A numeric field matched the grammar but overflows its type
    #[error("{0} is out of range")]
    FieldRange(&'static str),
}

/// Parse one raw access-log line into a [`Hit`].
///
/// The path is the second whitespace-delimited token of the request-line
/// (the method is the first). A request-line with fewer than two tokens is
/// a soft failure: the line matched the grammar but yields no hit.
pub fn parse(line: &str) -> Result<Hit, ParseError> {
    let caps = LOG_LINE.captures(line).ok_or(ParseError::NoMatch)?;

    let client = caps.get(1).ok_or(ParseError::NoMatch)?.as_str();
    let request = caps.get(5).ok_or(ParseError::NoMatch)?.as_str();
    let status = caps.get(6).ok_or(ParseError::NoMatch)?.as_str();
    let size = caps.get(7).ok_or(ParseError::NoMatch)?.as_str();

    let path = request
        .split_whitespace()
        .nth(1)
        .ok_or(ParseError::MissingPath)?;

    let status: u16 = status
        .parse()
        .map_err(|_| ParseError::FieldRange("status"))?;
    let size: u64 = size.parse().map_err(|_| ParseError::FieldRange("size"))?;

    Ok(Hit {
        client: client.to_string(),
        url: path.to_string(),
        status: Some(status),
        size: Some(size),
    })
}
