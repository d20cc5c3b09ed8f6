//! Conditional request evaluation (`If-None-Match` / `If-Modified-Since`).

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use std::fmt;

/// Format used for `Last-Modified` and parsed from `If-Modified-Since`.
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Entity tag derived from a file's modification time and size.
///
/// Two snapshots of the same unchanged file always produce the same
/// validator; any change in mtime (at second resolution) or size produces a
/// different one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheValidator(String);

impl CacheValidator {
    pub fn for_asset(modified: DateTime<Utc>, size: u64) -> Self {
        Self(format!("\"{:x}-{:x}\"", modified.timestamp(), size))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of evaluating a request's conditional headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The client's copy is current; answer 304 without a body.
    NotModified,
    /// Serve the representation.
    Modified,
}

/// Decide whether the client's cached copy is still current.
///
/// `If-None-Match` wins when it matches. Otherwise `If-Modified-Since` is
/// honoured with one second of tolerance, since HTTP dates carry no
/// sub-second precision. Unparseable dates are ignored.
pub fn evaluate(
    headers: &HeaderMap,
    validator: &CacheValidator,
    modified: DateTime<Utc>,
) -> Freshness {
    if let Some(tags) = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
    {
        if etag_matches(tags, validator) {
            return Freshness::NotModified;
        }
    }

    if let Some(since) = headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_http_date)
    {
        if modified <= since + Duration::seconds(1) {
            return Freshness::NotModified;
        }
    }

    Freshness::Modified
}

fn etag_matches(header_value: &str, validator: &CacheValidator) -> bool {
    header_value.split(',').map(str::trim).any(|tag| {
        tag == "*" || tag == validator.as_str() || tag.strip_prefix("W/") == Some(validator.as_str())
    })
}

/// Render a timestamp as an IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn format_http_date(time: DateTime<Utc>) -> String {
    time.format(HTTP_DATE_FORMAT).to_string()
}

/// Parse an IMF-fixdate. Other legacy HTTP date formats are not accepted.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), HTTP_DATE_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}
