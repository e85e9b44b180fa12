//! The Graphite discovery query mini-language.
//!
//! Dashboards ask for tag values with URIs such as
//! `/metrics/find?query=tagv=host/os.cpu?dc=lon/max=10/filter=[web.*]`.
//! [`parse_query`] turns the raw URI into a [`ParsedQuery`] without doing any
//! I/O.
//!
//! The URI is percent-decoded once before parsing. `+` is left as is, so it
//! can be used as a quantifier inside `/filter=[..]`. Decoded values are
//! escaped again when the backend URL is built.

use crate::errors::QueryError;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use regex::Regex;
use std::sync::LazyLock;

const QUERY_MARKER: &str = "?query=";
const TAG_VALUES_KIND: &str = "tagv";

/// Everything but RFC 3986 unreserved characters
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Metrics may span several path segments
const METRIC_PATH: &AsciiSet = &COMPONENT.remove(b'/');

static MAX_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/max=([0-9]+)").expect("max token pattern is valid"));

// Greedy so that patterns containing character classes keep their brackets
static FILTER_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/filter=\[(.*)\]").expect("filter token pattern is valid"));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryKind {
    TagValues,
}

#[derive(Clone, Debug)]
pub struct ParsedQuery {
    pub kind: QueryKind,
    pub tag_key: String,
    pub metric: Option<String>,
    /// `k1=v1&k2=v2`, forwarded verbatim
    pub tag_filters: Option<String>,
    pub max_items: Option<usize>,
    /// Anchored, so `is_match` means the whole value matched
    pub filter: Option<Regex>,
}

impl ParsedQuery {
    /// Backend URL for this query under `base`.
    ///
    /// The tag key, metric and each filter key and value are escaped; the
    /// `&` and `=` separating the filters are kept in their original order.
    pub fn backend_url(&self, base: &str) -> String {
        let mut url = format!(
            "{}/api/tagv/{}",
            base.trim_end_matches('/'),
            utf8_percent_encode(&self.tag_key, COMPONENT)
        );
        if let Some(metric) = &self.metric {
            url.push('/');
            url.extend(utf8_percent_encode(metric, METRIC_PATH));
        }
        if let Some(tag_filters) = &self.tag_filters {
            url.push('?');
            for (i, pair) in tag_filters.split('&').enumerate() {
                if i > 0 {
                    url.push('&');
                }
                match pair.split_once('=') {
                    Some((key, value)) => {
                        url.extend(utf8_percent_encode(key, COMPONENT));
                        url.push('=');
                        url.extend(utf8_percent_encode(value, COMPONENT));
                    }
                    None => url.extend(utf8_percent_encode(pair, COMPONENT)),
                }
            }
        }
        url
    }
}

pub fn parse_query(raw_uri: &str) -> Result<ParsedQuery, QueryError> {
    let decoded = url_decode(raw_uri)?;

    let mut body = match decoded.find(QUERY_MARKER) {
        Some(index) => decoded[index + QUERY_MARKER.len()..].to_string(),
        None => return Err(QueryError::MissingQuery),
    };

    let mut max_items = None;
    if let Some(digits) = take_token(&MAX_TOKEN, &mut body) {
        max_items = Some(
            digits
                .parse::<usize>()
                .map_err(|_| QueryError::InvalidMaxItems(digits))?,
        );
    }

    let mut filter = None;
    if let Some(pattern) = take_token(&FILTER_TOKEN, &mut body) {
        filter = Some(Regex::new(&format!("^(?:{pattern})$"))?);
    }

    let (kind, remainder) = body
        .split_once('=')
        .ok_or_else(|| QueryError::Malformed(format!("no query kind in {body:?}")))?;
    if !kind.eq_ignore_ascii_case(TAG_VALUES_KIND) {
        return Err(QueryError::UnrecognizedKind(kind.to_string()));
    }

    let (tag_key, metric, tag_filters) = split_remainder(remainder)?;
    if tag_key.is_empty() {
        return Err(QueryError::Malformed(format!("empty tag key in {body:?}")));
    }

    Ok(ParsedQuery {
        kind: QueryKind::TagValues,
        tag_key: tag_key.to_string(),
        metric: metric.map(String::from),
        tag_filters: tag_filters.map(String::from),
        max_items,
        filter,
    })
}

/// Removes the first match of `token` from `body`, returning its first group
fn take_token(token: &Regex, body: &mut String) -> Option<String> {
    let (range, value) = token
        .captures(body)
        .map(|captures| (captures.get_match().range(), captures[1].to_string()))?;
    body.replace_range(range, "");
    Some(value)
}

type Remainder<'a> = (&'a str, Option<&'a str>, Option<&'a str>);

fn split_remainder(remainder: &str) -> Result<Remainder<'_>, QueryError> {
    if let Some((path, tag_filters)) = remainder.split_once('?') {
        let (tag_key, metric) = path.split_once('/').ok_or_else(|| {
            QueryError::Malformed(format!("tag filters without a metric in {remainder:?}"))
        })?;
        if metric.is_empty() {
            return Err(QueryError::Malformed(format!(
                "empty metric in {remainder:?}"
            )));
        }
        return Ok((tag_key, Some(metric), Some(tag_filters)));
    }

    match remainder.split_once('/') {
        None => Ok((remainder, None, None)),
        Some((_, "")) => Err(QueryError::Malformed(format!(
            "empty metric in {remainder:?}"
        ))),
        Some((tag_key, metric)) => Ok((tag_key, Some(metric), None)),
    }
}

fn url_decode(raw: &str) -> Result<String, QueryError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| QueryError::InvalidEncoding)
}
