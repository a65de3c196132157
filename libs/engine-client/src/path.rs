//! API path construction.
//!
//! Every endpoint call turns a logical path such as `/containers/json` into
//! the final request target: `<base>/v<version>/containers/json?<query>`.

use crate::version::strip_v_prefix;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::collections::BTreeMap;

/// Characters escaped inside a single path segment.
///
/// Unreserved characters and the sub-delimiters that are legal in a segment
/// stay literal; everything else (`%`, `^`, spaces, non-ASCII) is encoded.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=')
    .remove(b':')
    .remove(b'@');

/// Query parameters: each key maps to one or more values, keys encode sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query(BTreeMap<String, Vec<String>>);

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value for `key`, keeping values added earlier.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.entry(key.into()).or_default().push(value.into());
        self
    }

    /// Replace all values for `key` with `value`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(key.into(), vec![value.into()]);
        self
    }

    /// First value for `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    /// `true` when no key has a value
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    /// All `(key, value)` pairs, keys in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().flat_map(|(key, values)| {
            values
                .iter()
                .map(move |value| (key.as_str(), value.as_str()))
        })
    }

    /// Form-encode as `k=v&k2=v2` (no leading `?`).
    #[must_use]
    pub fn encode(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.iter())
            .finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Query
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut query = Query::new();
        for (key, value) in iter {
            query.append(key, value);
        }
        query
    }
}

/// Build the final request target for an API call.
///
/// With a version, `/v<version>` (leading `v` in `version` stripped) is
/// inserted between `base_path` and `path`. Segments are joined without
/// duplicate slashes, `.`/`..` are resolved, and each segment is
/// percent-encoded. An empty or absent query adds nothing, not even `?`.
#[must_use]
pub fn build_api_path(
    base_path: &str,
    version: Option<&str>,
    path: &str,
    query: Option<&Query>,
) -> String {
    let version_segment = version
        .map(strip_v_prefix)
        .filter(|v| !v.is_empty())
        .map(|v| format!("v{v}"));

    let mut segments: Vec<&str> = Vec::new();
    let parts = [base_path, version_segment.as_deref().unwrap_or(""), path];
    for segment in parts.iter().flat_map(|part| part.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut target = String::with_capacity(path.len() + base_path.len() + 8);
    for segment in &segments {
        target.push('/');
        target.extend(utf8_percent_encode(segment, PATH_SEGMENT));
    }
    if target.is_empty() {
        target.push('/');
    }

    if let Some(query) = query.filter(|q| !q.is_empty()) {
        target.push('?');
        target.push_str(&query.encode());
    }
    target
}
