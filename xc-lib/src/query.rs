//! Search query construction using API v3 search tags.

use crate::error::{Result, XcError};

/// Filters for a recordings search. Build with the chained setters, then
/// [`SearchQuery::to_query_string`] produces the `query` parameter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchQuery {
    pub scientific_name: Option<String>,
    pub common_name: Option<String>,
    /// Quality filter, e.g. `A` or `">C"`.
    pub quality: Option<String>,
    pub country: Option<String>,
    /// A date (`2020-01-01`) or a number of days (`31`).
    pub since: Option<String>,
    /// Any other v3 tag, in insertion order.
    pub tags: Vec<(String, String)>,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scientific_name(mut self, name: impl Into<String>) -> Self {
        self.scientific_name = Some(name.into());
        self
    }

    pub fn common_name(mut self, name: impl Into<String>) -> Self {
        self.common_name = Some(name.into());
        self
    }

    pub fn quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn since(mut self, since: impl Into<String>) -> Self {
        self.since = Some(since.into());
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    /// Space-separated `tag:value` terms. Fails on an empty query.
    pub fn to_query_string(&self) -> Result<String> {
        let mut parts = Vec::new();

        if let Some(name) = non_empty(&self.scientific_name) {
            // "Genus species" maps onto the gen/sp tags, anything else is matched whole.
            match name.split_once(char::is_whitespace) {
                Some((genus, species)) => {
                    parts.push(format!("gen:{genus}"));
                    parts.push(format!("sp:{}", species.trim()));
                }
                None => parts.push(format!("sci:\"{name}\"")),
            }
        }
        if let Some(name) = non_empty(&self.common_name) {
            parts.push(term("en", name));
        }
        if let Some(q) = non_empty(&self.quality) {
            parts.push(format!("q:{q}"));
        }
        if let Some(country) = non_empty(&self.country) {
            parts.push(term("cnt", country));
        }
        if let Some(since) = non_empty(&self.since) {
            parts.push(format!("since:{since}"));
        }
        for (key, value) in &self.tags {
            if !value.is_empty() {
                parts.push(term(key, value));
            }
        }

        if parts.is_empty() {
            return Err(XcError::EmptyQuery);
        }
        Ok(parts.join(" "))
    }
}

/// Query for a single recording by catalogue number.
pub fn id_query(id: &str) -> String {
    format!("id:{}", id.trim_start_matches("XC").trim_start_matches("xc"))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// `key:value`, quoting the value when it contains spaces.
fn term(key: &str, value: &str) -> String {
    if value.contains(' ') {
        format!("{key}:\"{value}\"")
    } else {
        format!("{key}:{value}")
    }
}
