//! Transport header handling for `text/occi`.
//!
//! Raw headers arrive under many spellings (`X-OCCI-Attribute`,
//! `HTTP_X_OCCI_ATTRIBUTE`, `X_occi_attribute`, ...). They are normalized,
//! checked for mixed notations, folded onto one canonical key per group and
//! finally rewritten as `Key: value` lines the line grammar understands.

use super::grammar::split_outside_quotes;
use occi_types::error::{OcciError, OcciResult};
use std::collections::BTreeMap;

/// Header map: key to values, in transport order.
pub type Headers = BTreeMap<String, Vec<String>>;

/// Prefix added by CGI-style servers.
pub const HTTP_PREFIX: &str = "HTTP_";

pub const LOCATION_KEYS: [&str; 4] = [
    "X-OCCI-Location",
    "X_occi_location",
    "X-occi-location",
    "Location",
];
pub const CATEGORY_KEYS: [&str; 4] = [
    "Category",
    "X-OCCI-Category",
    "X_occi_category",
    "X-occi-category",
];
pub const LINK_KEYS: [&str; 4] = ["Link", "X-OCCI-Link", "X_occi_link", "X-occi-link"];
pub const ATTRIBUTE_KEYS: [&str; 3] = [
    "X-OCCI-Attribute",
    "X_occi_attribute",
    "X-occi-attribute",
];

/// The four kinds of OCCI text lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyGroup {
    Location,
    Category,
    Link,
    Attribute,
}

impl KeyGroup {
    pub const ALL: [KeyGroup; 4] = [
        KeyGroup::Location,
        KeyGroup::Category,
        KeyGroup::Link,
        KeyGroup::Attribute,
    ];

    /// Every accepted spelling, canonical first.
    pub fn keys(&self) -> &'static [&'static str] {
        match self {
            KeyGroup::Location => &LOCATION_KEYS,
            KeyGroup::Category => &CATEGORY_KEYS,
            KeyGroup::Link => &LINK_KEYS,
            KeyGroup::Attribute => &ATTRIBUTE_KEYS,
        }
    }

    /// The key used on output.
    pub fn canonical(&self) -> &'static str {
        self.keys()[0]
    }

    /// Group of a key, compared case-insensitively.
    pub fn of(key: &str) -> Option<KeyGroup> {
        KeyGroup::ALL
            .into_iter()
            .find(|g| g.keys().iter().any(|k| k.eq_ignore_ascii_case(key)))
    }

    /// Group of an already normalized key, compared exactly.
    fn of_normalized(key: &str) -> Option<KeyGroup> {
        KeyGroup::ALL
            .into_iter()
            .find(|g| g.keys().contains(&key))
    }
}

/// First character upper case, the rest lower case.
fn capitalize(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Strip `HTTP_` prefixes, capitalize keys, drop blank values and keep only
/// keys that belong to an OCCI group. Raw keys that normalize to the same key
/// have their values concatenated.
pub fn normalize_headers(headers: &Headers) -> Headers {
    let mut normalized = Headers::new();
    for (key, values) in headers {
        let key = capitalize(key.strip_prefix(HTTP_PREFIX).unwrap_or(key.as_str()));
        if KeyGroup::of_normalized(&key).is_none() {
            continue;
        }
        let values: Vec<String> = values
            .iter()
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .collect();
        if values.is_empty() {
            continue;
        }
        normalized.entry(key).or_default().extend(values);
    }
    normalized
}

/// Fail when one group is present under more than one spelling.
pub fn validate_header_keys(headers: &Headers) -> OcciResult<()> {
    for group in KeyGroup::ALL {
        let used: Vec<&str> = headers
            .keys()
            .map(String::as_str)
            .filter(|k| group.keys().contains(k))
            .collect();
        if used.len() > 1 {
            return Err(OcciError::Parsing(format!(
                "Headers {used:?} contain mixed key notations"
            )));
        }
    }
    Ok(())
}

/// Rename normalized keys to their canonical spelling and split
/// comma-separated values (commas inside quotes are kept).
pub fn canonize_headers(headers: &Headers) -> OcciResult<Headers> {
    validate_header_keys(headers)?;
    let mut canonical = Headers::new();
    for (key, values) in headers {
        let Some(group) = KeyGroup::of_normalized(key) else {
            continue;
        };
        let entry = canonical.entry(group.canonical().to_string()).or_default();
        for value in values {
            entry.extend(
                split_outside_quotes(value, ',')
                    .into_iter()
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string),
            );
        }
    }
    Ok(canonical)
}

/// `Key: value` lines, sorted.
pub fn unify_headers(headers: &Headers) -> Vec<String> {
    let mut lines: Vec<String> = headers
        .iter()
        .flat_map(|(key, values)| values.iter().map(move |v| format!("{key}: {v}")))
        .collect();
    lines.sort();
    lines
}

/// Full pipeline from raw transport headers to text lines.
pub fn transform_headers(headers: &Headers) -> OcciResult<Vec<String>> {
    let normalized = normalize_headers(headers);
    Ok(unify_headers(&canonize_headers(&normalized)?))
}

/// Non-empty, trimmed lines of a `text/plain` body.
pub fn transform_body(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
