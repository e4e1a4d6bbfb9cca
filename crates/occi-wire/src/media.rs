//! Media types understood by the codecs.

use occi_types::error::{OcciError, OcciResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported wire media types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    /// `text/plain`: OCCI lines in the body.
    #[serde(rename = "text/plain")]
    TextPlain,
    /// `text/occi+plain`: same shape as `text/plain`.
    #[serde(rename = "text/occi+plain")]
    TextOcciPlain,
    /// `text/occi`: OCCI data carried in transport headers.
    #[serde(rename = "text/occi")]
    TextOcci,
    /// `text/uri-list`: newline-separated locations.
    #[serde(rename = "text/uri-list")]
    UriList,
    /// `application/json`
    #[serde(rename = "application/json")]
    Json,
}

impl MediaType {
    pub const ALL: [MediaType; 5] = [
        MediaType::TextPlain,
        MediaType::TextOcciPlain,
        MediaType::TextOcci,
        MediaType::UriList,
        MediaType::Json,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::TextPlain => "text/plain",
            MediaType::TextOcciPlain => "text/occi+plain",
            MediaType::TextOcci => "text/occi",
            MediaType::UriList => "text/uri-list",
            MediaType::Json => "application/json",
        }
    }

    /// OCCI text carried in the body.
    pub fn is_plain_text(&self) -> bool {
        matches!(self, MediaType::TextPlain | MediaType::TextOcciPlain)
    }

    /// OCCI text carried in headers.
    pub fn is_header_text(&self) -> bool {
        matches!(self, MediaType::TextOcci)
    }

    /// Any OCCI text shape (body or headers).
    pub fn is_occi_text(&self) -> bool {
        self.is_plain_text() || self.is_header_text()
    }

    pub fn is_json(&self) -> bool {
        matches!(self, MediaType::Json)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = OcciError;

    /// Parameters such as `; charset=utf-8` are ignored.
    fn from_str(s: &str) -> OcciResult<Self> {
        let essence = s.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        MediaType::ALL
            .into_iter()
            .find(|m| m.as_str() == essence)
            .ok_or_else(|| OcciError::Parsing(format!("media type {s:?} is not supported")))
    }
}
