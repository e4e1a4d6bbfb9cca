//! Line-level grammar of the OCCI text format.
//!
//! ```text
//! Category: compute;scheme="http://schemas.ogf.org/occi/infrastructure#";class="kind"
//! Link: </network/1>;rel="http://schemas.ogf.org/occi/infrastructure#network";self="/link/1";category="http://schemas.ogf.org/occi/infrastructure#networkinterface"
//! X-OCCI-Attribute: occi.compute.cores=2
//! X-OCCI-Location: /compute/1
//! ```
//!
//! Values are split on `;` (and attribute pairs on the first `=`) outside of
//! double quotes. Quoted values use `\"` and `\\` escapes; line breaks and
//! other control characters are written as `\n`, `\r`, `\t` or `\u{..}` so
//! every value stays on one line.

use super::headers::KeyGroup;
use occi_types::attribute::{AttributeDefinition, AttributeType};
use occi_types::error::{OcciError, OcciResult};
use occi_types::value::AttributeValue;
use serde_json::Value;

/// An attribute value as written on the wire, before typing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Quoted(String),
    Bare(String),
}

impl RawValue {
    /// Type the value. Quoted text is a string unless the definition asks for
    /// something else (JSON text for arrays/objects, numbers and booleans from
    /// their text form; text that does not convert stays a string). Bare text
    /// must be a number or a boolean.
    pub fn coerce(self, definition: Option<&AttributeDefinition>) -> OcciResult<AttributeValue> {
        match self {
            RawValue::Quoted(text) => {
                let coerced = match definition.map(AttributeDefinition::attr_type) {
                    Some(AttributeType::Array | AttributeType::Object) => {
                        let json: Value = serde_json::from_str(&text).map_err(|e| {
                            OcciError::Parsing(format!("value {text:?} is not valid JSON: {e}"))
                        })?;
                        AttributeValue::from_json(json)
                    }
                    Some(AttributeType::Number) => text
                        .trim()
                        .parse::<serde_json::Number>()
                        .ok()
                        .map(AttributeValue::Number),
                    Some(AttributeType::Boolean) => parse_bool(text.trim()).map(AttributeValue::Bool),
                    _ => None,
                };
                Ok(coerced.unwrap_or(AttributeValue::String(text)))
            }
            RawValue::Bare(text) => {
                if let Some(b) = parse_bool(&text) {
                    return Ok(AttributeValue::Bool(b));
                }
                text.parse::<serde_json::Number>()
                    .map(AttributeValue::Number)
                    .map_err(|_| {
                        OcciError::Parsing(format!(
                            "unquoted value {text:?} is neither a number nor a boolean"
                        ))
                    })
            }
        }
    }
}

impl RawValue {
    /// The text as written, without quotes.
    pub fn into_text(self) -> String {
        match self {
            RawValue::Quoted(s) | RawValue::Bare(s) => s,
        }
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Split `s` on `sep` where it is not inside double quotes.
pub fn split_outside_quotes(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == sep && !in_quotes => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Quote and escape a string value.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{{{:x}}}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Read a value token: quoted text is unescaped, anything else is bare.
pub fn read_value(token: &str) -> OcciResult<RawValue> {
    let token = token.trim();
    let Some(inner) = token.strip_prefix('"') else {
        if token.is_empty() {
            return Err(OcciError::Parsing("empty attribute value".to_string()));
        }
        return Ok(RawValue::Bare(token.to_string()));
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some('u') => out.push(read_unicode_escape(&mut chars, token)?),
                Some(next) => out.push(next),
                None => break,
            },
            '"' => {
                if chars.as_str().trim().is_empty() {
                    return Ok(RawValue::Quoted(out));
                }
                return Err(OcciError::Parsing(format!(
                    "unexpected text after closing quote in {token:?}"
                )));
            }
            other => out.push(other),
        }
    }
    Err(OcciError::Parsing(format!("unterminated quoted value {token:?}")))
}

/// Decode the `{hex}` part of a `\u{hex}` escape.
fn read_unicode_escape(chars: &mut std::str::Chars<'_>, token: &str) -> OcciResult<char> {
    let invalid = || OcciError::Parsing(format!("invalid \\u escape in {token:?}"));
    if chars.next() != Some('{') {
        return Err(invalid());
    }
    let hex: String = chars.by_ref().take_while(|c| *c != '}').collect();
    u32::from_str_radix(&hex, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(invalid)
}

/// Split `key=value` at the first `=`.
pub fn read_pair(token: &str) -> OcciResult<(String, RawValue)> {
    let (key, value) = token
        .split_once('=')
        .ok_or_else(|| OcciError::Parsing(format!("expected key=value, got {token:?}")))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(OcciError::Parsing(format!("missing key in {token:?}")));
    }
    Ok((key.to_string(), read_value(value)?))
}

/// Split `a{required immutable} b` on whitespace outside braces.
fn split_specs(s: &str) -> Vec<&str> {
    let mut specs = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 => {
                if let Some(from) = start.take() {
                    specs.push(&s[from..i]);
                }
                continue;
            }
            _ => {}
        }
        start.get_or_insert(i);
    }
    if let Some(from) = start {
        specs.push(&s[from..]);
    }
    specs
}

fn words(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

/// Split a line into its key group and value. Lines with keys outside the
/// four OCCI groups yield `None`.
pub fn read_line(line: &str) -> OcciResult<Option<(KeyGroup, &str)>> {
    let (key, value) = line
        .split_once(':')
        .ok_or_else(|| OcciError::Parsing(format!("line {line:?} has no key")))?;
    Ok(KeyGroup::of(key.trim()).map(|group| (group, value.trim())))
}

/// Attribute name with its `{required immutable}` annotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSpec {
    pub name: String,
    pub required: bool,
    pub immutable: bool,
}

impl AttributeSpec {
    fn parse(token: &str) -> OcciResult<Self> {
        let (name, flags) = match token.split_once('{') {
            None => (token, ""),
            Some((name, rest)) => {
                let flags = rest.strip_suffix('}').ok_or_else(|| {
                    OcciError::Parsing(format!("unterminated annotation in {token:?}"))
                })?;
                (name, flags)
            }
        };
        let flags: Vec<&str> = flags.split_whitespace().collect();
        Ok(Self {
            name: name.to_string(),
            required: flags.contains(&"required"),
            immutable: flags.contains(&"immutable"),
        })
    }

    fn render(&self) -> String {
        let flags: Vec<&str> = [
            self.required.then_some("required"),
            self.immutable.then_some("immutable"),
        ]
        .into_iter()
        .flatten()
        .collect();
        if flags.is_empty() {
            self.name.clone()
        } else {
            format!("{}{{{}}}", self.name, flags.join(" "))
        }
    }
}

/// Value of a `Category:` line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryLine {
    pub term: String,
    pub scheme: String,
    pub class: Option<String>,
    pub title: Option<String>,
    pub rel: Vec<String>,
    pub location: Option<String>,
    pub attributes: Vec<AttributeSpec>,
    pub actions: Vec<String>,
    pub applies: Vec<String>,
}

impl CategoryLine {
    pub fn parse(value: &str) -> OcciResult<Self> {
        let mut tokens = split_outside_quotes(value, ';').into_iter();
        let term = tokens.next().unwrap_or_default().trim().to_string();
        if term.is_empty() {
            return Err(OcciError::Parsing(format!("category {value:?} has no term")));
        }
        let mut line = CategoryLine {
            term,
            ..Default::default()
        };
        for token in tokens.filter(|t| !t.trim().is_empty()) {
            let (key, raw) = read_pair(token)?;
            let text = raw.into_text();
            match key.as_str() {
                "scheme" => line.scheme = text,
                "class" => line.class = Some(text),
                "title" => line.title = Some(text),
                "rel" => line.rel = words(&text),
                "location" => line.location = Some(text),
                "attributes" => {
                    line.attributes = split_specs(&text)
                        .into_iter()
                        .map(AttributeSpec::parse)
                        .collect::<OcciResult<_>>()?
                }
                "actions" => line.actions = words(&text),
                "applies" => line.applies = words(&text),
                other => tracing::debug!(param = other, "Ignoring unknown category parameter"),
            }
        }
        if line.scheme.is_empty() {
            return Err(OcciError::Parsing(format!(
                "category {:?} has no scheme",
                line.term
            )));
        }
        Ok(line)
    }

    pub fn identifier(&self) -> String {
        format!("{}{}", self.scheme, self.term)
    }

    pub fn render(&self) -> String {
        let mut out = format!("{};scheme={}", self.term, quote(&self.scheme));
        if let Some(class) = &self.class {
            out.push_str(&format!(";class={}", quote(class)));
        }
        if let Some(title) = &self.title {
            out.push_str(&format!(";title={}", quote(title)));
        }
        if !self.rel.is_empty() {
            out.push_str(&format!(";rel={}", quote(&self.rel.join(" "))));
        }
        if !self.applies.is_empty() {
            out.push_str(&format!(";applies={}", quote(&self.applies.join(" "))));
        }
        if let Some(location) = &self.location {
            out.push_str(&format!(";location={}", quote(location)));
        }
        if !self.attributes.is_empty() {
            let specs: Vec<String> = self.attributes.iter().map(AttributeSpec::render).collect();
            out.push_str(&format!(";attributes={}", quote(&specs.join(" "))));
        }
        if !self.actions.is_empty() {
            out.push_str(&format!(";actions={}", quote(&self.actions.join(" "))));
        }
        out
    }
}

/// Value of a `Link:` line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkLine {
    pub target: String,
    pub rel: Vec<String>,
    pub self_location: Option<String>,
    pub categories: Vec<String>,
    pub attributes: Vec<(String, RawValue)>,
}

impl LinkLine {
    pub fn parse(value: &str) -> OcciResult<Self> {
        let mut tokens = split_outside_quotes(value, ';').into_iter();
        let head = tokens.next().unwrap_or_default().trim();
        let target = head
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .ok_or_else(|| OcciError::Parsing(format!("link {value:?} has no <target>")))?;
        let mut line = LinkLine {
            target: target.trim().to_string(),
            ..Default::default()
        };
        for token in tokens.filter(|t| !t.trim().is_empty()) {
            let (key, raw) = read_pair(token)?;
            match key.as_str() {
                "rel" => line.rel = words(&raw.into_text()),
                "self" => line.self_location = Some(raw.into_text()),
                "category" => line.categories = words(&raw.into_text()),
                _ => line.attributes.push((key, raw)),
            }
        }
        if line.rel.is_empty() {
            return Err(OcciError::Parsing(format!("link {value:?} has no rel")));
        }
        Ok(line)
    }

    /// `rendered_attributes` are complete `name=value` tokens.
    pub fn render(&self, rendered_attributes: &[String]) -> String {
        let mut out = format!("<{}>;rel={}", self.target, quote(&self.rel.join(" ")));
        if let Some(location) = &self.self_location {
            out.push_str(&format!(";self={}", quote(location)));
        }
        if !self.categories.is_empty() {
            out.push_str(&format!(";category={}", quote(&self.categories.join(" "))));
        }
        for attr in rendered_attributes {
            out.push(';');
            out.push_str(attr);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_respects_quotes() {
        let parts = split_outside_quotes(r#"a;title="x;y";b"#, ';');
        assert_eq!(parts, vec!["a", r#"title="x;y""#, "b"]);
        let parts = split_outside_quotes(r#"t="a\";b";c"#, ';');
        assert_eq!(parts, vec![r#"t="a\";b""#, "c"]);
    }

    #[test]
    fn test_quote_and_read_value() {
        let quoted = quote(r#"say "hi" \o/"#);
        assert_eq!(
            read_value(&quoted).unwrap(),
            RawValue::Quoted(r#"say "hi" \o/"#.to_string())
        );
        assert_eq!(read_value("2").unwrap(), RawValue::Bare("2".into()));
        assert!(read_value(r#""\u{zz}""#).is_err());
        assert!(read_value(r#""open"#).is_err());
        assert!(read_value(r#""a" b"#).is_err());
    }

    #[test]
    fn test_control_characters_stay_on_one_line() {
        let value = "multi\nline\r\tend\u{7}";
        let quoted = quote(value);
        assert!(!quoted.contains('\n') && !quoted.contains('\r'));
        assert_eq!(quoted, r#""multi\nline\r\tend\u{7}""#);
        assert_eq!(read_value(&quoted).unwrap(), RawValue::Quoted(value.to_string()));
        assert_eq!(
            read_value(r#""a\\nb""#).unwrap(),
            RawValue::Quoted(r"a\nb".to_string())
        );
    }

    #[test]
    fn test_coerce() {
        let number = AttributeDefinition::new(AttributeType::Number);
        let array = AttributeDefinition::new(AttributeType::Array);
        assert_eq!(
            RawValue::Bare("2".into()).coerce(None).unwrap(),
            AttributeValue::from(2)
        );
        assert_eq!(
            RawValue::Bare("true".into()).coerce(None).unwrap(),
            AttributeValue::from(true)
        );
        assert!(matches!(
            RawValue::Bare("two".into()).coerce(None),
            Err(OcciError::Parsing(_))
        ));
        assert_eq!(
            RawValue::Quoted("4".into()).coerce(Some(&number)).unwrap(),
            AttributeValue::from(4)
        );
        assert_eq!(
            RawValue::Quoted("two".into()).coerce(Some(&number)).unwrap(),
            AttributeValue::from("two")
        );
        assert_eq!(
            RawValue::Quoted("[1,2]".into()).coerce(Some(&array)).unwrap(),
            AttributeValue::Array(vec![1.into(), 2.into()])
        );
        assert!(matches!(
            RawValue::Quoted("[1,".into()).coerce(Some(&array)),
            Err(OcciError::Parsing(_))
        ));
    }

    #[test]
    fn test_category_line() {
        let line = CategoryLine::parse(
            r#"compute;scheme="http://schemas.ogf.org/occi/infrastructure#";class="kind";title="Compute Resource";rel="http://schemas.ogf.org/occi/core#resource";location="/compute/";attributes="occi.compute.cores{required} occi.compute.state{immutable required} occi.compute.hostname";actions="http://schemas.ogf.org/occi/infrastructure/compute/action#start""#,
        )
        .unwrap();
        assert_eq!(line.identifier(), "http://schemas.ogf.org/occi/infrastructure#compute");
        assert_eq!(line.class.as_deref(), Some("kind"));
        assert_eq!(line.rel, vec!["http://schemas.ogf.org/occi/core#resource"]);
        assert_eq!(line.attributes.len(), 3);
        assert!(line.attributes[0].required && !line.attributes[0].immutable);
        assert!(line.attributes[1].required && line.attributes[1].immutable);
        assert!(!line.attributes[2].required);
        assert_eq!(line.actions.len(), 1);

        let reparsed = CategoryLine::parse(&line.render()).unwrap();
        assert_eq!(reparsed, line);
    }

    #[test]
    fn test_category_line_errors() {
        assert!(CategoryLine::parse(r#";scheme="http://a#""#).is_err());
        assert!(CategoryLine::parse("compute").is_err());
        assert!(CategoryLine::parse(r#"compute;scheme"#).is_err());
    }

    #[test]
    fn test_link_line() {
        let line = LinkLine::parse(
            r#"</network/1>;rel="http://schemas.ogf.org/occi/infrastructure#network";self="/link/networkinterface/n1";category="http://schemas.ogf.org/occi/infrastructure#networkinterface";occi.networkinterface.interface="eth0";occi.core.id="n1""#,
        )
        .unwrap();
        assert_eq!(line.target, "/network/1");
        assert_eq!(line.self_location.as_deref(), Some("/link/networkinterface/n1"));
        assert_eq!(line.categories.len(), 1);
        assert_eq!(line.attributes.len(), 2);
        assert!(LinkLine::parse(r#"/network/1;rel="x""#).is_err());
        assert!(LinkLine::parse("</network/1>").is_err());
    }

    #[test]
    fn test_read_line() {
        let (group, value) = read_line("Category: compute;scheme=\"x#\"").unwrap().unwrap();
        assert_eq!(group, KeyGroup::Category);
        assert_eq!(value, "compute;scheme=\"x#\"");
        assert!(read_line("Content-Type: text/plain").unwrap().is_none());
        assert!(read_line("garbage").is_err());
    }
}
