//! Grok pattern extraction
//!
//! `regular` is a regular expression that may reference named library
//! patterns: `%{SYNTAX}` matches the pattern anonymously, `%{SYNTAX:name}`
//! captures it into column `name` (an optional third `:type` part is accepted
//! and ignored, column types come from the row schema). Plain named groups
//! `(?P<name>...)` work as well.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::{Captures, Regex};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::{DecodeError, FormatType, RowDeserializer, kind_of, project};
use crate::schema::{Row, RowSchema};

/// Nesting limit for pattern references
const MAX_DEPTH: usize = 16;

const LIBRARY: &[(&str, &str)] = &[
    ("USERNAME", r"[a-zA-Z0-9._-]+"),
    ("USER", r"%{USERNAME}"),
    ("INT", r"(?:[+-]?(?:[0-9]+))"),
    ("BASE10NUM", r"(?:[+-]?(?:[0-9]+(?:\.[0-9]+)?|\.[0-9]+))"),
    ("NUMBER", r"(?:%{BASE10NUM})"),
    ("BASE16NUM", r"(?:0[xX])?[0-9A-Fa-f]+"),
    ("POSINT", r"\b(?:[1-9][0-9]*)\b"),
    ("NONNEGINT", r"\b(?:[0-9]+)\b"),
    ("WORD", r"\b\w+\b"),
    ("NOTSPACE", r"\S+"),
    ("SPACE", r"\s*"),
    ("DATA", r".*?"),
    ("GREEDYDATA", r".*"),
    ("QUOTEDSTRING", r#""(?:[^"\\]|\\.)*""#),
    ("UUID", r"[A-Fa-f0-9]{8}-(?:[A-Fa-f0-9]{4}-){3}[A-Fa-f0-9]{12}"),
    (
        "IPV4",
        r"(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)",
    ),
    ("IP", r"%{IPV4}"),
    (
        "HOSTNAME",
        r"\b(?:[0-9A-Za-z][0-9A-Za-z-]{0,62})(?:\.(?:[0-9A-Za-z][0-9A-Za-z-]{0,62}))*\b",
    ),
    ("IPORHOST", r"(?:%{IP}|%{HOSTNAME})"),
    ("HOSTPORT", r"%{IPORHOST}:%{POSINT}"),
    ("PATH", r"(?:/[^/\s]*)+"),
    ("URIPATH", r"(?:/[A-Za-z0-9$.+!*'(){},~:;=@#%&_\-]*)+"),
    (
        "LOGLEVEL",
        r"(?:[Tt]race|TRACE|[Dd]ebug|DEBUG|[Nn]otice|NOTICE|[Ii]nfo|INFO|[Ww]arn(?:ing)?|WARN(?:ING)?|[Ee]rr(?:or)?|ERR(?:OR)?|[Cc]rit(?:ical)?|CRIT(?:ICAL)?|[Ff]atal|FATAL|[Ss]evere|SEVERE)",
    ),
    ("YEAR", r"(?:\d\d){1,2}"),
    ("MONTHNUM", r"(?:0?[1-9]|1[0-2])"),
    ("MONTHDAY", r"(?:(?:0[1-9])|(?:[12][0-9])|(?:3[01])|[1-9])"),
    ("HOUR", r"(?:2[0123]|[01]?[0-9])"),
    ("MINUTE", r"(?:[0-5][0-9])"),
    ("SECOND", r"(?:(?:[0-5]?[0-9]|60)(?:[:.,][0-9]+)?)"),
    ("TIME", r"%{HOUR}:%{MINUTE}(?::%{SECOND})?"),
    ("ISO8601_TIMEZONE", r"(?:Z|[+-]%{HOUR}(?::?%{MINUTE}))"),
    (
        "TIMESTAMP_ISO8601",
        r"%{YEAR}-%{MONTHNUM}-%{MONTHDAY}[T ]%{HOUR}:?%{MINUTE}(?::?%{SECOND})?%{ISO8601_TIMEZONE}?",
    ),
];

static PATTERNS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| LIBRARY.iter().copied().collect());

// %{SYNTAX}, %{SYNTAX:name} or %{SYNTAX:name:type}
static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%\{([^}:]+)(?::([^}:]+))?(?::[^}:]+)?\}").expect("grok reference pattern is valid")
});

/// Errors compiling a grok expression
#[derive(Debug, Error)]
pub enum GrokError {
    #[error("Unknown grok pattern '{0}'")]
    UnknownPattern(String),

    #[error("Grok patterns nested deeper than {} levels", MAX_DEPTH)]
    TooDeep,

    #[error(transparent)]
    Regex(#[from] regex::Error),
}

/// Expand every `%{...}` reference into plain regex syntax
pub fn expand(pattern: &str) -> Result<String, GrokError> {
    expand_at(pattern, 0)
}

fn expand_at(pattern: &str, depth: usize) -> Result<String, GrokError> {
    if depth > MAX_DEPTH {
        return Err(GrokError::TooDeep);
    }
    let mut out = String::with_capacity(pattern.len());
    let mut last = 0;
    for caps in REFERENCE.captures_iter(pattern) {
        let (Some(whole), Some(syntax)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let body = PATTERNS
            .get(syntax.as_str())
            .ok_or_else(|| GrokError::UnknownPattern(syntax.as_str().to_string()))?;
        let body = expand_at(body, depth + 1)?;

        out.push_str(&pattern[last..whole.start()]);
        match caps.get(2) {
            Some(name) => {
                out.push_str("(?P<");
                out.push_str(name.as_str());
                out.push('>');
            }
            None => out.push_str("(?:"),
        }
        out.push_str(&body);
        out.push(')');
        last = whole.end();
    }
    out.push_str(&pattern[last..]);
    Ok(out)
}

/// Matches text (or one member of a JSON object) and fills columns from captures
#[derive(Debug, Clone)]
pub struct GrokRowDeserializer {
    schema: Arc<RowSchema>,
    regex: Regex,
    retain: bool,
    field_name: Option<String>,
}

impl GrokRowDeserializer {
    pub fn new(
        schema: Arc<RowSchema>,
        regular: &str,
        retain: bool,
        field_name: Option<String>,
    ) -> Result<Self, GrokError> {
        debug!(%regular, retain, ?field_name, "GrokRowDeserializer::new: called");
        let expanded = expand(regular)?;
        debug!(%expanded, "GrokRowDeserializer::new: expanded pattern");
        let regex = Regex::new(&expanded)?;
        Ok(Self {
            schema,
            regex,
            retain,
            field_name,
        })
    }

    fn captured(caps: &Captures<'_>, name: &str) -> Option<Value> {
        caps.name(name).map(|m| Value::String(m.as_str().to_string()))
    }
}

impl RowDeserializer for GrokRowDeserializer {
    fn format(&self) -> FormatType {
        FormatType::Grok
    }

    fn schema(&self) -> &RowSchema {
        &self.schema
    }

    fn deserialize(&self, message: &[u8]) -> Result<Row, DecodeError> {
        let text = std::str::from_utf8(message)?;

        let Some(field_name) = &self.field_name else {
            let caps = self.regex.captures(text).ok_or(DecodeError::NoMatch)?;
            return project(&self.schema, |name| Self::captured(&caps, name));
        };

        let object = match serde_json::from_str::<Value>(text)? {
            Value::Object(object) => object,
            other => {
                return Err(DecodeError::UnexpectedShape {
                    expected: "JSON object",
                    found: kind_of(&other),
                });
            }
        };
        let source = object
            .get(field_name)
            .and_then(Value::as_str)
            .ok_or_else(|| DecodeError::MissingField(field_name.clone()))?;
        let caps = self.regex.captures(source).ok_or(DecodeError::NoMatch)?;

        project(&self.schema, |name| {
            Self::captured(&caps, name).or_else(|| {
                if self.retain {
                    object.get(name).cloned()
                } else {
                    None
                }
            })
        })
    }
}
