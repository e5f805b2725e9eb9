//! Literal value kinds and their grammars.
//!
//! Each [`Kind`] in a property's range owns a grammar; the first kind
//! whose parser accepts the raw value wins and later kinds are never
//! attempted. Grammars reject rather than coerce: a schemeless string is
//! not an IRI, a lone `"P"` is not a duration.

use chrono::{DateTime, FixedOffset, SecondsFormat};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as Json;
use url::Url;

use crate::schema::Kind;

#[allow(clippy::unwrap_used)] // patterns are literals
fn grammar(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

static DURATION_RE: Lazy<Regex> =
    Lazy::new(|| grammar(r"^-?P(\d+Y)?(\d+M)?(\d+W)?(\d+D)?(T(\d+H)?(\d+M)?(\d+(\.\d+)?S)?)?$"));

static LANGUAGE_TAG_RE: Lazy<Regex> = Lazy::new(|| grammar(r"^[A-Za-z]{2,8}(-[A-Za-z0-9]{1,8})*$"));

static MEDIA_TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    grammar(r"^[A-Za-z0-9][A-Za-z0-9!#$&^_.+-]*/[A-Za-z0-9][A-Za-z0-9!#$&^_.+-]*(\s*;.*)?$")
});

static LINK_REL_RE: Lazy<Regex> = Lazy::new(|| grammar(r"^[a-z][a-z0-9.-]*$"));

/// Parse a string as an IRI reference.
///
/// Only absolute references count: a schemeless string is never an IRI
/// here even though it could syntactically be a relative reference.
#[must_use]
pub fn parse_iri(input: &str) -> Option<Url> {
    Url::parse(input).ok()
}

/// Whether an ISO-8601 duration string is well-formed and non-empty.
fn is_duration(input: &str) -> bool {
    let body = input.strip_prefix('-').unwrap_or(input);
    if body == "P" || body.ends_with('T') {
        return false;
    }
    DURATION_RE.is_match(input)
}

/// A decoded literal, tagged with the kind that accepted it.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// RFC 3339 date-time.
    DateTime(DateTime<FixedOffset>),
    /// Validated ISO-8601 duration, kept as text.
    Duration(String),
    /// Non-negative integer.
    NonNegInteger(u64),
    /// Floating point number.
    Float(f64),
    /// BCP-47 language tag.
    LanguageTag(String),
    /// RFC 2045 media type.
    MediaType(String),
    /// RFC 5988 link relation token.
    LinkRel(String),
    /// `xsd:anyURI` literal.
    AnyUri(Url),
    /// Plain string.
    Str(String),
}

impl Literal {
    /// Try one kind's grammar against a raw JSON value.
    ///
    /// Returns `None` when the grammar rejects the value; the caller
    /// then moves on to the next kind in the property's declared range.
    #[must_use]
    pub fn parse(kind: Kind, raw: &Json) -> Option<Self> {
        match kind {
            // Iri and Object are handled by the property codec, not as
            // literals.
            Kind::Iri | Kind::Object => None,
            Kind::DateTime => {
                let s = raw.as_str()?;
                DateTime::parse_from_rfc3339(s).ok().map(Self::DateTime)
            }
            Kind::Duration => {
                let s = raw.as_str()?;
                is_duration(s).then(|| Self::Duration(s.to_string()))
            }
            Kind::NonNegInteger => raw.as_u64().map(Self::NonNegInteger),
            Kind::Float => raw.as_f64().map(Self::Float),
            Kind::LanguageTag => {
                let s = raw.as_str()?;
                LANGUAGE_TAG_RE.is_match(s).then(|| Self::LanguageTag(s.to_string()))
            }
            Kind::MediaType => {
                let s = raw.as_str()?;
                MEDIA_TYPE_RE.is_match(s).then(|| Self::MediaType(s.to_string()))
            }
            Kind::LinkRel => {
                let s = raw.as_str()?;
                LINK_REL_RE.is_match(s).then(|| Self::LinkRel(s.to_string()))
            }
            Kind::AnyUri => {
                let s = raw.as_str()?;
                parse_iri(s).map(Self::AnyUri)
            }
            Kind::Str | Kind::LangString => raw.as_str().map(|s| Self::Str(s.to_string())),
        }
    }

    /// Re-encode the literal as raw JSON.
    #[must_use]
    pub fn to_json(&self) -> Json {
        match self {
            Self::DateTime(dt) => {
                Json::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Self::Duration(s) | Self::LanguageTag(s) | Self::MediaType(s) | Self::LinkRel(s)
            | Self::Str(s) => Json::String(s.clone()),
            Self::NonNegInteger(n) => Json::from(*n),
            Self::Float(x) => serde_json::Number::from_f64(*x).map_or(Json::Null, Json::Number),
            Self::AnyUri(u) => Json::String(u.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schemeless_string_is_not_an_iri() {
        assert!(parse_iri("https://example.com/users/alice").is_some());
        assert!(parse_iri("users/alice").is_none());
        assert!(parse_iri("example.com/users/alice").is_none());
    }

    #[test]
    fn test_datetime_grammar() {
        assert!(Literal::parse(Kind::DateTime, &json!("2024-03-01T12:00:00Z")).is_some());
        assert!(Literal::parse(Kind::DateTime, &json!("2024-03-01T12:00:00+09:00")).is_some());
        assert!(Literal::parse(Kind::DateTime, &json!("yesterday")).is_none());
        assert!(Literal::parse(Kind::DateTime, &json!(12)).is_none());
    }

    #[test]
    fn test_datetime_reencodes_with_z() {
        let lit = Literal::parse(Kind::DateTime, &json!("2024-03-01T12:00:00Z")).unwrap();
        assert_eq!(lit.to_json(), json!("2024-03-01T12:00:00Z"));
    }

    #[test]
    fn test_duration_grammar() {
        assert!(Literal::parse(Kind::Duration, &json!("PT5M")).is_some());
        assert!(Literal::parse(Kind::Duration, &json!("P1DT12H")).is_some());
        assert!(Literal::parse(Kind::Duration, &json!("-PT10S")).is_some());
        assert!(Literal::parse(Kind::Duration, &json!("P")).is_none());
        assert!(Literal::parse(Kind::Duration, &json!("P1DT")).is_none());
        assert!(Literal::parse(Kind::Duration, &json!("5 minutes")).is_none());
    }

    #[test]
    fn test_non_negative_integer() {
        assert_eq!(
            Literal::parse(Kind::NonNegInteger, &json!(42)),
            Some(Literal::NonNegInteger(42))
        );
        assert!(Literal::parse(Kind::NonNegInteger, &json!(-1)).is_none());
        assert!(Literal::parse(Kind::NonNegInteger, &json!(1.5)).is_none());
        assert!(Literal::parse(Kind::NonNegInteger, &json!("42")).is_none());
    }

    #[test]
    fn test_float_accepts_integers_too() {
        assert_eq!(Literal::parse(Kind::Float, &json!(1.5)), Some(Literal::Float(1.5)));
        assert_eq!(Literal::parse(Kind::Float, &json!(3)), Some(Literal::Float(3.0)));
    }

    #[test]
    fn test_language_tag() {
        assert!(Literal::parse(Kind::LanguageTag, &json!("en")).is_some());
        assert!(Literal::parse(Kind::LanguageTag, &json!("zh-Hant-TW")).is_some());
        assert!(Literal::parse(Kind::LanguageTag, &json!("not a tag")).is_none());
    }

    #[test]
    fn test_media_type() {
        assert!(Literal::parse(Kind::MediaType, &json!("text/html")).is_some());
        assert!(
            Literal::parse(Kind::MediaType, &json!("application/activity+json")).is_some()
        );
        assert!(Literal::parse(Kind::MediaType, &json!("nonsense")).is_none());
    }

    #[test]
    fn test_link_rel() {
        assert!(Literal::parse(Kind::LinkRel, &json!("self")).is_some());
        assert!(Literal::parse(Kind::LinkRel, &json!("canonical")).is_some());
        assert!(Literal::parse(Kind::LinkRel, &json!("Not Rel")).is_none());
    }
}
