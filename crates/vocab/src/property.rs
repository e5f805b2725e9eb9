//! The polymorphic property codec.
//!
//! One generic resolver decodes any property against its declared range:
//! object input goes through the type resolver (filtered by the
//! property's domain), scalar input walks the range's literal kinds in
//! declared order, and anything no kind accepts is preserved verbatim.
//! Decoding a property never fails the enclosing object except for a
//! malformed language map.

use serde_json::{Map as JsonMap, Value as Json};
use url::Url;

use crate::{
    VocabError,
    context::VocabularyContext,
    object::TypedObject,
    schema::{Kind, PropertySpec},
    value::{Literal, parse_iri},
};

/// One decoded value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A reference to another object.
    Iri(Url),
    /// A recursively decoded embedded object.
    Object(Box<TypedObject>),
    /// A literal accepted by one of the range's kinds.
    Literal(Literal),
    /// Raw JSON no kind accepted, kept for lossless re-encoding.
    Unknown(Json),
}

impl Value {
    /// The IRI if this value is a reference.
    #[must_use]
    pub const fn as_iri(&self) -> Option<&Url> {
        match self {
            Self::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    /// The embedded object if this value is one.
    #[must_use]
    pub const fn as_object(&self) -> Option<&TypedObject> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// The plain-string content of a literal, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Literal(Literal::Str(s)) => Some(s),
            _ => None,
        }
    }
}

/// A decoded property: single-valued or repeatable with an optional
/// language-mapped partition.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Value of a functional (single-valued) property.
    Functional(Value),
    /// Values of a non-functional property. Each decoded value lives in
    /// exactly one partition: `values` came from the plain key,
    /// `mapped` from the `<name>Map` key, both in source order.
    Repeated {
        /// Values from the plain key.
        values: Vec<Value>,
        /// `(language, value)` pairs from the `<name>Map` key.
        mapped: Vec<(String, Value)>,
    },
}

impl PropertyValue {
    /// Iterate every plain (non-language-mapped) value.
    pub fn iter_values(&self) -> impl Iterator<Item = &Value> {
        match self {
            Self::Functional(v) => std::slice::from_ref(v).iter(),
            Self::Repeated { values, .. } => values.iter(),
        }
    }
}

/// Whether the property claims a `<name>Map` sibling key.
fn has_language_map(prop: &PropertySpec) -> bool {
    !prop.functional && prop.range.contains(&Kind::LangString)
}

/// The document keys a property claims for itself.
pub(crate) fn claimed_keys(prop: &PropertySpec) -> (String, Option<String>) {
    let map_key = has_language_map(prop).then(|| format!("{}Map", prop.name));
    (prop.name.to_string(), map_key)
}

/// Decode one property from a document map. `Ok(None)` means absent.
pub(crate) fn resolve(
    prop: &PropertySpec,
    map: &JsonMap<String, Json>,
    ctx: &VocabularyContext,
) -> Result<Option<PropertyValue>, VocabError> {
    if prop.functional {
        let Some(raw) = map.get(prop.name) else {
            return Ok(None);
        };
        // An array under a functional property is a shape we do not
        // model; keep it verbatim rather than guessing at one element.
        if raw.is_array() {
            return Ok(Some(PropertyValue::Functional(Value::Unknown(raw.clone()))));
        }
        return Ok(Some(PropertyValue::Functional(decode_one(raw, prop, ctx))));
    }

    let mut values = Vec::new();
    let mut mapped = Vec::new();

    if let Some(raw) = map.get(prop.name) {
        match raw {
            Json::Array(items) => {
                for item in items {
                    values.push(decode_one(item, prop, ctx));
                }
            }
            single => values.push(decode_one(single, prop, ctx)),
        }
    }

    if has_language_map(prop) {
        let map_key = format!("{}Map", prop.name);
        if let Some(raw) = map.get(&map_key) {
            let entries = raw.as_object().ok_or_else(|| {
                VocabError::property(&map_key, "language map must be a JSON object")
            })?;
            for (language, item) in entries {
                mapped.push((language.clone(), decode_one(item, prop, ctx)));
            }
        }
    }

    if values.is_empty() && mapped.is_empty() {
        return Ok(None);
    }
    Ok(Some(PropertyValue::Repeated { values, mapped }))
}

/// Decode one raw value against the property's range.
fn decode_one(raw: &Json, prop: &PropertySpec, ctx: &VocabularyContext) -> Value {
    if raw.is_object() {
        // Only EmbeddedObject applies to object input.
        if prop.range.contains(&Kind::Object) {
            if let Ok(embedded) = TypedObject::decode_embedded(raw, ctx) {
                if prop.domain.is_empty() || prop.domain.contains(&embedded.type_name.as_str()) {
                    return Value::Object(Box::new(embedded));
                }
            }
        }
        return Value::Unknown(raw.clone());
    }

    for &kind in prop.range {
        match kind {
            Kind::Object => {}
            Kind::Iri => {
                if let Some(iri) = raw.as_str().and_then(parse_iri) {
                    return Value::Iri(iri);
                }
            }
            literal_kind => {
                if let Some(literal) = Literal::parse(literal_kind, raw) {
                    return Value::Literal(literal);
                }
            }
        }
    }

    Value::Unknown(raw.clone())
}

/// Re-encode one decoded value.
pub(crate) fn encode_value(value: &Value) -> Json {
    match value {
        Value::Iri(iri) => Json::String(iri.to_string()),
        Value::Object(obj) => obj.encode(),
        Value::Literal(literal) => literal.to_json(),
        Value::Unknown(raw) => raw.clone(),
    }
}

/// Encode one property into the output map.
///
/// A repeatable property with exactly one plain value encodes as a bare
/// scalar, not a single-element array.
pub(crate) fn encode_into(
    prop: &PropertySpec,
    value: &PropertyValue,
    out: &mut JsonMap<String, Json>,
) {
    match value {
        PropertyValue::Functional(v) => {
            out.insert(prop.name.to_string(), encode_value(v));
        }
        PropertyValue::Repeated { values, mapped } => {
            if !values.is_empty() {
                let encoded = if values.len() == 1 {
                    encode_value(&values[0])
                } else {
                    Json::Array(values.iter().map(encode_value).collect())
                };
                out.insert(prop.name.to_string(), encoded);
            }
            if !mapped.is_empty() {
                let mut entries = JsonMap::new();
                for (language, v) in mapped {
                    entries.insert(language.clone(), encode_value(v));
                }
                out.insert(format!("{}Map", prop.name), Json::Object(entries));
            }
        }
    }
}
