//! Whole-object decoding and serialization.
//!
//! Dispatch walks the namespaces in priority order, strips each one's
//! alias prefix off the document's `type` value(s), and takes the first
//! table hit. The matched type's property table then drives decoding;
//! every unclaimed key (including `@context`) is preserved verbatim so
//! a decode/encode round-trip is lossless.

use serde_json::{Map as JsonMap, Value as Json};
use url::Url;

use crate::{
    VocabError,
    context::VocabularyContext,
    property::{self, PropertyValue, Value},
    schema::{self, Namespace, TypeSpec, schema},
};
use std::collections::BTreeMap;

/// A decoded `ActivityStreams` object, activity, actor, or link.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedObject {
    /// The namespace whose table matched.
    pub namespace: Namespace,
    /// Unaliased type name (`"Note"`, never `"as:Note"`).
    pub type_name: String,
    /// Alias prefix in effect for the namespace in this document
    /// (empty when the vocabulary was introduced without one).
    pub alias: String,
    /// Decoded known properties by name.
    pub known: BTreeMap<String, PropertyValue>,
    /// Keys claimed by no property, preserved verbatim in document
    /// order. Never contains a key a known property claimed.
    pub unknown: JsonMap<String, Json>,
}

impl TypedObject {
    /// Decode a top-level JSON-LD document.
    pub fn decode(raw: &Json) -> Result<Self, VocabError> {
        let map = raw.as_object().ok_or(VocabError::TypeRequired)?;
        let ctx = VocabularyContext::from_document(map);
        Self::decode_map(map, &ctx)
    }

    /// Decode an embedded object, inheriting (and possibly extending)
    /// the parent document's context.
    pub(crate) fn decode_embedded(
        raw: &Json,
        parent: &VocabularyContext,
    ) -> Result<Self, VocabError> {
        let map = raw.as_object().ok_or(VocabError::TypeRequired)?;
        if let Some(child_context) = map.get("@context") {
            let mut ctx = parent.clone();
            ctx.absorb(child_context);
            Self::decode_map(map, &ctx)
        } else {
            Self::decode_map(map, parent)
        }
    }

    fn decode_map(map: &JsonMap<String, Json>, ctx: &VocabularyContext) -> Result<Self, VocabError> {
        let type_values = collect_type_values(map).ok_or(VocabError::TypeRequired)?;

        let (namespace, spec, alias) = dispatch(&type_values, ctx)
            .ok_or_else(|| VocabError::UnhandledType(type_values.join(", ")))?;

        let mut known = BTreeMap::new();
        let mut claimed: Vec<String> = vec!["type".to_string()];

        for prop in &spec.properties {
            let (key, map_key) = property::claimed_keys(prop);
            claimed.push(key);
            if let Some(map_key) = map_key {
                claimed.push(map_key);
            }
            // A hard resolver error aborts the whole object; there is
            // no partial result.
            if let Some(value) = property::resolve(prop, map, ctx)? {
                known.insert(prop.name.to_string(), value);
            }
        }

        let mut unknown = JsonMap::new();
        for (key, value) in map {
            if !claimed.iter().any(|c| c == key) {
                unknown.insert(key.clone(), value.clone());
            }
        }

        Ok(Self {
            namespace,
            type_name: spec.name.to_string(),
            alias,
            known,
            unknown,
        })
    }

    /// Serialize back to JSON-LD.
    ///
    /// Emits the (alias-qualified) `type`, every known property through
    /// its own encoder in table order, then merges `unknown` without
    /// overwriting any key already set.
    #[must_use]
    pub fn encode(&self) -> Json {
        let mut out = JsonMap::new();

        let type_value = if self.alias.is_empty() {
            self.type_name.clone()
        } else {
            format!("{}:{}", self.alias, self.type_name)
        };
        out.insert("type".to_string(), Json::String(type_value));

        if let Some(spec) = self.type_spec() {
            for prop in &spec.properties {
                if let Some(value) = self.known.get(prop.name) {
                    property::encode_into(prop, value, &mut out);
                }
            }
        }

        for (key, value) in &self.unknown {
            if !out.contains_key(key) {
                out.insert(key.clone(), value.clone());
            }
        }

        Json::Object(out)
    }

    /// The schema row this object decoded against.
    #[must_use]
    pub fn type_spec(&self) -> Option<&'static TypeSpec> {
        schema().lookup(self.namespace, &self.type_name)
    }

    /// A decoded property by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.known.get(name)
    }

    /// The object's own id, when present and an IRI.
    #[must_use]
    pub fn id(&self) -> Option<&Url> {
        match self.known.get("id") {
            Some(PropertyValue::Functional(value)) => value.as_iri(),
            _ => None,
        }
    }

    /// The first reference a property holds: a plain IRI, or an
    /// embedded object's own id.
    #[must_use]
    pub fn first_reference(&self, name: &str) -> Option<Url> {
        self.references(name).into_iter().next()
    }

    /// Every reference a property holds, in order.
    #[must_use]
    pub fn references(&self, name: &str) -> Vec<Url> {
        let Some(value) = self.known.get(name) else {
            return Vec::new();
        };
        value
            .iter_values()
            .filter_map(|v| match v {
                Value::Iri(iri) => Some(iri.clone()),
                Value::Object(obj) => obj.id().cloned(),
                _ => None,
            })
            .collect()
    }

    /// The first embedded object a property holds.
    #[must_use]
    pub fn first_embedded(&self, name: &str) -> Option<&Self> {
        self.known
            .get(name)?
            .iter_values()
            .find_map(Value::as_object)
    }

    /// The first plain-string value a property holds.
    #[must_use]
    pub fn first_str(&self, name: &str) -> Option<&str> {
        self.known.get(name)?.iter_values().find_map(Value::as_str)
    }

    /// Whether this object's type is an activity.
    #[must_use]
    pub fn is_activity(&self) -> bool {
        self.namespace == Namespace::ActivityStreams && schema::is_activity_type(&self.type_name)
    }

    /// Whether this object's type is an actor.
    #[must_use]
    pub fn is_actor(&self) -> bool {
        self.namespace == Namespace::ActivityStreams && schema::is_actor_type(&self.type_name)
    }
}

/// `type` as a list of candidate strings; `None` when absent or empty.
fn collect_type_values(map: &JsonMap<String, Json>) -> Option<Vec<String>> {
    let raw = map.get("type")?;
    let values: Vec<String> = match raw {
        Json::String(s) => vec![s.clone()],
        Json::Array(items) => items
            .iter()
            .filter_map(Json::as_str)
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    };
    if values.is_empty() { None } else { Some(values) }
}

/// First namespace+type match wins, namespaces in fixed priority order.
fn dispatch(
    type_values: &[String],
    ctx: &VocabularyContext,
) -> Option<(Namespace, &'static TypeSpec, String)> {
    for namespace in Namespace::PRIORITY {
        let alias = ctx.alias_of(namespace.iri()).unwrap_or("").to_string();
        let prefix = if alias.is_empty() {
            String::new()
        } else {
            format!("{alias}:")
        };

        for value in type_values {
            let candidate = if prefix.is_empty() {
                value.as_str()
            } else {
                value.strip_prefix(&prefix).unwrap_or(value)
            };
            if let Some(spec) = schema().lookup(namespace, candidate) {
                return Some((namespace, spec, alias));
            }
        }
    }
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    const AS: &str = "https://www.w3.org/ns/activitystreams";

    #[test]
    fn test_plain_note_decodes() {
        let doc = json!({
            "@context": [AS],
            "type": "Note",
            "content": "hi",
        });
        let note = TypedObject::decode(&doc).unwrap();
        assert_eq!(note.type_name, "Note");
        assert_eq!(note.namespace, Namespace::ActivityStreams);
        assert_eq!(note.first_str("content"), Some("hi"));

        let encoded = note.encode();
        assert_eq!(encoded["type"], json!("Note"));
        assert_eq!(encoded["content"], json!("hi"));
        assert_eq!(encoded["@context"], json!([AS]));
    }

    #[test]
    fn test_decode_serialize_decode_is_idempotent() {
        let doc = json!({
            "@context": AS,
            "type": "Create",
            "id": "https://a.example/users/alice/activities/1",
            "actor": "https://a.example/users/alice",
            "published": "2024-03-01T12:00:00Z",
            "to": ["https://www.w3.org/ns/activitystreams#Public"],
            "object": {
                "type": "Note",
                "id": "https://a.example/users/alice/objects/1",
                "attributedTo": "https://a.example/users/alice",
                "content": "hello world",
                "contentMap": {"en": "hello world"},
            },
        });
        let first = TypedObject::decode(&doc).unwrap();
        let second = TypedObject::decode(&first.encode()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_keys_survive_roundtrip() {
        let doc = json!({
            "@context": AS,
            "type": "Note",
            "content": "hi",
            "ext:flavor": {"weird": [1, 2, 3]},
        });
        let note = TypedObject::decode(&doc).unwrap();
        assert_eq!(note.unknown.get("ext:flavor"), Some(&json!({"weird": [1, 2, 3]})));

        let encoded = note.encode();
        assert_eq!(encoded["ext:flavor"], json!({"weird": [1, 2, 3]}));
    }

    #[test]
    fn test_unmatched_type_fails() {
        let doc = json!({"@context": AS, "type": "Widget"});
        let err = TypedObject::decode(&doc).unwrap_err();
        assert_eq!(err, VocabError::UnhandledType("Widget".to_string()));
    }

    #[test]
    fn test_missing_type_fails() {
        let doc = json!({"@context": AS, "content": "typeless"});
        assert_eq!(TypedObject::decode(&doc).unwrap_err(), VocabError::TypeRequired);
    }

    #[test]
    fn test_aliased_type_resolves() {
        let doc = json!({
            "@context": {"as": AS},
            "type": "as:Note",
            "content": "hi",
        });
        let note = TypedObject::decode(&doc).unwrap();
        assert_eq!(note.type_name, "Note");
        assert_eq!(note.alias, "as");
        // Re-encoding keeps the alias qualification.
        assert_eq!(note.encode()["type"], json!("as:Note"));
    }

    #[test]
    fn test_alias_choice_does_not_change_decoded_content() {
        let plain = TypedObject::decode(&json!({
            "@context": AS,
            "type": "Note",
            "content": "hi",
            "to": ["https://a.example/users/bob"],
        }))
        .unwrap();
        let aliased = TypedObject::decode(&json!({
            "@context": {"activity": AS},
            "type": "activity:Note",
            "content": "hi",
            "to": ["https://a.example/users/bob"],
        }))
        .unwrap();
        assert_eq!(plain.type_name, aliased.type_name);
        assert_eq!(plain.known, aliased.known);
    }

    #[test]
    fn test_type_array_takes_first_table_hit() {
        let doc = json!({
            "@context": AS,
            "type": ["ext:Fancy", "Note"],
            "content": "hi",
        });
        let note = TypedObject::decode(&doc).unwrap();
        assert_eq!(note.type_name, "Note");
    }

    #[test]
    fn test_security_key_namespace() {
        let doc = json!({
            "type": "Key",
            "id": "https://a.example/users/alice#main-key",
            "owner": "https://a.example/users/alice",
            "publicKeyPem": "-----BEGIN PUBLIC KEY-----\n...",
        });
        let key = TypedObject::decode(&doc).unwrap();
        assert_eq!(key.namespace, Namespace::Security);
        assert_eq!(key.first_str("publicKeyPem").unwrap(), "-----BEGIN PUBLIC KEY-----\n...");
    }

    #[test]
    fn test_actor_with_embedded_key() {
        let doc = json!({
            "@context": [AS, "https://w3id.org/security/v1"],
            "type": "Person",
            "id": "https://a.example/users/alice",
            "preferredUsername": "alice",
            "inbox": "https://a.example/users/alice/inbox",
            "publicKey": {
                "type": "Key",
                "id": "https://a.example/users/alice#main-key",
                "owner": "https://a.example/users/alice",
                "publicKeyPem": "pem",
            },
        });
        let person = TypedObject::decode(&doc).unwrap();
        assert!(person.is_actor());
        let key = person.first_embedded("publicKey").unwrap();
        assert_eq!(key.namespace, Namespace::Security);
        assert_eq!(key.first_str("publicKeyPem"), Some("pem"));
    }

    #[test]
    fn test_hard_property_error_aborts_object() {
        let doc = json!({
            "@context": AS,
            "type": "Note",
            "content": "fine",
            "summaryMap": "not an object",
        });
        let err = TypedObject::decode(&doc).unwrap_err();
        assert!(matches!(err, VocabError::Property { .. }));
    }

    #[test]
    fn test_unknown_never_overwrites_known_on_encode() {
        let doc = json!({"@context": AS, "type": "Note", "content": "hi"});
        let mut note = TypedObject::decode(&doc).unwrap();
        // Simulate a stale unknown entry colliding with a known key.
        note.unknown.insert("content".to_string(), json!("stale"));
        assert_eq!(note.encode()["content"], json!("hi"));
    }

    #[test]
    fn test_activity_classification() {
        let create = TypedObject::decode(&json!({
            "@context": AS,
            "type": "Create",
            "actor": "https://a.example/users/alice",
        }))
        .unwrap();
        assert!(create.is_activity());
        assert_eq!(
            create.first_reference("actor").unwrap().as_str(),
            "https://a.example/users/alice"
        );
    }

    #[test]
    fn test_embedded_actor_reference_uses_its_id() {
        let create = TypedObject::decode(&json!({
            "@context": AS,
            "type": "Create",
            "actor": {"type": "Person", "id": "https://a.example/users/alice"},
        }))
        .unwrap();
        assert_eq!(
            create.first_reference("actor").unwrap().as_str(),
            "https://a.example/users/alice"
        );
    }
}
