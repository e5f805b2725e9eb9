//! JSON-LD `@context` resolution.
//!
//! A document's `@context` may be a bare vocabulary string, an
//! alias-to-vocabulary object, or an arbitrarily nested array of either.
//! Resolution flattens the whole value into one vocabulary-to-alias map,
//! built once per decode call.

use std::collections::HashMap;

use serde_json::Value;

/// Strip the scheme and any trailing `#`/`/` so the `http://` and
/// `https://` forms of one vocabulary land on the same key.
fn normalize(iri: &str) -> &str {
    let trimmed = iri.trim_end_matches(['#', '/']);
    trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed)
}

/// Immutable vocabulary-to-alias map for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VocabularyContext {
    aliases: HashMap<String, String>,
}

impl VocabularyContext {
    /// Build the context map from a raw `@context` value.
    ///
    /// A plain string introduces that vocabulary with an empty alias; an
    /// object entry maps its vocabulary value to the entry's key as
    /// alias; arrays recurse. Later entries win on duplicates.
    #[must_use]
    pub fn from_value(raw: Option<&Value>) -> Self {
        let mut ctx = Self::default();
        if let Some(value) = raw {
            ctx.absorb(value);
        }
        ctx
    }

    /// Convenience: build from a whole document map.
    #[must_use]
    pub fn from_document(map: &serde_json::Map<String, Value>) -> Self {
        Self::from_value(map.get("@context"))
    }

    /// Fold another raw `@context` value into this map (embedded objects
    /// inherit their parent's context and may extend it).
    pub fn absorb(&mut self, value: &Value) {
        match value {
            Value::String(vocabulary) => {
                self.aliases
                    .insert(normalize(vocabulary).to_string(), String::new());
            }
            Value::Array(entries) => {
                for entry in entries {
                    self.absorb(entry);
                }
            }
            Value::Object(entries) => {
                for (alias, target) in entries {
                    let vocabulary = match target {
                        Value::String(iri) => Some(iri.as_str()),
                        // Expanded term definitions keep the IRI under @id.
                        Value::Object(def) => def.get("@id").and_then(Value::as_str),
                        _ => None,
                    };
                    if let Some(vocabulary) = vocabulary {
                        self.aliases
                            .insert(normalize(vocabulary).to_string(), alias.clone());
                    }
                }
            }
            _ => {}
        }
    }

    /// The alias declared for `vocabulary`, if any. Both URI schemes
    /// resolve identically.
    #[must_use]
    pub fn alias_of(&self, vocabulary: &str) -> Option<&str> {
        self.aliases.get(normalize(vocabulary)).map(String::as_str)
    }

    /// The prefix (`"alias:"` or `""`) used by type and property names
    /// under `vocabulary` in this document.
    #[must_use]
    pub fn prefix_of(&self, vocabulary: &str) -> String {
        match self.alias_of(vocabulary) {
            Some(alias) if !alias.is_empty() => format!("{alias}:"),
            _ => String::new(),
        }
    }

    /// Whether any vocabulary was declared at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
