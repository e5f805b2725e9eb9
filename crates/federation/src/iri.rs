//! Actor/IRI classification and id assignment.
//!
//! Local IRIs follow two path patterns, tried in order:
//! object-or-activity by id (`/users/{nick}/(objects|activities)/{id}`),
//! then actor or sub-collection (`/users/{nick}(/{subpath})?`).
//! Locality is an exact scheme+host comparison against the configured
//! public origin and never touches the store.

use fediwire_common::{AppError, AppResult, IdGenerator};
use fediwire_vocab::TypedObject;
use url::Url;

/// The server's configured public origin.
#[derive(Debug, Clone)]
pub struct Origin {
    base: Url,
}

impl Origin {
    /// Build from the public base URL, which must carry an empty path.
    pub fn new(base: Url) -> AppResult<Self> {
        if base.path() != "/" && !base.path().is_empty() {
            return Err(AppError::Config(format!(
                "public origin must have an empty path, got {}",
                base.path()
            )));
        }
        if base.host_str().is_none() {
            return Err(AppError::Config("public origin must have a host".to_string()));
        }
        Ok(Self { base })
    }

    /// Whether an IRI belongs to this server. Scheme, host and port all
    /// have to match; no store lookup is involved.
    #[must_use]
    pub fn is_local(&self, iri: &Url) -> bool {
        iri.scheme() == self.base.scheme()
            && iri.host_str() == self.base.host_str()
            && iri.port_or_known_default() == self.base.port_or_known_default()
    }

    /// The actor IRI for a local nickname.
    #[must_use]
    pub fn actor_iri(&self, nick: &str) -> Url {
        self.join(&format!("users/{nick}"))
    }

    /// The IRI of one of a local actor's collections.
    #[must_use]
    pub fn collection_iri(&self, nick: &str, collection: &str) -> Url {
        self.join(&format!("users/{nick}/{collection}"))
    }

    #[allow(clippy::unwrap_used)] // base is validated, paths are ours
    fn join(&self, path: &str) -> Url {
        self.base.join(path).unwrap()
    }
}

/// A parsed local IRI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalRef {
    /// `/users/{nick}/objects/{id}`
    Object {
        /// Owning actor's nickname.
        nick: String,
        /// Opaque object id.
        id: String,
    },
    /// `/users/{nick}/activities/{id}`
    Activity {
        /// Owning actor's nickname.
        nick: String,
        /// Opaque activity id.
        id: String,
    },
    /// `/users/{nick}`
    Actor {
        /// The actor's nickname.
        nick: String,
    },
    /// `/users/{nick}/{subpath}`
    SubCollection {
        /// Owning actor's nickname.
        nick: String,
        /// Sub-collection name (final path segment).
        name: String,
    },
}

impl LocalRef {
    /// Parse an IRI's path against the local patterns.
    #[must_use]
    pub fn parse(iri: &Url) -> Option<Self> {
        let segments: Vec<&str> = iri
            .path_segments()?
            .filter(|segment| !segment.is_empty())
            .collect();

        match segments.as_slice() {
            ["users", nick, "objects", id] => Some(Self::Object {
                nick: (*nick).to_string(),
                id: (*id).to_string(),
            }),
            ["users", nick, "activities", id] => Some(Self::Activity {
                nick: (*nick).to_string(),
                id: (*id).to_string(),
            }),
            ["users", nick] => Some(Self::Actor {
                nick: (*nick).to_string(),
            }),
            ["users", nick, name] => Some(Self::SubCollection {
                nick: (*nick).to_string(),
                name: (*name).to_string(),
            }),
            _ => None,
        }
    }

    /// The nickname every variant carries.
    #[must_use]
    pub fn nick(&self) -> &str {
        match self {
            Self::Object { nick, .. }
            | Self::Activity { nick, .. }
            | Self::Actor { nick }
            | Self::SubCollection { nick, .. } => nick,
        }
    }
}

/// Assign a fresh id IRI to an object that has none.
///
/// Activities land under `/activities/{id}`, everything else under
/// `/objects/{id}`; the path is derived from the *local* actor the
/// object is attributed to. Actors never receive an id here — theirs is
/// chosen at registration.
pub fn new_object_id(
    origin: &Origin,
    object: &TypedObject,
    id_gen: &IdGenerator,
) -> AppResult<Url> {
    if object.is_actor() {
        return Err(AppError::ActorRequired(
            "actors receive their id at registration, not from new_id".to_string(),
        ));
    }

    let attribution = if object.is_activity() {
        object.first_reference("actor")
    } else {
        object
            .first_reference("attributedTo")
            .or_else(|| object.first_reference("actor"))
    };

    let Some(actor_iri) = attribution else {
        return Err(AppError::ActorRequired(
            "object carries no actor or attributedTo".to_string(),
        ));
    };
    if !origin.is_local(&actor_iri) {
        return Err(AppError::ActorRequired(format!(
            "attributed actor {actor_iri} is not local"
        )));
    }
    let Some(LocalRef::Actor { nick }) = LocalRef::parse(&actor_iri) else {
        return Err(AppError::ActorRequired(format!(
            "attributed actor {actor_iri} is not an actor IRI"
        )));
    };

    let segment = if object.is_activity() {
        "activities"
    } else {
        "objects"
    };
    Ok(origin.join(&format!("users/{nick}/{segment}/{}", id_gen.generate())))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn origin() -> Origin {
        Origin::new(Url::parse("https://a.example").unwrap()).unwrap()
    }

    fn iri(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_origin_rejects_nonempty_path() {
        assert!(Origin::new(Url::parse("https://a.example/sub").unwrap()).is_err());
        assert!(Origin::new(Url::parse("https://a.example/").unwrap()).is_ok());
    }

    #[test]
    fn test_locality_is_scheme_host_port_exact() {
        let origin = origin();
        assert!(origin.is_local(&iri("https://a.example/users/alice")));
        assert!(!origin.is_local(&iri("http://a.example/users/alice")));
        assert!(!origin.is_local(&iri("https://b.example/users/alice")));
        assert!(!origin.is_local(&iri("https://a.example:8443/users/alice")));
        // Default port spelled out still matches.
        assert!(origin.is_local(&iri("https://a.example:443/users/alice")));
    }

    #[test]
    fn test_parse_patterns_in_order() {
        assert_eq!(
            LocalRef::parse(&iri("https://a.example/users/alice/objects/01h2xk")),
            Some(LocalRef::Object {
                nick: "alice".into(),
                id: "01h2xk".into()
            })
        );
        assert_eq!(
            LocalRef::parse(&iri("https://a.example/users/alice/activities/01h2xk")),
            Some(LocalRef::Activity {
                nick: "alice".into(),
                id: "01h2xk".into()
            })
        );
        assert_eq!(
            LocalRef::parse(&iri("https://a.example/users/alice")),
            Some(LocalRef::Actor {
                nick: "alice".into()
            })
        );
        assert_eq!(
            LocalRef::parse(&iri("https://a.example/users/alice/inbox")),
            Some(LocalRef::SubCollection {
                nick: "alice".into(),
                name: "inbox".into()
            })
        );
        assert_eq!(LocalRef::parse(&iri("https://a.example/about")), None);
    }

    #[test]
    fn test_new_id_routes_activities_and_objects() {
        let origin = origin();
        let id_gen = IdGenerator::new();

        let note = fediwire_vocab::TypedObject::decode(&json!({
            "type": "Note",
            "attributedTo": "https://a.example/users/alice",
        }))
        .unwrap();
        let note_id = new_object_id(&origin, &note, &id_gen).unwrap();
        assert!(note_id.path().starts_with("/users/alice/objects/"));

        let create = fediwire_vocab::TypedObject::decode(&json!({
            "type": "Create",
            "actor": "https://a.example/users/alice",
        }))
        .unwrap();
        let create_id = new_object_id(&origin, &create, &id_gen).unwrap();
        assert!(create_id.path().starts_with("/users/alice/activities/"));
    }

    #[test]
    fn test_new_id_requires_local_actor() {
        let origin = origin();
        let id_gen = IdGenerator::new();

        let foreign = fediwire_vocab::TypedObject::decode(&json!({
            "type": "Note",
            "attributedTo": "https://b.example/users/bob",
        }))
        .unwrap();
        assert!(matches!(
            new_object_id(&origin, &foreign, &id_gen),
            Err(AppError::ActorRequired(_))
        ));

        let orphan = fediwire_vocab::TypedObject::decode(&json!({"type": "Note"})).unwrap();
        assert!(matches!(
            new_object_id(&origin, &orphan, &id_gen),
            Err(AppError::ActorRequired(_))
        ));
    }

    #[test]
    fn test_new_id_refuses_actors() {
        let origin = origin();
        let id_gen = IdGenerator::new();
        let person = fediwire_vocab::TypedObject::decode(&json!({"type": "Person"})).unwrap();
        assert!(matches!(
            new_object_id(&origin, &person, &id_gen),
            Err(AppError::ActorRequired(_))
        ));
    }
}
