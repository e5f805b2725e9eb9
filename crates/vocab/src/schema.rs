//! Declarative vocabulary schema.
//!
//! Every type the codec understands is a row in a static table:
//! `(type name, property table)`, grouped by namespace. Each property
//! row declares its cardinality, its ordered range of acceptable value
//! kinds, and (for embedded objects) the types its domain admits. One
//! generic resolver/encoder walks these tables; there is no per-type
//! code.

use once_cell::sync::Lazy;

/// The vocabularies the codec knows, in decode priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// `ActivityStreams` 2.0 core.
    ActivityStreams,
    /// W3ID security extension (actor keys).
    Security,
    /// Mastodon/toot platform extension.
    Toot,
}

impl Namespace {
    /// Fixed decode priority: core vocabulary, security extension,
    /// platform extension.
    pub const PRIORITY: [Self; 3] = [Self::ActivityStreams, Self::Security, Self::Toot];

    /// Canonical vocabulary IRI (the context resolver treats the other
    /// scheme as equivalent).
    #[must_use]
    pub const fn iri(self) -> &'static str {
        match self {
            Self::ActivityStreams => "https://www.w3.org/ns/activitystreams",
            Self::Security => "https://w3id.org/security/v1",
            Self::Toot => "http://joinmastodon.org/ns",
        }
    }
}

/// A value kind a property range may declare, tried in declared order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// A reference to another object by IRI (explicit scheme required).
    Iri,
    /// An embedded object, decoded recursively.
    Object,
    /// ISO-8601 / RFC 3339 date-time.
    DateTime,
    /// ISO-8601 duration.
    Duration,
    /// `xsd:nonNegativeInteger`.
    NonNegInteger,
    /// `xsd:float`.
    Float,
    /// BCP-47 language tag.
    LanguageTag,
    /// RFC 2045 media type.
    MediaType,
    /// RFC 5988 registered link relation token.
    LinkRel,
    /// `xsd:anyURI` kept as a literal rather than a reference.
    AnyUri,
    /// Plain string.
    Str,
    /// Natural-language string with a parallel `<name>Map` variant.
    LangString,
}

/// One property row: name, cardinality, ordered range, object domain.
#[derive(Debug, Clone, Copy)]
pub struct PropertySpec {
    /// JSON key for the property.
    pub name: &'static str,
    /// Functional properties hold at most one value.
    pub functional: bool,
    /// Acceptable kinds, tried strictly in this order.
    pub range: &'static [Kind],
    /// Type names an embedded object may resolve to; empty means any.
    pub domain: &'static [&'static str],
}

/// One type row: the name dispatched on and its property table.
#[derive(Debug, Clone)]
pub struct TypeSpec {
    /// Type name as it appears (unaliased) in documents.
    pub name: &'static str,
    /// Owning namespace.
    pub namespace: Namespace,
    /// Known properties, iterated in this order on decode and encode.
    pub properties: Vec<PropertySpec>,
}

impl TypeSpec {
    /// Look up a property row by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertySpec> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// The full schema: one type table per namespace, in priority order.
#[derive(Debug)]
pub struct Schema {
    tables: Vec<(Namespace, Vec<TypeSpec>)>,
}

impl Schema {
    /// The type table for one namespace.
    #[must_use]
    pub fn types_of(&self, namespace: Namespace) -> &[TypeSpec] {
        self.tables
            .iter()
            .find(|(ns, _)| *ns == namespace)
            .map_or(&[], |(_, types)| types.as_slice())
    }

    /// Look up a type by namespace and unaliased name.
    #[must_use]
    pub fn lookup(&self, namespace: Namespace, name: &str) -> Option<&TypeSpec> {
        self.types_of(namespace).iter().find(|t| t.name == name)
    }
}

/// Activity type names (routed to `/activities/{id}` ids and wrapped in
/// mailbox entries).
pub const ACTIVITY_TYPES: &[&str] = &[
    "Accept",
    "Activity",
    "Add",
    "Announce",
    "Arrive",
    "Block",
    "Create",
    "Delete",
    "Dislike",
    "Flag",
    "Follow",
    "Ignore",
    "IntransitiveActivity",
    "Invite",
    "Join",
    "Leave",
    "Like",
    "Listen",
    "Move",
    "Offer",
    "Question",
    "Read",
    "Reject",
    "Remove",
    "TentativeAccept",
    "TentativeReject",
    "Travel",
    "Undo",
    "Update",
    "View",
];

/// Actor type names (ids are assigned at registration, never by
/// `new_id`).
pub const ACTOR_TYPES: &[&str] = &["Application", "Group", "Organization", "Person", "Service"];

/// Whether `name` is an activity type.
#[must_use]
pub fn is_activity_type(name: &str) -> bool {
    ACTIVITY_TYPES.contains(&name)
}

/// Whether `name` is an actor type.
#[must_use]
pub fn is_actor_type(name: &str) -> bool {
    ACTOR_TYPES.contains(&name)
}

// Range shorthands. Order inside each slice is the decode precedence.
const R_IRI: &[Kind] = &[Kind::Iri];
const R_IRI_OBJ: &[Kind] = &[Kind::Iri, Kind::Object];
const R_OBJ: &[Kind] = &[Kind::Object];
const R_DATETIME: &[Kind] = &[Kind::DateTime];
const R_DATETIME_STR: &[Kind] = &[Kind::DateTime, Kind::Str];
const R_DURATION: &[Kind] = &[Kind::Duration];
const R_NONNEG: &[Kind] = &[Kind::NonNegInteger];
const R_FLOAT: &[Kind] = &[Kind::Float];
const R_LANGTAG: &[Kind] = &[Kind::LanguageTag];
const R_MEDIATYPE: &[Kind] = &[Kind::MediaType];
const R_LINKREL: &[Kind] = &[Kind::LinkRel];
const R_ANYURI: &[Kind] = &[Kind::AnyUri];
const R_STR: &[Kind] = &[Kind::Str];
const R_LANGSTR: &[Kind] = &[Kind::LangString];

const COLLECTION_TYPES: &[&str] = &[
    "Collection",
    "OrderedCollection",
    "CollectionPage",
    "OrderedCollectionPage",
];
const PAGE_TYPES: &[&str] = &["CollectionPage", "OrderedCollectionPage"];
const IMAGEISH: &[&str] = &["Image", "Link"];

const fn f(name: &'static str, range: &'static [Kind]) -> PropertySpec {
    PropertySpec {
        name,
        functional: true,
        range,
        domain: &[],
    }
}

const fn nf(name: &'static str, range: &'static [Kind]) -> PropertySpec {
    PropertySpec {
        name,
        functional: false,
        range,
        domain: &[],
    }
}

const fn f_dom(
    name: &'static str,
    range: &'static [Kind],
    domain: &'static [&'static str],
) -> PropertySpec {
    PropertySpec {
        name,
        functional: true,
        range,
        domain,
    }
}

const fn nf_dom(
    name: &'static str,
    range: &'static [Kind],
    domain: &'static [&'static str],
) -> PropertySpec {
    PropertySpec {
        name,
        functional: false,
        range,
        domain,
    }
}

fn object_props() -> Vec<PropertySpec> {
    vec![
        f("id", R_IRI),
        nf("attributedTo", R_IRI_OBJ),
        nf("to", R_IRI_OBJ),
        nf("cc", R_IRI_OBJ),
        nf("bto", R_IRI_OBJ),
        nf("bcc", R_IRI_OBJ),
        nf("audience", R_IRI_OBJ),
        nf("content", R_LANGSTR),
        nf("name", R_LANGSTR),
        nf("summary", R_LANGSTR),
        f("published", R_DATETIME),
        f("updated", R_DATETIME),
        f("startTime", R_DATETIME),
        f("endTime", R_DATETIME),
        f("duration", R_DURATION),
        f("mediaType", R_MEDIATYPE),
        nf_dom("url", R_IRI_OBJ, &["Link"]),
        nf("inReplyTo", R_IRI_OBJ),
        nf("tag", R_IRI_OBJ),
        nf("attachment", R_IRI_OBJ),
        nf_dom("icon", R_IRI_OBJ, IMAGEISH),
        nf_dom("image", R_IRI_OBJ, IMAGEISH),
        nf("generator", R_IRI_OBJ),
        nf_dom("location", R_IRI_OBJ, &["Place"]),
        f_dom("replies", R_IRI_OBJ, COLLECTION_TYPES),
        f_dom("likes", R_IRI_OBJ, COLLECTION_TYPES),
        f_dom("shares", R_IRI_OBJ, COLLECTION_TYPES),
    ]
}

fn activity_props() -> Vec<PropertySpec> {
    let mut props = object_props();
    props.extend([
        nf("actor", R_IRI_OBJ),
        nf("object", R_IRI_OBJ),
        nf("target", R_IRI_OBJ),
        nf("origin", R_IRI_OBJ),
        nf("result", R_IRI_OBJ),
        nf("instrument", R_IRI_OBJ),
    ]);
    props
}

fn question_props() -> Vec<PropertySpec> {
    let mut props = activity_props();
    props.extend([
        nf("oneOf", R_IRI_OBJ),
        nf("anyOf", R_IRI_OBJ),
        // An RFC 3339 string under `closed` always resolves as a
        // date-time; the declared order here is load-bearing.
        f("closed", R_DATETIME_STR),
    ]);
    props
}

fn actor_props() -> Vec<PropertySpec> {
    let mut props = object_props();
    props.extend([
        f("preferredUsername", R_STR),
        f("inbox", R_IRI),
        f("outbox", R_IRI),
        f("following", R_IRI),
        f("followers", R_IRI),
        f("liked", R_IRI),
        f("featured", R_IRI),
        f_dom("publicKey", R_IRI_OBJ, &["Key"]),
        // Anonymous endpoint maps carry no `type`; they fall through to
        // the verbatim unknown payload, which round-trips them intact.
        f("endpoints", R_OBJ),
    ]);
    props
}

fn link_props() -> Vec<PropertySpec> {
    vec![
        f("id", R_IRI),
        f("href", R_ANYURI),
        nf("rel", R_LINKREL),
        f("mediaType", R_MEDIATYPE),
        nf("name", R_LANGSTR),
        f("hreflang", R_LANGTAG),
        f("height", R_NONNEG),
        f("width", R_NONNEG),
        nf("preview", R_IRI_OBJ),
    ]
}

fn collection_props() -> Vec<PropertySpec> {
    let mut props = object_props();
    props.extend([
        f("totalItems", R_NONNEG),
        f_dom("first", R_IRI_OBJ, PAGE_TYPES),
        f_dom("last", R_IRI_OBJ, PAGE_TYPES),
        f_dom("current", R_IRI_OBJ, PAGE_TYPES),
        nf("items", R_IRI_OBJ),
        nf("orderedItems", R_IRI_OBJ),
    ]);
    props
}

fn page_props() -> Vec<PropertySpec> {
    let mut props = collection_props();
    props.extend([
        f_dom("partOf", R_IRI_OBJ, COLLECTION_TYPES),
        f_dom("next", R_IRI_OBJ, PAGE_TYPES),
        f_dom("prev", R_IRI_OBJ, PAGE_TYPES),
        f("startIndex", R_NONNEG),
    ]);
    props
}

fn place_props() -> Vec<PropertySpec> {
    let mut props = object_props();
    props.extend([
        f("accuracy", R_FLOAT),
        f("altitude", R_FLOAT),
        f("latitude", R_FLOAT),
        f("longitude", R_FLOAT),
        f("radius", R_FLOAT),
        f("units", R_STR),
    ]);
    props
}

fn tombstone_props() -> Vec<PropertySpec> {
    let mut props = object_props();
    props.extend([nf("formerType", R_STR), f("deleted", R_DATETIME)]);
    props
}

fn relationship_props() -> Vec<PropertySpec> {
    let mut props = object_props();
    props.extend([
        f("subject", R_IRI_OBJ),
        nf("object", R_IRI_OBJ),
        f("relationship", R_IRI_OBJ),
    ]);
    props
}

fn profile_props() -> Vec<PropertySpec> {
    let mut props = object_props();
    props.push(f("describes", R_IRI_OBJ));
    props
}

fn key_props() -> Vec<PropertySpec> {
    vec![f("id", R_IRI), f("owner", R_IRI), f("publicKeyPem", R_STR)]
}

fn activitystreams_table() -> Vec<TypeSpec> {
    let ns = Namespace::ActivityStreams;
    let ty = |name: &'static str, properties: Vec<PropertySpec>| TypeSpec {
        name,
        namespace: ns,
        properties,
    };

    let mut types = vec![
        ty("Object", object_props()),
        ty("Link", link_props()),
        ty("Mention", link_props()),
        ty("Activity", activity_props()),
        ty("IntransitiveActivity", activity_props()),
        ty("Question", question_props()),
        ty("Collection", collection_props()),
        ty("OrderedCollection", collection_props()),
        ty("CollectionPage", page_props()),
        ty("OrderedCollectionPage", page_props()),
        ty("Place", place_props()),
        ty("Profile", profile_props()),
        ty("Relationship", relationship_props()),
        ty("Tombstone", tombstone_props()),
    ];

    for name in [
        "Article", "Audio", "Document", "Event", "Image", "Note", "Page", "Video",
    ] {
        types.push(ty(name, object_props()));
    }

    for &name in ACTOR_TYPES {
        types.push(ty(name, actor_props()));
    }

    for &name in ACTIVITY_TYPES {
        if types.iter().any(|t| t.name == name) {
            continue;
        }
        types.push(ty(name, activity_props()));
    }

    types
}

fn security_table() -> Vec<TypeSpec> {
    vec![TypeSpec {
        name: "Key",
        namespace: Namespace::Security,
        properties: key_props(),
    }]
}

fn toot_table() -> Vec<TypeSpec> {
    vec![
        TypeSpec {
            name: "Emoji",
            namespace: Namespace::Toot,
            properties: object_props(),
        },
        TypeSpec {
            name: "Hashtag",
            namespace: Namespace::Toot,
            properties: link_props(),
        },
    ]
}

static SCHEMA: Lazy<Schema> = Lazy::new(|| Schema {
    tables: vec![
        (Namespace::ActivityStreams, activitystreams_table()),
        (Namespace::Security, security_table()),
        (Namespace::Toot, toot_table()),
    ],
});

/// The process-wide schema tables.
#[must_use]
pub fn schema() -> &'static Schema {
    &SCHEMA
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_every_activity_type_is_present() {
        for name in ACTIVITY_TYPES {
            assert!(
                schema().lookup(Namespace::ActivityStreams, name).is_some(),
                "missing activity type {name}"
            );
        }
    }

    #[test]
    fn test_actor_types_have_inbox() {
        for name in ACTOR_TYPES {
            let spec = schema()
                .lookup(Namespace::ActivityStreams, name)
                .unwrap_or_else(|| panic!("missing actor type {name}"));
            assert!(spec.property("inbox").is_some());
            assert!(spec.property("publicKey").is_some());
        }
    }

    #[test]
    fn test_no_duplicate_type_names_per_namespace() {
        for ns in Namespace::PRIORITY {
            let types = schema().types_of(ns);
            for (i, t) in types.iter().enumerate() {
                assert!(
                    !types[i + 1..].iter().any(|u| u.name == t.name),
                    "duplicate type {} in {ns:?}",
                    t.name
                );
            }
        }
    }

    #[test]
    fn test_closed_range_prefers_datetime() {
        let question = schema()
            .lookup(Namespace::ActivityStreams, "Question")
            .unwrap();
        let closed = question.property("closed").unwrap();
        assert_eq!(closed.range[0], Kind::DateTime);
    }

    #[test]
    fn test_security_key() {
        let key = schema().lookup(Namespace::Security, "Key").unwrap();
        assert!(key.property("publicKeyPem").is_some());
        assert!(key.property("owner").is_some());
    }
}
