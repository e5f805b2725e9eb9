//! Generic object persistence with side-effect-free re-serialization.
//!
//! Every write round-trips the document through the vocab codec, so the
//! stored form is the codec's canonical serialization of what was
//! decoded — unknown fields included — and nothing else.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use fediwire_common::{AppError, AppResult, IdGenerator};
use fediwire_db::{ObjectRecord, ObjectRepository};
use fediwire_vocab::{PropertyValue, TypedObject, Value};
use serde_json::{Value as Json, json};
use tracing::debug;
use url::Url;

use crate::iri::{Origin, new_object_id};
use crate::vocab_error;

/// Object store facade: lookup plus create/update/delete.
#[derive(Clone)]
pub struct ObjectService<S> {
    store: Arc<S>,
    origin: Origin,
    id_gen: IdGenerator,
}

impl<S: ObjectRepository> ObjectService<S> {
    /// Create a service over a store.
    #[must_use]
    pub fn new(store: Arc<S>, origin: Origin) -> Self {
        Self {
            store,
            origin,
            id_gen: IdGenerator::new(),
        }
    }

    /// Fetch a stored document by canonical IRI.
    pub async fn get(&self, iri: &Url) -> AppResult<Option<Json>> {
        Ok(self
            .store
            .object_by_iri(iri.as_str())
            .await?
            .map(|record| record.data))
    }

    /// Whether a document with this IRI is persisted.
    pub async fn exists(&self, iri: &Url) -> AppResult<bool> {
        self.store.object_exists(iri.as_str()).await
    }

    /// Whether this instance is authoritative for the IRI. Decided from
    /// the configured origin alone, without a store lookup.
    #[must_use]
    pub fn owns(&self, iri: &Url) -> bool {
        self.origin.is_local(iri)
    }

    /// Assign a fresh id for an object that has none.
    pub fn new_id(&self, document: &Json) -> AppResult<Url> {
        let object = TypedObject::decode(document).map_err(vocab_error)?;
        new_object_id(&self.origin, &object, &self.id_gen)
    }

    /// Persist a decoded activity or object.
    ///
    /// A `Create` must name an actor, carry an object, and agree with
    /// the object's `attributedTo` — an attribution mismatch is rejected
    /// outright, never silently rewritten. Embedded objects are
    /// persisted under their own id.
    pub async fn create(&self, document: &Json) -> AppResult<ObjectRecord> {
        let mut object = TypedObject::decode(document).map_err(vocab_error)?;

        if object.type_name == "Create" {
            self.check_create(&object)?;
        }

        // Persist embedded objects of an activity under their own ids,
        // writing any freshly assigned id back into the activity.
        if object.is_activity() {
            let mut persisted = Vec::new();
            if let Some(value) = object.known.get_mut("object") {
                let values: &mut [Value] = match value {
                    PropertyValue::Functional(v) => std::slice::from_mut(v),
                    PropertyValue::Repeated { values, .. } => values,
                };
                for v in values {
                    if let Value::Object(embedded) = v {
                        self.ensure_id(embedded)?;
                        persisted.push((*embedded).clone());
                    }
                }
            }
            for embedded in persisted {
                self.persist_embedded(*embedded).await?;
            }
        }

        let iri = self.ensure_id(&mut object)?;
        let actor_iri = object
            .first_reference("actor")
            .or_else(|| object.first_reference("attributedTo"));

        let record = self
            .store
            .insert_object(
                iri.as_str(),
                &object.type_name,
                self.origin.is_local(&iri),
                actor_iri.as_ref().map(Url::as_str),
                object.encode(),
            )
            .await?;
        debug!(iri = %iri, object_type = %record.object_type, "Persisted object");
        Ok(record)
    }

    /// Replace a stored document; the replacement is re-serialized
    /// through the codec like any other write.
    pub async fn update(&self, document: &Json) -> AppResult<ObjectRecord> {
        let object = TypedObject::decode(document).map_err(vocab_error)?;
        let iri = object.id().ok_or(AppError::IdRequired)?.clone();
        if !self.store.object_exists(iri.as_str()).await? {
            return Err(AppError::NotFound(iri.to_string()));
        }
        self.store
            .update_object(iri.as_str(), &object.type_name, object.encode())
            .await
    }

    /// Replace a stored object with a `Tombstone` recording its former
    /// type and deletion time.
    pub async fn delete(&self, iri: &Url) -> AppResult<ObjectRecord> {
        let record = self
            .store
            .object_by_iri(iri.as_str())
            .await?
            .ok_or_else(|| AppError::NotFound(iri.to_string()))?;

        let tombstone = json!({
            "@context": "https://www.w3.org/ns/activitystreams",
            "type": "Tombstone",
            "id": record.iri,
            "formerType": record.object_type,
            "deleted": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        });
        self.store
            .update_object(iri.as_str(), "Tombstone", tombstone)
            .await
    }

    /// Actor agreement for `Create`: the activity's actor must match the
    /// embedded object's attribution exactly.
    fn check_create(&self, activity: &TypedObject) -> AppResult<()> {
        let actor = activity
            .first_reference("actor")
            .ok_or_else(|| AppError::ActorRequired("Create carries no actor".to_string()))?;

        let Some(object_value) = activity.get("object") else {
            return Err(AppError::ObjectRequired);
        };
        let embedded = object_value.iter_values().find_map(Value::as_object);

        if let Some(embedded) = embedded {
            for attributed in embedded.references("attributedTo") {
                if attributed != actor {
                    return Err(AppError::ActorRequired(format!(
                        "object is attributed to {attributed}, activity actor is {actor}"
                    )));
                }
            }
        }
        Ok(())
    }

    async fn persist_embedded(&self, mut embedded: TypedObject) -> AppResult<()> {
        let iri = self.ensure_id(&mut embedded)?;
        let attributed = embedded.first_reference("attributedTo");
        self.store
            .insert_object(
                iri.as_str(),
                &embedded.type_name,
                self.origin.is_local(&iri),
                attributed.as_ref().map(Url::as_str),
                embedded.encode(),
            )
            .await?;
        Ok(())
    }

    /// The object's id, assigning a fresh local one when absent.
    fn ensure_id(&self, object: &mut TypedObject) -> AppResult<Url> {
        if let Some(id) = object.id() {
            return Ok(id.clone());
        }
        let iri = new_object_id(&self.origin, object, &self.id_gen)?;
        object.known.insert(
            "id".to_string(),
            PropertyValue::Functional(Value::Iri(iri.clone())),
        );
        Ok(iri)
    }
}
