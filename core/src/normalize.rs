//! Response normalization.
//!
//! A [`Normalizer`] flattens a nested response into `{result, entities}` form
//! following a [`Schema`]: every nested object the schema names is moved into
//! its domain's id map and replaced by its id. [`DefaultNormalizer`] covers
//! plain entity/list schemas; applications with their own conventions plug in
//! a custom implementation through
//! [`EntityConfigBuilder::normalizer`](crate::config::EntityConfigBuilder::normalizer).
//!
//! # Example
//!
//! ```
//! use restful_rust_core::normalize::{DefaultNormalizer, EntitySchema, Normalizer, Schema};
//! use serde_json::json;
//!
//! let user = EntitySchema::new("user").with_id_attribute("login");
//! let repo = EntitySchema::new("repo").with_relation("owner", Schema::Entity(user));
//! let schema = Schema::list(Schema::Entity(repo));
//!
//! let normalized = DefaultNormalizer
//!     .normalize(json!([{"id": 1, "owner": {"login": "octocat"}}]), &schema)?;
//!
//! assert_eq!(normalized.result, json!([1]));
//! assert_eq!(normalized.entities["repo"]["1"], json!({"id": 1, "owner": "octocat"}));
//! assert_eq!(normalized.entities["user"]["octocat"], json!({"login": "octocat"}));
//! # Ok::<(), restful_rust_core::normalize::NormalizeError>(())
//! ```

use crate::event::NormalizedEntities;
use crate::tree::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while normalizing a response
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// An entity schema was applied to something other than an object
    #[error("Expected an object for entity type {entity_type}")]
    NotAnObject {
        /// Entity type of the schema
        entity_type: String,
    },

    /// A list schema was applied to something other than an array
    #[error("Expected an array")]
    NotAnArray,

    /// The id attribute is missing or is not a string or number
    #[error("Entity of type {entity_type} has no usable {attribute} attribute")]
    MissingId {
        /// Entity type of the schema
        entity_type: String,
        /// Id attribute the schema reads
        attribute: String,
    },
}

/// Shape of a response
#[derive(Clone, Debug, PartialEq)]
pub enum Schema {
    /// A single entity
    Entity(EntitySchema),
    /// An array of values of the inner shape
    List(Box<Schema>),
}

impl Schema {
    /// Array of the given shape
    #[must_use]
    pub fn list(inner: Schema) -> Self {
        Self::List(Box::new(inner))
    }
}

impl From<EntitySchema> for Schema {
    fn from(schema: EntitySchema) -> Self {
        Self::Entity(schema)
    }
}

/// Shape of one entity type
#[derive(Clone, Debug, PartialEq)]
pub struct EntitySchema {
    entity_type: String,
    id_attribute: String,
    relations: BTreeMap<String, Schema>,
}

impl EntitySchema {
    /// Entity type whose id is read from `id`
    #[must_use]
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id_attribute: "id".to_string(),
            relations: BTreeMap::new(),
        }
    }

    /// Read the id from another attribute
    #[must_use]
    pub fn with_id_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.id_attribute = attribute.into();
        self
    }

    /// Normalize a nested field with its own schema
    #[must_use]
    pub fn with_relation(mut self, field: impl Into<String>, schema: impl Into<Schema>) -> Self {
        self.relations.insert(field.into(), schema.into());
        self
    }

    /// Entity type (domain) of this schema
    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Attribute holding the id
    #[must_use]
    pub fn id_attribute(&self) -> &str {
        &self.id_attribute
    }
}

/// Normalized response
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPayload {
    /// Id (or ids) of the top-level entities
    pub result: Value,
    /// Flattened entities: domain → id → value
    pub entities: NormalizedEntities,
}

/// Turns a nested response into `{result, entities}`
pub trait Normalizer: Send + Sync {
    /// Normalize `value` following `schema`
    ///
    /// # Errors
    ///
    /// Returns a [`NormalizeError`] when the value does not have the shape the
    /// schema describes.
    fn normalize(&self, value: Value, schema: &Schema) -> Result<NormalizedPayload, NormalizeError>;
}

/// Built-in normalizer for [`Schema`] trees.
///
/// An entity seen more than once is shallow-merged, later fields winning.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultNormalizer;

impl Normalizer for DefaultNormalizer {
    fn normalize(&self, value: Value, schema: &Schema) -> Result<NormalizedPayload, NormalizeError> {
        let mut entities = NormalizedEntities::new();
        let result = visit(value, schema, &mut entities)?;
        Ok(NormalizedPayload { result, entities })
    }
}

fn visit(value: Value, schema: &Schema, entities: &mut NormalizedEntities) -> Result<Value, NormalizeError> {
    match schema {
        Schema::List(inner) => {
            let Value::Array(items) = value else {
                return Err(NormalizeError::NotAnArray);
            };
            items
                .into_iter()
                .map(|item| visit(item, inner, entities))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        },
        Schema::Entity(entity) => visit_entity(value, entity, entities),
    }
}

fn visit_entity(
    value: Value,
    schema: &EntitySchema,
    entities: &mut NormalizedEntities,
) -> Result<Value, NormalizeError> {
    let Value::Object(mut fields) = value else {
        return Err(NormalizeError::NotAnObject {
            entity_type: schema.entity_type.clone(),
        });
    };

    let id_value = fields.get(&schema.id_attribute).cloned();
    let id: EntityId = match &id_value {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => {
            return Err(NormalizeError::MissingId {
                entity_type: schema.entity_type.clone(),
                attribute: schema.id_attribute.clone(),
            });
        },
    };

    for (field, relation) in &schema.relations {
        if let Some(nested) = fields.remove(field) {
            let replaced = if nested.is_null() {
                nested
            } else {
                visit(nested, relation, entities)?
            };
            fields.insert(field.clone(), replaced);
        }
    }

    let by_id = entities.entry(schema.entity_type.clone()).or_default();
    match by_id.get_mut(&id) {
        Some(Value::Object(existing)) => existing.extend(fields),
        _ => {
            by_id.insert(id, Value::Object(fields));
        },
    }

    Ok(id_value.unwrap_or(Value::Null))
}
