//! Value validation and entity <-> attribute mapping

use super::catalog::schema_for;
use super::types::{EntitySchema, FieldSpec, FieldType};
use crate::error::{Error, Result};
use crate::types::{Entity, EntityId, EntityKind, JsonObject, JsonValue};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

impl EntitySchema {
    /// Find a field by its attribute name
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Find a field by its backend entity name
    pub fn field_by_entity_name(&self, entity_name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.entity_name == entity_name)
    }

    /// Map an attribute name to the backend entity name.
    ///
    /// Names not declared by the schema are extras and map to themselves.
    pub fn entity_name<'a>(&self, name: &'a str) -> &'a str {
        match self.field(name) {
            Some(field) => field.entity_name,
            None => name,
        }
    }

    /// Fields that reference another entity and mark it stale on change
    pub fn trigger_sync_fields(&self) -> impl Iterator<Item = &'static FieldSpec> {
        self.fields.iter().filter(|f| f.trigger_sync)
    }
}

/// Check a value against a field declaration, returning the normalized value
pub fn validate_value(field: &FieldSpec, value: JsonValue) -> Result<JsonValue> {
    if value.is_null() {
        if field.nullable {
            return Ok(value);
        }
        return Err(Error::validation(field.name, "may not be null"));
    }

    let invalid = |value: &JsonValue| {
        Error::validation(
            field.name,
            format!("expected {}, got {}", field.field_type, value),
        )
    };

    match field.field_type {
        FieldType::Any => Ok(value),
        FieldType::Str => {
            let s = value.as_str().ok_or_else(|| invalid(&value))?;
            check_length(field, s)?;
            Ok(value)
        }
        FieldType::Bool if value.is_boolean() => Ok(value),
        FieldType::Int if value.is_i64() || value.is_u64() => Ok(value),
        FieldType::Timestamp => match value.as_str() {
            Some(s) if is_timestamp(s) => Ok(value),
            _ => Err(invalid(&value)),
        },
        FieldType::Uuid => match value.as_str() {
            Some(s) if uuid::Uuid::parse_str(s).is_ok() => Ok(value),
            _ => Err(invalid(&value)),
        },
        FieldType::Ref(_) => match value.as_str() {
            Some(s) if s.parse::<EntityId>().is_ok() => Ok(value),
            _ => Err(invalid(&value)),
        },
        FieldType::RefList(_) => {
            let items = value.as_array().ok_or_else(|| invalid(&value))?;
            let ids = items
                .iter()
                .map(|item| reference_id(item).ok_or_else(|| invalid(item)))
                .collect::<Result<Vec<_>>>()?;
            Ok(JsonValue::Array(ids))
        }
        FieldType::List if value.is_array() => Ok(value),
        FieldType::Object if value.is_object() => Ok(value),
        FieldType::Enum(allowed) => match value.as_str() {
            Some(s) if allowed.contains(&s) => Ok(value),
            _ => Err(invalid(&value)),
        },
        _ => Err(invalid(&value)),
    }
}

fn check_length(field: &FieldSpec, s: &str) -> Result<()> {
    let len = s.chars().count();
    if let Some(min) = field.min_len {
        if len < min {
            return Err(Error::validation(
                field.name,
                format!("must be at least {min} characters"),
            ));
        }
    }
    if let Some(max) = field.max_len {
        if len > max {
            return Err(Error::validation(
                field.name,
                format!("must be at most {max} characters"),
            ));
        }
    }
    Ok(())
}

/// RFC 3339, or the naive ISO-8601 forms the catalog emits
fn is_timestamp(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").is_ok()
        || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

/// An element of a reference list: an id string or an embedded entity
fn reference_id(item: &JsonValue) -> Option<JsonValue> {
    let id = match item {
        JsonValue::String(s) => s.as_str(),
        JsonValue::Object(obj) => obj.get("id")?.as_str()?,
        _ => return None,
    };
    id.parse::<EntityId>().ok()?;
    Some(JsonValue::String(id.to_string()))
}

/// Convert a backend entity into proxy attributes.
///
/// Declared fields are renamed and validated; undeclared entity fields are
/// kept as extras under their own name.
pub fn attributes_from_entity(kind: EntityKind, entity: &Entity) -> Result<JsonObject> {
    let schema = schema_for(kind);
    let mut attributes = JsonObject::new();

    for field in schema.fields {
        if let Some(value) = entity.get(field.entity_name) {
            attributes.insert(field.name.to_string(), validate_value(field, value.clone())?);
        }
    }

    for (key, value) in entity {
        if schema.field_by_entity_name(key).is_none() && schema.field(key).is_none() {
            attributes.insert(key.clone(), value.clone());
        }
    }

    Ok(attributes)
}

/// Build a (partial) backend entity from the named attributes
pub fn entity_from_attributes<'a>(
    kind: EntityKind,
    attributes: &JsonObject,
    names: impl IntoIterator<Item = &'a str>,
) -> Entity {
    let schema = schema_for(kind);
    names
        .into_iter()
        .filter_map(|name| {
            let value = attributes.get(name)?.clone();
            Some((schema.entity_name(name).to_string(), value))
        })
        .collect()
}

/// Validate a caller write to an existing entity
pub fn validate_write(kind: EntityKind, name: &str, value: JsonValue) -> Result<JsonValue> {
    let field = schema_for(kind).field(name).ok_or_else(|| Error::UnknownField {
        kind,
        field: name.to_string(),
    })?;
    if !field.is_updatable() {
        return Err(Error::immutable(kind, name));
    }
    validate_value(field, value)
}

/// Validate creation attributes, returning the entity to send
pub fn validate_create(kind: EntityKind, attributes: JsonObject) -> Result<Entity> {
    let schema = schema_for(kind);
    let mut entity = Entity::new();

    for (name, value) in attributes {
        let field = schema.field(&name).ok_or_else(|| Error::UnknownField {
            kind,
            field: name.clone(),
        })?;
        if !field.is_creatable() {
            return Err(Error::immutable(kind, name));
        }
        entity.insert(field.entity_name.to_string(), validate_value(field, value)?);
    }

    let missing = schema.fields.iter().find(|f| {
        f.is_creatable() && !f.nullable && !f.optional && !entity.contains_key(f.entity_name)
    });
    if let Some(field) = missing {
        return Err(Error::validation(field.name, "is required"));
    }

    Ok(entity)
}
