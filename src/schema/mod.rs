//! Entity schema module
//!
//! Declares the fields of every entity kind and validates values at the
//! boundary between the backend and the proxies.
//!
//! # Features
//!
//! - **Field Access**: identity, server-managed, create-only and updatable fields
//! - **Value Types**: strings with length limits, timestamps, UUIDs, references
//! - **Name Mapping**: attribute names differ from backend names where needed
//!   (e.g. a dataset's `organization` is stored as `owner_org`)
//! - **Extras**: undeclared backend fields are kept as-is

mod catalog;
mod types;
mod validate;

pub use catalog::schema_for;
pub use types::{Access, EntitySchema, FieldSpec, FieldType};
pub use validate::{
    attributes_from_entity, entity_from_attributes, validate_create, validate_value,
    validate_write,
};
