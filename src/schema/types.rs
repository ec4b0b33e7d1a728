//! Schema types

use crate::types::EntityKind;

/// Value type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Any JSON value
    Any,
    /// A string
    Str,
    /// A boolean
    Bool,
    /// An integer
    Int,
    /// An ISO-8601 / RFC 3339 timestamp string
    Timestamp,
    /// A UUID string
    Uuid,
    /// The id of another entity
    Ref(EntityKind),
    /// A list of ids of other entities
    RefList(EntityKind),
    /// A JSON array
    List,
    /// A JSON object
    Object,
    /// One of a fixed set of strings
    Enum(&'static [&'static str]),
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::Any => write!(f, "any"),
            FieldType::Str => write!(f, "string"),
            FieldType::Bool => write!(f, "boolean"),
            FieldType::Int => write!(f, "integer"),
            FieldType::Timestamp => write!(f, "timestamp"),
            FieldType::Uuid => write!(f, "uuid"),
            FieldType::Ref(kind) => write!(f, "ref<{kind}>"),
            FieldType::RefList(kind) => write!(f, "list<ref<{kind}>>"),
            FieldType::List => write!(f, "list"),
            FieldType::Object => write!(f, "object"),
            FieldType::Enum(values) => write!(f, "one of {}", values.join("|")),
        }
    }
}

/// Who may write a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// The entity identity; never writable
    Id,
    /// Managed by the server; never writable by clients
    System,
    /// Set at creation, immutable afterwards
    ReadOnly,
    /// Writable at creation and by updates
    Updatable,
}

/// Declaration of one entity field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Attribute name on the proxy
    pub name: &'static str,
    /// Field name in the backend entity
    pub entity_name: &'static str,
    /// Value type
    pub field_type: FieldType,
    /// Write access
    pub access: Access,
    /// Whether `null` is a legal value
    pub nullable: bool,
    /// Whether the field may be absent from an entity
    pub optional: bool,
    /// Maximum string length
    pub max_len: Option<usize>,
    /// Minimum string length
    pub min_len: Option<usize>,
    /// Whether changes to this reference make the referenced entity stale
    pub trigger_sync: bool,
}

impl FieldSpec {
    /// A nullable, system-managed field with the same proxy and entity name
    pub const fn new(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            entity_name: name,
            field_type,
            access: Access::System,
            nullable: true,
            optional: false,
            max_len: None,
            min_len: None,
            trigger_sync: false,
        }
    }

    /// The identity field of a kind
    pub const fn id(entity_name: &'static str) -> Self {
        Self::new("id", FieldType::Uuid)
            .entity_name(entity_name)
            .access(Access::Id)
            .not_null()
    }

    pub const fn entity_name(mut self, entity_name: &'static str) -> Self {
        self.entity_name = entity_name;
        self
    }

    pub const fn access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub const fn updatable(self) -> Self {
        self.access(Access::Updatable)
    }

    pub const fn read_only(self) -> Self {
        self.access(Access::ReadOnly)
    }

    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub const fn len(mut self, min: usize, max: usize) -> Self {
        self.min_len = Some(min);
        self.max_len = Some(max);
        self
    }

    pub const fn max_len(mut self, max: usize) -> Self {
        self.max_len = Some(max);
        self
    }

    pub const fn trigger_sync(mut self) -> Self {
        self.trigger_sync = true;
        self
    }

    /// Whether clients may set this field when creating an entity
    pub fn is_creatable(&self) -> bool {
        matches!(self.access, Access::ReadOnly | Access::Updatable)
    }

    /// Whether clients may change this field on an existing entity
    pub fn is_updatable(&self) -> bool {
        self.access == Access::Updatable
    }
}

/// The schema of one entity kind
#[derive(Debug)]
pub struct EntitySchema {
    /// The kind described
    pub kind: EntityKind,
    /// All fields, identity first
    pub fields: &'static [FieldSpec],
    /// The field holding a unique name, if the kind has one
    pub name_field: Option<&'static str>,
}
