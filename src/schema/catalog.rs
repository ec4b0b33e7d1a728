//! Field declarations of every entity kind

use super::types::{EntitySchema, FieldSpec, FieldType};
use crate::types::EntityKind;

const ID: FieldSpec = FieldSpec::id("id");

const ENTITY_STATES: &[&str] = &["active", "deleted", "draft"];
const EXEC_STATES: &[&str] = &["running", "failed", "succeeded"];
const TOOL_CATEGORIES: &[&str] = &[
    "discovery",
    "interlinking",
    "annotation",
    "cleaning",
    "synopses",
    "forecasting",
    "other",
];

// Fields shared by datasets, processes, workflows and tools
const PKG_NAME: FieldSpec = FieldSpec::new("name", FieldType::Str)
    .updatable()
    .not_null()
    .len(2, 100);
const PKG_STATE: FieldSpec = FieldSpec::new("state", FieldType::Enum(ENTITY_STATES));
const PKG_TYPE: FieldSpec = FieldSpec::new("type", FieldType::Str);
const PKG_TITLE: FieldSpec = FieldSpec::new("title", FieldType::Str).updatable();
const PKG_NOTES: FieldSpec = FieldSpec::new("notes", FieldType::Str).updatable();
const PKG_AUTHOR: FieldSpec = FieldSpec::new("author", FieldType::Str).updatable();
const PKG_AUTHOR_EMAIL: FieldSpec = FieldSpec::new("author_email", FieldType::Str).updatable();
const PKG_MAINTAINER: FieldSpec = FieldSpec::new("maintainer", FieldType::Str).updatable();
const PKG_MAINTAINER_EMAIL: FieldSpec =
    FieldSpec::new("maintainer_email", FieldType::Str).updatable();
const PKG_VERSION: FieldSpec = FieldSpec::new("version", FieldType::Str)
    .updatable()
    .max_len(100);
const PKG_URL: FieldSpec = FieldSpec::new("url", FieldType::Str).updatable();
const PKG_PRIVATE: FieldSpec = FieldSpec::new("private", FieldType::Bool).updatable();
const PKG_ORGANIZATION: FieldSpec =
    FieldSpec::new("organization", FieldType::Ref(EntityKind::Organization))
        .entity_name("owner_org")
        .updatable()
        .trigger_sync();
const PKG_TAGS: FieldSpec = FieldSpec::new("tags", FieldType::List).updatable();
const PKG_EXTRAS: FieldSpec = FieldSpec::new("extras", FieldType::Object)
    .updatable()
    .optional();
const PKG_CREATED: FieldSpec = FieldSpec::new("metadata_created", FieldType::Timestamp);
const PKG_MODIFIED: FieldSpec = FieldSpec::new("metadata_modified", FieldType::Timestamp);
const PKG_CREATOR: FieldSpec = FieldSpec::new("creator_user_id", FieldType::Uuid);

static DATASET: EntitySchema = EntitySchema {
    kind: EntityKind::Dataset,
    fields: &[
        ID,
        PKG_NAME,
        PKG_STATE,
        PKG_TYPE,
        PKG_TITLE,
        PKG_NOTES,
        PKG_AUTHOR,
        PKG_AUTHOR_EMAIL,
        PKG_MAINTAINER,
        PKG_MAINTAINER_EMAIL,
        PKG_VERSION,
        PKG_URL,
        PKG_PRIVATE,
        PKG_ORGANIZATION,
        PKG_TAGS,
        PKG_EXTRAS,
        PKG_CREATED,
        PKG_MODIFIED,
        PKG_CREATOR,
        FieldSpec::new("spatial", FieldType::Object).updatable(),
        FieldSpec::new("resources", FieldType::RefList(EntityKind::Resource)).optional(),
    ],
    name_field: Some("name"),
};

static RESOURCE: EntitySchema = EntitySchema {
    kind: EntityKind::Resource,
    fields: &[
        ID,
        FieldSpec::new("dataset", FieldType::Ref(EntityKind::Dataset))
            .entity_name("package_id")
            .read_only()
            .not_null()
            .trigger_sync(),
        FieldSpec::new("name", FieldType::Str).updatable(),
        FieldSpec::new("url", FieldType::Str).updatable(),
        FieldSpec::new("format", FieldType::Str).updatable(),
        FieldSpec::new("description", FieldType::Str).updatable(),
        FieldSpec::new("resource_type", FieldType::Str).updatable(),
        FieldSpec::new("mimetype", FieldType::Str).updatable(),
        FieldSpec::new("size", FieldType::Int).updatable(),
        FieldSpec::new("hash", FieldType::Str).updatable(),
        FieldSpec::new("position", FieldType::Int),
        FieldSpec::new("state", FieldType::Enum(ENTITY_STATES)),
        FieldSpec::new("created", FieldType::Timestamp).read_only(),
        FieldSpec::new("last_modified", FieldType::Timestamp).updatable(),
        FieldSpec::new("metadata_modified", FieldType::Timestamp),
    ],
    name_field: None,
};

const GROUP_FIELDS: &[FieldSpec] = &[
    ID,
    PKG_NAME,
    FieldSpec::new("is_organization", FieldType::Bool),
    FieldSpec::new("type", FieldType::Str).not_null(),
    FieldSpec::new("state", FieldType::Enum(ENTITY_STATES)),
    FieldSpec::new("created", FieldType::Timestamp),
    FieldSpec::new("approval_status", FieldType::Str).updatable(),
    FieldSpec::new("title", FieldType::Str).updatable(),
    FieldSpec::new("description", FieldType::Str).updatable(),
    FieldSpec::new("image_url", FieldType::Str).updatable(),
    PKG_EXTRAS,
];

static ORGANIZATION: EntitySchema = EntitySchema {
    kind: EntityKind::Organization,
    fields: GROUP_FIELDS,
    name_field: Some("name"),
};

static GROUP: EntitySchema = EntitySchema {
    kind: EntityKind::Group,
    fields: GROUP_FIELDS,
    name_field: Some("name"),
};

static USER: EntitySchema = EntitySchema {
    kind: EntityKind::User,
    fields: &[
        ID,
        FieldSpec::new("username", FieldType::Str)
            .read_only()
            .not_null()
            .len(2, 100),
        FieldSpec::new("fullname", FieldType::Str).updatable(),
        FieldSpec::new("first_name", FieldType::Str).updatable(),
        FieldSpec::new("last_name", FieldType::Str).updatable(),
        FieldSpec::new("email", FieldType::Str).updatable(),
        FieldSpec::new("joined_date", FieldType::Timestamp),
        FieldSpec::new("active", FieldType::Bool),
    ],
    name_field: Some("username"),
};

static PROCESS: EntitySchema = EntitySchema {
    kind: EntityKind::Process,
    fields: &[
        ID,
        PKG_NAME,
        PKG_STATE,
        PKG_TYPE,
        PKG_TITLE,
        PKG_NOTES,
        PKG_VERSION,
        PKG_URL,
        PKG_ORGANIZATION,
        PKG_TAGS,
        PKG_EXTRAS,
        PKG_CREATED,
        PKG_MODIFIED,
        FieldSpec::new("creator", FieldType::Str),
        FieldSpec::new("workflow", FieldType::Ref(EntityKind::Workflow))
            .entity_name("workflow_id")
            .updatable(),
        FieldSpec::new("tasks", FieldType::RefList(EntityKind::Task)).optional(),
        FieldSpec::new("start_date", FieldType::Timestamp),
        FieldSpec::new("end_date", FieldType::Timestamp).updatable(),
        FieldSpec::new("exec_state", FieldType::Enum(EXEC_STATES)),
    ],
    name_field: Some("name"),
};

static WORKFLOW: EntitySchema = EntitySchema {
    kind: EntityKind::Workflow,
    fields: &[
        ID,
        PKG_NAME,
        PKG_STATE,
        PKG_TYPE,
        PKG_TITLE,
        PKG_NOTES,
        PKG_VERSION,
        PKG_ORGANIZATION,
        PKG_TAGS,
        PKG_EXTRAS,
        PKG_CREATED,
        PKG_MODIFIED,
        FieldSpec::new("repository", FieldType::Str).updatable(),
        FieldSpec::new("executor", FieldType::Str).updatable(),
    ],
    name_field: Some("name"),
};

static TOOL: EntitySchema = EntitySchema {
    kind: EntityKind::Tool,
    fields: &[
        ID,
        PKG_NAME,
        PKG_STATE,
        PKG_TYPE,
        PKG_TITLE,
        PKG_NOTES,
        PKG_VERSION,
        PKG_ORGANIZATION,
        PKG_TAGS,
        PKG_EXTRAS,
        PKG_CREATED,
        PKG_MODIFIED,
        FieldSpec::new("git_repository", FieldType::Str).updatable(),
        FieldSpec::new("programming_language", FieldType::Str).updatable(),
        FieldSpec::new("inputs", FieldType::Object).updatable(),
        FieldSpec::new("outputs", FieldType::Object).updatable(),
        FieldSpec::new("parameters", FieldType::Object).updatable(),
        FieldSpec::new("category", FieldType::Enum(TOOL_CATEGORIES)).updatable(),
        FieldSpec::new("repository", FieldType::Str)
            .read_only()
            .not_null(),
    ],
    name_field: Some("name"),
};

static TASK: EntitySchema = EntitySchema {
    kind: EntityKind::Task,
    fields: &[
        FieldSpec::id("task_exec_id"),
        FieldSpec::new("process", FieldType::Ref(EntityKind::Process))
            .entity_name("workflow_exec_id")
            .read_only()
            .not_null()
            .trigger_sync(),
        FieldSpec::new("start_date", FieldType::Timestamp),
        FieldSpec::new("end_date", FieldType::Timestamp),
        FieldSpec::new("state", FieldType::Str),
        FieldSpec::new("creator", FieldType::Str),
        FieldSpec::new("messages", FieldType::Str).optional(),
        FieldSpec::new("metrics", FieldType::Object).optional(),
        FieldSpec::new("output", FieldType::List).optional(),
        FieldSpec::new("tool_name", FieldType::Str).read_only().optional(),
        FieldSpec::new("tool_image", FieldType::Str).read_only().optional(),
        FieldSpec::new("tags", FieldType::Object).optional(),
    ],
    name_field: None,
};

static VOCABULARY: EntitySchema = EntitySchema {
    kind: EntityKind::Vocabulary,
    fields: &[
        ID,
        FieldSpec::new("name", FieldType::Str)
            .read_only()
            .not_null()
            .len(2, 100),
        FieldSpec::new("tags", FieldType::RefList(EntityKind::Tag)).optional(),
    ],
    name_field: Some("name"),
};

static TAG: EntitySchema = EntitySchema {
    kind: EntityKind::Tag,
    fields: &[
        ID,
        FieldSpec::new("name", FieldType::Str)
            .read_only()
            .not_null()
            .len(2, 100),
        FieldSpec::new("vocabulary", FieldType::Ref(EntityKind::Vocabulary))
            .entity_name("vocabulary_id")
            .read_only()
            .trigger_sync(),
    ],
    name_field: Some("name"),
};

static POLICY: EntitySchema = EntitySchema {
    kind: EntityKind::Policy,
    fields: &[
        FieldSpec::id("policy_uuid"),
        FieldSpec::new("creator", FieldType::Str)
            .entity_name("user_id")
            .not_null(),
        FieldSpec::new("active", FieldType::Bool).not_null(),
        FieldSpec::new("created_at", FieldType::Timestamp).not_null(),
        FieldSpec::new("policy_name", FieldType::Str)
            .entity_name("policy_familiar_name")
            .updatable()
            .not_null(),
    ],
    name_field: None,
};

/// Return the schema of a kind
pub fn schema_for(kind: EntityKind) -> &'static EntitySchema {
    match kind {
        EntityKind::Dataset => &DATASET,
        EntityKind::Resource => &RESOURCE,
        EntityKind::Organization => &ORGANIZATION,
        EntityKind::Group => &GROUP,
        EntityKind::User => &USER,
        EntityKind::Process => &PROCESS,
        EntityKind::Workflow => &WORKFLOW,
        EntityKind::Tool => &TOOL,
        EntityKind::Task => &TASK,
        EntityKind::Vocabulary => &VOCABULARY,
        EntityKind::Tag => &TAG,
        EntityKind::Policy => &POLICY,
    }
}
