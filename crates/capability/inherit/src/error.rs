//! 继承引擎错误类型。
//!
//! 任一错误都会中止整个级联调用，已写入的内容随事务回滚。

use domain::{HostId, ObjectId, ObjectKind};
use tmpl_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum InheritError {
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },
    #[error("{kind} \"{key}\" on \"{host}\" is already used by an object of another type")]
    FlagConflict {
        kind: ObjectKind,
        key: String,
        host: String,
    },
    #[error("{kind} \"{key}\" already exists on \"{host}\", inherited from another template")]
    AlreadyLinked {
        kind: ObjectKind,
        key: String,
        host: String,
    },
    #[error("{kind} \"{key}\" already exists on \"{host}\"")]
    AlreadyExists {
        kind: ObjectKind,
        key: String,
        host: String,
    },
    #[error("{kind} \"{key}\" on \"{host}\" belongs to another discovery rule")]
    RuleMismatch {
        kind: ObjectKind,
        key: String,
        host: String,
    },
    #[error("cannot find interface on \"{host}\" for item \"{key}\"")]
    NoInterface { host: String, key: String },
    #[error("{kind} \"{from}\" references {to}, which has no counterpart on \"{host}\"")]
    DanglingReference {
        kind: ObjectKind,
        from: String,
        to: ObjectId,
        host: String,
    },
    #[error("circular dependency is not allowed: {}", .chain.join(" -> "))]
    CircularDependency { chain: Vec<ObjectId> },
    #[error("dependency chain exceeds {limit} levels: {}", .chain.join(" -> "))]
    DepthExceeded { limit: usize, chain: Vec<ObjectId> },
    #[error("dependency tree of {root} has {count} dependents, limit is {limit}")]
    FanOutExceeded {
        root: ObjectId,
        count: usize,
        limit: usize,
    },
    #[error("{kind} {id} cannot depend on itself")]
    SelfDependency { kind: ObjectKind, id: ObjectId },
    #[error("duplicate dependency from {from} to {to}")]
    DuplicateDependency { from: ObjectId, to: ObjectId },
    #[error("trigger {from} on a host cannot depend on template trigger {to}")]
    HostToTemplate { from: ObjectId, to: ObjectId },
    #[error("trigger {from} cannot depend on {to}, which is inherited from it")]
    DependsOnChild { from: ObjectId, to: ObjectId },
    #[error("trigger {from} cannot depend on {to} from \"{host}\", which is linked to its template")]
    DependsOnLinkedHost { from: ObjectId, to: ObjectId, host: String },
    #[error("trigger {from} cannot depend on {to} from parent template \"{template}\"")]
    DependsOnParentTemplate {
        from: ObjectId,
        to: ObjectId,
        template: String,
    },
    #[error("{kind} {from} and its dependency {to} belong to different hosts")]
    OwnerMismatch {
        kind: ObjectKind,
        from: ObjectId,
        to: ObjectId,
    },
    #[error("host \"{host}\" is not linked to template \"{template}\"")]
    MissingTemplateLink { host: String, template: String },
    #[error("trigger {id} references templates with different linkages: {}", .templates.join(", "))]
    LinkageMismatch { id: ObjectId, templates: Vec<String> },
    #[error("trigger {id} has inherited children and cannot be moved to {owner}")]
    MovedWithChildren { id: ObjectId, owner: HostId },
    #[error("no write permission on {}", .owners.join(", "))]
    Permission { owners: Vec<HostId> },
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl InheritError {
    pub(crate) fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 稳定的错误码，供响应封装使用。
    pub fn code(&self) -> &'static str {
        match self {
            InheritError::Validation { .. } => "INHERIT.VALIDATION",
            InheritError::FlagConflict { .. } => "INHERIT.FLAG_CONFLICT",
            InheritError::AlreadyLinked { .. } => "INHERIT.ALREADY_LINKED",
            InheritError::AlreadyExists { .. } => "INHERIT.ALREADY_EXISTS",
            InheritError::RuleMismatch { .. } => "INHERIT.RULE_MISMATCH",
            InheritError::NoInterface { .. } => "INHERIT.NO_INTERFACE",
            InheritError::DanglingReference { .. } => "INHERIT.DANGLING_REFERENCE",
            InheritError::CircularDependency { .. } => "INHERIT.CIRCULAR_DEPENDENCY",
            InheritError::DepthExceeded { .. } => "INHERIT.DEPTH_EXCEEDED",
            InheritError::FanOutExceeded { .. } => "INHERIT.FAN_OUT_EXCEEDED",
            InheritError::SelfDependency { .. } => "INHERIT.SELF_DEPENDENCY",
            InheritError::DuplicateDependency { .. } => "INHERIT.DUPLICATE_DEPENDENCY",
            InheritError::HostToTemplate { .. } => "INHERIT.HOST_TO_TEMPLATE",
            InheritError::DependsOnChild { .. } => "INHERIT.DEPENDS_ON_CHILD",
            InheritError::DependsOnLinkedHost { .. } => "INHERIT.DEPENDS_ON_LINKED_HOST",
            InheritError::DependsOnParentTemplate { .. } => "INHERIT.DEPENDS_ON_PARENT_TEMPLATE",
            InheritError::OwnerMismatch { .. } => "INHERIT.OWNER_MISMATCH",
            InheritError::MissingTemplateLink { .. } => "INHERIT.MISSING_TEMPLATE_LINK",
            InheritError::LinkageMismatch { .. } => "INHERIT.LINKAGE_MISMATCH",
            InheritError::MovedWithChildren { .. } => "INHERIT.MOVED_WITH_CHILDREN",
            InheritError::Permission { .. } => "INHERIT.PERMISSION",
            InheritError::Storage(_) => "INHERIT.STORAGE",
        }
    }
}
