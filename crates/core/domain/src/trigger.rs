//! 触发器。

use crate::object::{ConfigObject, NaturalKey, ObjectFlags, ObjectKind};
use crate::{HostId, ObjectId};

/// 触发器记录。`dependencies` 为其依赖的触发器 ID（有序集合语义）。
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub trigger_id: Option<ObjectId>,
    pub host_id: HostId,
    pub template_id: Option<ObjectId>,
    pub description: String,
    pub expression: String,
    pub recovery_expression: String,
    pub priority: u8,
    pub enabled: bool,
    pub comments: String,
    pub flags: ObjectFlags,
    pub dependencies: Vec<ObjectId>,
}

impl Trigger {
    pub fn new(
        host_id: impl Into<HostId>,
        description: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        Self {
            trigger_id: None,
            host_id: host_id.into(),
            template_id: None,
            description: description.into(),
            expression: expression.into(),
            recovery_expression: String::new(),
            priority: 0,
            enabled: true,
            comments: String::new(),
            flags: ObjectFlags::Normal,
            dependencies: Vec::new(),
        }
    }
}

impl ConfigObject for Trigger {
    const KIND: ObjectKind = ObjectKind::Trigger;

    fn id(&self) -> Option<&str> {
        self.trigger_id.as_deref()
    }

    fn set_id(&mut self, id: ObjectId) {
        self.trigger_id = Some(id);
    }

    fn clear_id(&mut self) {
        self.trigger_id = None;
    }

    fn owner_id(&self) -> &str {
        &self.host_id
    }

    fn set_owner_id(&mut self, owner_id: HostId) {
        self.host_id = owner_id;
    }

    fn template_id(&self) -> Option<&str> {
        self.template_id.as_deref()
    }

    fn set_template_id(&mut self, template_id: Option<ObjectId>) {
        self.template_id = template_id;
    }

    fn flags(&self) -> ObjectFlags {
        self.flags
    }

    fn natural_key(&self) -> NaturalKey {
        NaturalKey::Trigger {
            description: self.description.clone(),
            expression: self.expression.clone(),
            recovery_expression: self.recovery_expression.clone(),
        }
    }

    fn dependency_ids(&self) -> Vec<ObjectId> {
        self.dependencies.clone()
    }

    fn set_dependency_ids(&mut self, mut ids: Vec<ObjectId>) {
        ids.sort();
        ids.dedup();
        self.dependencies = ids;
    }
}
