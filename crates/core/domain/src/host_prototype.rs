//! 主机原型与组原型。

use crate::object::{ConfigObject, NaturalKey, ObjectFlags, ObjectKind, ParseEnumError};
use crate::{HostId, ObjectId};
use std::str::FromStr;

/// 由主机原型创建的主机的资产清单填充方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InventoryMode {
    Disabled,
    #[default]
    Manual,
    Automatic,
}

impl InventoryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryMode::Disabled => "disabled",
            InventoryMode::Manual => "manual",
            InventoryMode::Automatic => "automatic",
        }
    }
}

impl FromStr for InventoryMode {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "disabled" => Ok(InventoryMode::Disabled),
            "manual" => Ok(InventoryMode::Manual),
            "automatic" => Ok(InventoryMode::Automatic),
            other => Err(ParseEnumError::new("inventory mode", other)),
        }
    }
}

/// 组原型：`name` 为按名称生成的组，`group_id` 为链接的已有主机组。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPrototype {
    pub group_prototype_id: Option<ObjectId>,
    pub name: Option<String>,
    pub group_id: Option<String>,
    pub template_id: Option<ObjectId>,
}

/// 主机原型，隶属于一条发现规则。
///
/// `template_ids` 为所创建主机要链接的模板，子原型原样继承。
#[derive(Debug, Clone, PartialEq)]
pub struct HostPrototype {
    pub host_prototype_id: Option<ObjectId>,
    pub host_id: HostId,
    pub rule_id: ObjectId,
    pub template_id: Option<ObjectId>,
    pub host: String,
    pub name: String,
    pub enabled: bool,
    pub flags: ObjectFlags,
    pub group_prototypes: Vec<GroupPrototype>,
    pub template_ids: Vec<HostId>,
    pub inventory_mode: InventoryMode,
}

impl ConfigObject for HostPrototype {
    const KIND: ObjectKind = ObjectKind::HostPrototype;

    fn id(&self) -> Option<&str> {
        self.host_prototype_id.as_deref()
    }

    fn set_id(&mut self, id: ObjectId) {
        self.host_prototype_id = Some(id);
    }

    fn clear_id(&mut self) {
        self.host_prototype_id = None;
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
        NaturalKey::HostPrototype {
            rule_id: self.rule_id.clone(),
            host: self.host.clone(),
        }
    }

    // 组原型随主机原型一起保存，不形成独立依赖边。
    fn dependency_ids(&self) -> Vec<ObjectId> {
        Vec::new()
    }

    fn set_dependency_ids(&mut self, _ids: Vec<ObjectId>) {}
}
