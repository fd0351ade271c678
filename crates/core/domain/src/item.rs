//! 监控项（含发现规则与监控项原型）。

use crate::host::InterfaceType;
use crate::object::{ConfigObject, NaturalKey, ObjectFlags, ObjectKind, ParseEnumError};
use crate::{HostId, ObjectId};
use std::str::FromStr;

/// 监控项采集类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    ZabbixAgent,
    ZabbixActive,
    Snmp,
    SnmpTrap,
    Trapper,
    Simple,
    Internal,
    External,
    DbMonitor,
    Ipmi,
    Ssh,
    Telnet,
    Calculated,
    Aggregate,
    Jmx,
    HttpTest,
    Dependent,
}

/// 监控项对主机接口的需求。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceRequirement {
    /// 任意主接口，按固定优先级选择。
    Any,
    Exact(InterfaceType),
    NotNeeded,
}

impl ItemType {
    pub fn interface_requirement(&self) -> InterfaceRequirement {
        match self {
            ItemType::ZabbixAgent => InterfaceRequirement::Exact(InterfaceType::Agent),
            ItemType::Snmp | ItemType::SnmpTrap => InterfaceRequirement::Exact(InterfaceType::Snmp),
            ItemType::Ipmi => InterfaceRequirement::Exact(InterfaceType::Ipmi),
            ItemType::Jmx => InterfaceRequirement::Exact(InterfaceType::Jmx),
            ItemType::Simple | ItemType::External | ItemType::Ssh | ItemType::Telnet => {
                InterfaceRequirement::Any
            }
            _ => InterfaceRequirement::NotNeeded,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::ZabbixAgent => "zabbix_agent",
            ItemType::ZabbixActive => "zabbix_active",
            ItemType::Snmp => "snmp",
            ItemType::SnmpTrap => "snmp_trap",
            ItemType::Trapper => "trapper",
            ItemType::Simple => "simple",
            ItemType::Internal => "internal",
            ItemType::External => "external",
            ItemType::DbMonitor => "db_monitor",
            ItemType::Ipmi => "ipmi",
            ItemType::Ssh => "ssh",
            ItemType::Telnet => "telnet",
            ItemType::Calculated => "calculated",
            ItemType::Aggregate => "aggregate",
            ItemType::Jmx => "jmx",
            ItemType::HttpTest => "http_test",
            ItemType::Dependent => "dependent",
        }
    }
}

impl FromStr for ItemType {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let item_type = match value {
            "zabbix_agent" => ItemType::ZabbixAgent,
            "zabbix_active" => ItemType::ZabbixActive,
            "snmp" => ItemType::Snmp,
            "snmp_trap" => ItemType::SnmpTrap,
            "trapper" => ItemType::Trapper,
            "simple" => ItemType::Simple,
            "internal" => ItemType::Internal,
            "external" => ItemType::External,
            "db_monitor" => ItemType::DbMonitor,
            "ipmi" => ItemType::Ipmi,
            "ssh" => ItemType::Ssh,
            "telnet" => ItemType::Telnet,
            "calculated" => ItemType::Calculated,
            "aggregate" => ItemType::Aggregate,
            "jmx" => ItemType::Jmx,
            "http_test" => ItemType::HttpTest,
            "dependent" => ItemType::Dependent,
            other => return Err(ParseEnumError::new("item type", other)),
        };
        Ok(item_type)
    }
}

/// 监控项记录。
///
/// 发现规则与监控项原型同样以 `Item` 表示，通过 `flags` 区分；
/// 原型的 `rule_id` 指向所属发现规则。
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub item_id: Option<ObjectId>,
    pub host_id: HostId,
    pub template_id: Option<ObjectId>,
    pub name: String,
    pub key: String,
    pub item_type: ItemType,
    pub flags: ObjectFlags,
    pub delay: String,
    pub master_item_id: Option<ObjectId>,
    pub interface_id: Option<String>,
    pub rule_id: Option<ObjectId>,
    pub application_ids: Vec<String>,
    pub description: String,
}

impl Item {
    /// 构造未持久化的普通监控项。
    pub fn new(
        host_id: impl Into<HostId>,
        name: impl Into<String>,
        key: impl Into<String>,
        item_type: ItemType,
    ) -> Self {
        Self {
            item_id: None,
            host_id: host_id.into(),
            template_id: None,
            name: name.into(),
            key: key.into(),
            item_type,
            flags: ObjectFlags::Normal,
            delay: "1m".to_string(),
            master_item_id: None,
            interface_id: None,
            rule_id: None,
            application_ids: Vec::new(),
            description: String::new(),
        }
    }
}

impl ConfigObject for Item {
    const KIND: ObjectKind = ObjectKind::Item;

    fn id(&self) -> Option<&str> {
        self.item_id.as_deref()
    }

    fn set_id(&mut self, id: ObjectId) {
        self.item_id = Some(id);
    }

    fn clear_id(&mut self) {
        self.item_id = None;
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
        NaturalKey::Item {
            key: self.key.clone(),
        }
    }

    fn dependency_ids(&self) -> Vec<ObjectId> {
        self.master_item_id.iter().cloned().collect()
    }

    fn set_dependency_ids(&mut self, ids: Vec<ObjectId>) {
        self.master_item_id = ids.into_iter().next();
    }

    // 原型必须在其发现规则之后传播。
    fn prerequisite_ids(&self) -> Vec<ObjectId> {
        self.master_item_id
            .iter()
            .chain(self.rule_id.iter())
            .cloned()
            .collect()
    }
}
