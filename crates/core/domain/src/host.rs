//! 主机与模板信息。

use crate::object::ParseEnumError;
use crate::{HostId, ObjectId};
use std::str::FromStr;

/// 主机状态。模板与普通主机共用同一张表，仅以状态区分。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostStatus {
    Monitored,
    NotMonitored,
    Template,
}

impl HostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostStatus::Monitored => "monitored",
            HostStatus::NotMonitored => "not_monitored",
            HostStatus::Template => "template",
        }
    }
}

impl FromStr for HostStatus {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "monitored" => Ok(HostStatus::Monitored),
            "not_monitored" => Ok(HostStatus::NotMonitored),
            "template" => Ok(HostStatus::Template),
            other => Err(ParseEnumError::new("host status", other)),
        }
    }
}

/// 数据采集接口类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterfaceType {
    Agent,
    Snmp,
    Ipmi,
    Jmx,
}

impl InterfaceType {
    /// "任意接口" 监控项的选择优先级。
    pub const PRECEDENCE: [InterfaceType; 4] = [
        InterfaceType::Agent,
        InterfaceType::Snmp,
        InterfaceType::Jmx,
        InterfaceType::Ipmi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InterfaceType::Agent => "agent",
            InterfaceType::Snmp => "snmp",
            InterfaceType::Ipmi => "ipmi",
            InterfaceType::Jmx => "jmx",
        }
    }
}

impl FromStr for InterfaceType {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "agent" => Ok(InterfaceType::Agent),
            "snmp" => Ok(InterfaceType::Snmp),
            "ipmi" => Ok(InterfaceType::Ipmi),
            "jmx" => Ok(InterfaceType::Jmx),
            other => Err(ParseEnumError::new("interface type", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInterface {
    pub interface_id: String,
    pub interface_type: InterfaceType,
    pub main: bool,
}

/// 主机上的应用集。`template_ids` 为其继承自的父应用集 ID。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    pub application_id: String,
    pub name: String,
    pub template_ids: Vec<String>,
}

/// 直接链接到主机的模板。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRef {
    pub template_id: HostId,
    pub name: String,
}

/// 链接目录返回的主机视图。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub host_id: HostId,
    pub name: String,
    pub status: HostStatus,
    /// 由发现规则创建的主机。
    pub discovered: bool,
    pub interfaces: Vec<HostInterface>,
    pub applications: Vec<Application>,
    pub parent_templates: Vec<TemplateRef>,
}

impl HostInfo {
    pub fn new(host_id: impl Into<HostId>, name: impl Into<String>, status: HostStatus) -> Self {
        Self {
            host_id: host_id.into(),
            name: name.into(),
            status,
            discovered: false,
            interfaces: Vec::new(),
            applications: Vec::new(),
            parent_templates: Vec::new(),
        }
    }

    pub fn is_template(&self) -> bool {
        self.status == HostStatus::Template
    }

    pub fn links_template(&self, template_id: &str) -> bool {
        self.parent_templates
            .iter()
            .any(|item| item.template_id == template_id)
    }

    /// 主接口中指定类型的接口。
    pub fn main_interface(&self, interface_type: InterfaceType) -> Option<&HostInterface> {
        self.interfaces
            .iter()
            .find(|item| item.main && item.interface_type == interface_type)
    }

    /// 继承自 `parent_application_id` 的本机应用集。
    pub fn application_inherited_from(&self, parent_application_id: &str) -> Option<&ObjectId> {
        self.applications
            .iter()
            .find(|item| item.template_ids.iter().any(|id| id == parent_application_id))
            .map(|item| &item.application_id)
    }
}
