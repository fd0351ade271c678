//! 三类配置对象的公共抽象。
//!
//! - `ObjectFlags`：普通 / 发现规则 / 原型 / 已发现
//! - `NaturalKey`：对象在所属主机上的身份键
//! - `ConfigObject`：继承引擎依赖的最小对象接口
//! - `DependencyEdge`：对象间依赖边（主监控项、触发器依赖）

use crate::{HostId, ObjectId};
use std::fmt;
use std::str::FromStr;

/// 枚举字符串解析失败。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

/// 对象变体标志。不同标志的对象共享同一自然键时总是冲突。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ObjectFlags {
    #[default]
    Normal,
    DiscoveryRule,
    Prototype,
    Discovered,
}

impl ObjectFlags {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectFlags::Normal => "normal",
            ObjectFlags::DiscoveryRule => "discovery_rule",
            ObjectFlags::Prototype => "prototype",
            ObjectFlags::Discovered => "discovered",
        }
    }
}

impl FromStr for ObjectFlags {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "normal" => Ok(ObjectFlags::Normal),
            "discovery_rule" => Ok(ObjectFlags::DiscoveryRule),
            "prototype" => Ok(ObjectFlags::Prototype),
            "discovered" => Ok(ObjectFlags::Discovered),
            other => Err(ParseEnumError::new("object flags", other)),
        }
    }
}

/// 配置对象种类。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Item,
    Trigger,
    HostPrototype,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Item => "item",
            ObjectKind::Trigger => "trigger",
            ObjectKind::HostPrototype => "host prototype",
        }
    }

    /// 依赖边两端是否必须属于同一主机（监控项主从链）。
    pub fn edges_share_owner(&self) -> bool {
        matches!(self, ObjectKind::Item)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 对象在所属主机上的身份键。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NaturalKey {
    Item {
        key: String,
    },
    /// 表达式为已解析到目标主机的形式。
    Trigger {
        description: String,
        expression: String,
        recovery_expression: String,
    },
    HostPrototype {
        rule_id: ObjectId,
        host: String,
    },
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NaturalKey::Item { key } => f.write_str(key),
            NaturalKey::Trigger { description, .. } => f.write_str(description),
            NaturalKey::HostPrototype { host, .. } => f.write_str(host),
        }
    }
}

/// 有向依赖边 `from -> to`。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyEdge {
    pub from_id: ObjectId,
    pub to_id: ObjectId,
}

impl DependencyEdge {
    pub fn new(from_id: impl Into<ObjectId>, to_id: impl Into<ObjectId>) -> Self {
        Self {
            from_id: from_id.into(),
            to_id: to_id.into(),
        }
    }
}

/// 继承引擎所需的对象接口。
///
/// 三类对象（监控项、触发器、主机原型）共享同一套传播流程，
/// 差异由各自的 `InheritStrategy` 补足。
pub trait ConfigObject: Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
    const KIND: ObjectKind;

    fn id(&self) -> Option<&str>;
    fn set_id(&mut self, id: ObjectId);
    /// 清除 ID，表示尚未持久化。
    fn clear_id(&mut self);
    fn owner_id(&self) -> &str;
    fn set_owner_id(&mut self, owner_id: HostId);
    fn template_id(&self) -> Option<&str>;
    fn set_template_id(&mut self, template_id: Option<ObjectId>);
    fn flags(&self) -> ObjectFlags;
    fn natural_key(&self) -> NaturalKey;

    /// 出边目标（主监控项 / 依赖触发器）。
    fn dependency_ids(&self) -> Vec<ObjectId>;
    fn set_dependency_ids(&mut self, ids: Vec<ObjectId>);

    /// 同批次内必须先传播的对象。
    fn prerequisite_ids(&self) -> Vec<ObjectId> {
        self.dependency_ids()
    }

    /// 出现在错误信息中的可读名称。
    fn label(&self) -> String {
        self.natural_key().to_string()
    }

    fn edges(&self) -> Vec<DependencyEdge> {
        match self.id() {
            Some(id) => self
                .dependency_ids()
                .into_iter()
                .map(|to_id| DependencyEdge::new(id, to_id))
                .collect(),
            None => Vec::new(),
        }
    }
}
