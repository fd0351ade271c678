//! 模板继承领域模型：主机、配置对象（监控项 / 触发器 / 主机原型）与执行上下文。

pub mod expression;
pub mod host;
pub mod host_prototype;
pub mod item;
pub mod object;
pub mod trigger;

pub use host::{Application, HostInfo, HostInterface, HostStatus, InterfaceType, TemplateRef};
pub use host_prototype::{GroupPrototype, HostPrototype, InventoryMode};
pub use item::{InterfaceRequirement, Item, ItemType};
pub use object::{ConfigObject, DependencyEdge, NaturalKey, ObjectFlags, ObjectKind, ParseEnumError};
pub use trigger::Trigger;

/// 配置对象 ID（持久化时分配）。
pub type ObjectId = String;
/// 主机或模板 ID。
pub type HostId = String;

/// 同步上下文：每次调用显式携带的操作者身份。
#[derive(Debug, Clone)]
pub struct SyncContext {
    pub request_id: String,
    pub user_id: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

impl SyncContext {
    /// 构造显式身份与权限范围的上下文。
    pub fn new(
        request_id: impl Into<String>,
        user_id: impl Into<String>,
        roles: Vec<String>,
        permissions: Vec<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            user_id: user_id.into(),
            roles,
            permissions,
        }
    }

    /// 系统内部操作者（拥有 admin 角色）。
    pub fn system(request_id: impl Into<String>) -> Self {
        Self::new(request_id, "system", vec!["admin".to_string()], Vec::new())
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|item| item == role)
    }
}

impl Default for SyncContext {
    /// 空上下文（仅用于测试或占位）。
    fn default() -> Self {
        Self {
            request_id: "".to_string(),
            user_id: "".to_string(),
            roles: Vec::new(),
            permissions: Vec::new(),
        }
    }
}
