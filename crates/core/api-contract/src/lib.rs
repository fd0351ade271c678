//! 稳定的 DTO 与 CLI 输出契约。
//!
//! 快照文件与命令输出均为 camelCase JSON；枚举字段以字符串承载，
//! 由调用方解析为领域类型。

use serde::{Deserialize, Serialize};

/// 标准响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_flags() -> String {
    "normal".to_string()
}

fn default_inventory_mode() -> String {
    "manual".to_string()
}

fn default_delay() -> String {
    "1m".to_string()
}

/// 配置快照：主机、模板链接与三类对象。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDto {
    #[serde(default)]
    pub hosts: Vec<HostDto>,
    #[serde(default)]
    pub links: Vec<LinkDto>,
    #[serde(default)]
    pub items: Vec<ItemDto>,
    #[serde(default)]
    pub triggers: Vec<TriggerDto>,
    #[serde(default)]
    pub host_prototypes: Vec<HostPrototypeDto>,
}

/// 主机或模板。`status`：monitored / not_monitored / template。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostDto {
    pub host_id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub discovered: bool,
    #[serde(default)]
    pub interfaces: Vec<InterfaceDto>,
    #[serde(default)]
    pub applications: Vec<ApplicationDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceDto {
    pub interface_id: String,
    #[serde(rename = "type")]
    pub interface_type: String,
    #[serde(default = "default_true")]
    pub main: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDto {
    pub application_id: String,
    pub name: String,
    #[serde(default)]
    pub template_ids: Vec<String>,
}

/// 模板 -> 主机（或子模板）的直接链接。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkDto {
    pub template_id: String,
    pub host_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDto {
    #[serde(default)]
    pub item_id: Option<String>,
    pub host_id: String,
    #[serde(default)]
    pub template_id: Option<String>,
    pub name: String,
    pub key: String,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default = "default_flags")]
    pub flags: String,
    #[serde(default = "default_delay")]
    pub delay: String,
    #[serde(default)]
    pub master_item_id: Option<String>,
    #[serde(default)]
    pub interface_id: Option<String>,
    #[serde(default)]
    pub rule_id: Option<String>,
    #[serde(default)]
    pub application_ids: Vec<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerDto {
    #[serde(default)]
    pub trigger_id: Option<String>,
    pub host_id: String,
    #[serde(default)]
    pub template_id: Option<String>,
    pub description: String,
    pub expression: String,
    #[serde(default)]
    pub recovery_expression: String,
    #[serde(default)]
    pub priority: u8,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub comments: String,
    #[serde(default = "default_flags")]
    pub flags: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostPrototypeDto {
    #[serde(default)]
    pub host_prototype_id: Option<String>,
    pub host_id: String,
    pub rule_id: String,
    #[serde(default)]
    pub template_id: Option<String>,
    pub host: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_flags")]
    pub flags: String,
    #[serde(default)]
    pub group_prototypes: Vec<GroupPrototypeDto>,
    #[serde(default)]
    pub template_ids: Vec<String>,
    /// disabled / manual / automatic
    #[serde(default = "default_inventory_mode")]
    pub inventory_mode: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPrototypeDto {
    #[serde(default)]
    pub group_prototype_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub template_id: Option<String>,
}

/// 传播统计。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDto {
    pub passes: usize,
    pub hosts: usize,
    pub created: usize,
    pub updated: usize,
    pub adopted: usize,
    pub unchanged: usize,
    pub edges_written: usize,
    pub deleted: usize,
    pub detached: usize,
}

/// 写操作命令的输出：统计与执行后的快照。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResultDto {
    pub request_id: String,
    pub operation: String,
    pub report: ReportDto,
    pub snapshot: SnapshotDto,
}

/// 依赖校验命令的输出。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResultDto {
    pub request_id: String,
    pub kind: String,
    pub checked: usize,
}
