//! 同步运行配置加载。

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 同步运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// JSON 配置快照路径。
    pub snapshot_path: String,
    pub actor: String,
    /// 操作者角色（逗号分隔），默认 admin。
    pub roles: Vec<String>,
    /// 形如 `HOST.WRITE:<host_id>` 的权限码。
    pub permissions: Vec<String>,
    pub max_dependency_depth: usize,
    pub max_dependency_count: usize,
    pub pretty_output: bool,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let snapshot_path = env::var("TMPL_SNAPSHOT_PATH")
            .map_err(|_| ConfigError::Missing("TMPL_SNAPSHOT_PATH".to_string()))?;
        let actor = read_optional("TMPL_ACTOR").unwrap_or_else(|| "system".to_string());
        let roles = read_list("TMPL_ROLES").unwrap_or_else(|| vec!["admin".to_string()]);
        let permissions = read_list("TMPL_PERMISSIONS").unwrap_or_default();
        let max_dependency_depth = read_usize_with_default("TMPL_MAX_DEPENDENCY_DEPTH", 3)?;
        let max_dependency_count = read_usize_with_default("TMPL_MAX_DEPENDENCY_COUNT", 999)?;
        let pretty_output = read_bool_with_default("TMPL_PRETTY_OUTPUT", false);

        if max_dependency_depth == 0 {
            return Err(ConfigError::Invalid(
                "TMPL_MAX_DEPENDENCY_DEPTH".to_string(),
                "0".to_string(),
            ));
        }

        Ok(Self {
            snapshot_path,
            actor,
            roles,
            permissions,
            max_dependency_depth,
            max_dependency_count,
            pretty_output,
        })
    }
}

fn read_usize_with_default(key: &str, default: usize) -> Result<usize, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<usize>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_list(key: &str) -> Option<Vec<String>> {
    read_optional(key).map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}
