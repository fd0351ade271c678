//! 命令行错误与响应错误码。

use tmpl_inherit::InheritError;
use tmpl_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid snapshot: {0}")]
    Snapshot(String),
    #[error("invalid argument: {0}")]
    Argument(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Inherit(#[from] InheritError),
}

impl CliError {
    pub fn code(&self) -> &'static str {
        match self {
            CliError::Io(_) => "SNAPSHOT.IO",
            CliError::Json(_) | CliError::Snapshot(_) => "SNAPSHOT.INVALID",
            CliError::Argument(_) => "INVALID.REQUEST",
            CliError::Storage(_) => "INHERIT.STORAGE",
            CliError::Inherit(err) => err.code(),
        }
    }
}
