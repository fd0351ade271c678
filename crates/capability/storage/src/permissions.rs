//! 基于角色与权限码的写权限判定。

use crate::error::StorageError;
use crate::traits::PermissionChecker;
use crate::validation::ensure_actor;
use async_trait::async_trait;
use domain::{HostId, SyncContext};

/// admin 角色可写任意主机；其他用户需持有 `HOST.WRITE:<host_id>`。
#[derive(Debug, Clone, Default)]
pub struct RolePermissionChecker;

impl RolePermissionChecker {
    pub fn new() -> Self {
        Self
    }
}

pub fn host_write_permission(host_id: &str) -> String {
    format!("HOST.WRITE:{host_id}")
}

#[async_trait]
impl PermissionChecker for RolePermissionChecker {
    async fn can_write(
        &self,
        ctx: &SyncContext,
        owner_ids: &[HostId],
    ) -> Result<bool, StorageError> {
        ensure_actor(ctx)?;
        if ctx.has_role("admin") {
            return Ok(true);
        }
        let allowed = owner_ids.iter().all(|owner_id| {
            let required = host_write_permission(owner_id);
            ctx.permissions.iter().any(|item| *item == required)
        });
        Ok(allowed)
    }
}
