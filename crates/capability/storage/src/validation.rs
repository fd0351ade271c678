//! 验证辅助函数
//!
//! - ensure_actor：验证操作者身份非空
//!
//! 所有协作者方法在访问数据前调用。

use crate::error::StorageError;
use domain::SyncContext;

/// 验证操作者 ID 非空
pub fn ensure_actor(ctx: &SyncContext) -> Result<(), StorageError> {
    if ctx.user_id.is_empty() {
        return Err(StorageError::new("user_id required"));
    }
    Ok(())
}
