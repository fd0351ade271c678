//! 快照式事务：begin 克隆全部状态，rollback 整体还原。

use super::InMemoryConfigStore;
use crate::error::StorageError;
use crate::traits::UnitOfWork;
use crate::validation::ensure_actor;
use async_trait::async_trait;
use domain::SyncContext;

#[async_trait]
impl UnitOfWork for InMemoryConfigStore {
    async fn begin(&self, ctx: &SyncContext) -> Result<(), StorageError> {
        ensure_actor(ctx)?;
        let state = self.read_state()?.clone();
        let mut snapshot = self
            .snapshot
            .lock()
            .map_err(|_| StorageError::new("lock failed"))?;
        if snapshot.is_some() {
            return Err(StorageError::new("transaction already active"));
        }
        *snapshot = Some(state);
        tracing::debug!(target: "tmpl.storage", request_id = %ctx.request_id, "transaction_begin");
        Ok(())
    }

    async fn commit(&self, ctx: &SyncContext) -> Result<(), StorageError> {
        ensure_actor(ctx)?;
        let mut snapshot = self
            .snapshot
            .lock()
            .map_err(|_| StorageError::new("lock failed"))?;
        if snapshot.take().is_none() {
            return Err(StorageError::new("no active transaction"));
        }
        tracing::debug!(target: "tmpl.storage", request_id = %ctx.request_id, "transaction_commit");
        Ok(())
    }

    async fn rollback(&self, ctx: &SyncContext) -> Result<(), StorageError> {
        ensure_actor(ctx)?;
        let saved = self
            .snapshot
            .lock()
            .map_err(|_| StorageError::new("lock failed"))?
            .take()
            .ok_or_else(|| StorageError::new("no active transaction"))?;
        *self.write_state()? = saved;
        tracing::debug!(target: "tmpl.storage", request_id = %ctx.request_id, "transaction_rollback");
        Ok(())
    }
}
