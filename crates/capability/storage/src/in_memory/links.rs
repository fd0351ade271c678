//! 链接目录的内存实现。

use super::InMemoryConfigStore;
use crate::error::StorageError;
use crate::traits::LinkDirectory;
use crate::validation::ensure_actor;
use async_trait::async_trait;
use domain::{HostId, HostInfo, SyncContext};
use std::collections::BTreeSet;

#[async_trait]
impl LinkDirectory for InMemoryConfigStore {
    async fn resolve_linked_hosts(
        &self,
        ctx: &SyncContext,
        template_ids: &[HostId],
        host_filter: Option<&[HostId]>,
    ) -> Result<Vec<HostInfo>, StorageError> {
        ensure_actor(ctx)?;
        let state = self.read_state()?;
        let linked: BTreeSet<&HostId> = state
            .links
            .iter()
            .filter(|(template_id, _)| template_ids.contains(template_id))
            .map(|(_, host_id)| host_id)
            .filter(|host_id| host_filter.is_none_or(|filter| filter.contains(*host_id)))
            .collect();
        Ok(linked
            .into_iter()
            .filter_map(|host_id| state.host_info(host_id))
            .collect())
    }

    async fn find_hosts(
        &self,
        ctx: &SyncContext,
        host_ids: &[HostId],
    ) -> Result<Vec<HostInfo>, StorageError> {
        ensure_actor(ctx)?;
        let state = self.read_state()?;
        let wanted: BTreeSet<&HostId> = host_ids.iter().collect();
        Ok(wanted
            .into_iter()
            .filter_map(|host_id| state.host_info(host_id))
            .collect())
    }

    async fn find_hosts_by_name(
        &self,
        ctx: &SyncContext,
        names: &[String],
    ) -> Result<Vec<HostInfo>, StorageError> {
        ensure_actor(ctx)?;
        let state = self.read_state()?;
        Ok(state
            .hosts
            .values()
            .filter(|host| names.contains(&host.name))
            .filter_map(|host| state.host_info(&host.host_id))
            .collect())
    }
}
