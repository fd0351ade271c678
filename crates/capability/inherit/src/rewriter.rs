//! 依赖重写：把父对象的依赖边映射为目标主机上的子对象依赖边。
//!
//! 映射顺序：本轮 id_map，其次按 template_id 查询主机上已有的子对象，
//! 最后交给策略处理（保留或报 DanglingReference）。

use crate::error::InheritError;
use crate::strategy::InheritStrategy;
use domain::{ConfigObject, HostInfo, ObjectId};
use std::collections::{BTreeSet, HashMap};
use tmpl_storage::ObjectStore;

pub struct DependencyRewriter<'a, T: ConfigObject> {
    store: &'a dyn ObjectStore<T>,
    strategy: &'a dyn InheritStrategy<T>,
}

impl<'a, T: ConfigObject> DependencyRewriter<'a, T> {
    pub fn new(store: &'a dyn ObjectStore<T>, strategy: &'a dyn InheritStrategy<T>) -> Self {
        Self { store, strategy }
    }

    /// 返回 (子对象 ID, 重写后的依赖目标)；父对象必须已在 `id_map` 中解析。
    pub async fn rewrite(
        &self,
        ctx: &domain::SyncContext,
        parents: &[&T],
        host: &HostInfo,
        id_map: &HashMap<ObjectId, ObjectId>,
    ) -> Result<Vec<(ObjectId, Vec<ObjectId>)>, InheritError> {
        let unmapped: Vec<ObjectId> = parents
            .iter()
            .flat_map(|parent| parent.dependency_ids())
            .filter(|id| !id_map.contains_key(id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let existing: HashMap<ObjectId, T> = if unmapped.is_empty() {
            HashMap::new()
        } else {
            self.store
                .find_by_template_ids(ctx, &unmapped, Some(std::slice::from_ref(&host.host_id)))
                .await?
                .into_iter()
                .filter_map(|child| child.template_id().map(str::to_string).map(|id| (id, child)))
                .collect()
        };

        let mut rewritten = Vec::with_capacity(parents.len());
        for parent in parents {
            let parent_id = parent.id().unwrap_or_default();
            let child_id = id_map.get(parent_id).cloned().ok_or_else(|| {
                InheritError::DanglingReference {
                    kind: T::KIND,
                    from: parent.label(),
                    to: parent_id.to_string(),
                    host: host.name.clone(),
                }
            })?;
            let mut targets = Vec::new();
            for dependency in parent.dependency_ids() {
                let target = if let Some(mapped) = id_map.get(&dependency) {
                    mapped.clone()
                } else if let Some(child) = existing.get(&dependency) {
                    if T::KIND.edges_share_owner() && child.owner_id() != host.host_id {
                        return Err(InheritError::OwnerMismatch {
                            kind: T::KIND,
                            from: child_id,
                            to: child.id().unwrap_or_default().to_string(),
                        });
                    }
                    child.id().unwrap_or_default().to_string()
                } else {
                    self.strategy
                        .unresolved_dependency(ctx, parent, &dependency, host)
                        .await?
                };
                targets.push(target);
            }
            targets.sort();
            targets.dedup();
            rewritten.push((child_id, targets));
        }
        Ok(rewritten)
    }
}
