//! 配置对象的内存表与读写实现。

use super::{InMemoryConfigStore, StoreState};
use crate::error::StorageError;
use crate::traits::{ObjectPersister, ObjectReader};
use crate::validation::ensure_actor;
use async_trait::async_trait;
use domain::{
    ConfigObject, HostId, HostPrototype, Item, NaturalKey, ObjectId, SyncContext, Trigger,
};
use std::collections::BTreeSet;

/// 可存放在 `StoreState` 中的对象种类。
pub trait StoredObject: ConfigObject {
    const ID_PREFIX: &'static str;

    fn table(state: &StoreState) -> &std::collections::BTreeMap<ObjectId, Self>;
    fn table_mut(state: &mut StoreState) -> &mut std::collections::BTreeMap<ObjectId, Self>;

    /// 为嵌套记录分配 ID。
    fn assign_nested_ids(&mut self, _allocate: &mut dyn FnMut(&str) -> ObjectId) {}

    /// 删除对象并清理引用它们的记录。
    fn cascade_delete(state: &mut StoreState, ids: BTreeSet<ObjectId>) {
        let table = Self::table_mut(state);
        for id in &ids {
            table.remove(id);
        }
    }
}

impl StoredObject for Item {
    const ID_PREFIX: &'static str = "item";

    fn table(state: &StoreState) -> &std::collections::BTreeMap<ObjectId, Self> {
        &state.items
    }

    fn table_mut(state: &mut StoreState) -> &mut std::collections::BTreeMap<ObjectId, Self> {
        &mut state.items
    }

    // 依赖项与发现规则下的原型一并删除。
    fn cascade_delete(state: &mut StoreState, mut ids: BTreeSet<ObjectId>) {
        loop {
            let extra: Vec<ObjectId> = state
                .items
                .values()
                .filter(|item| {
                    item.master_item_id
                        .iter()
                        .chain(item.rule_id.iter())
                        .any(|id| ids.contains(id))
                })
                .filter_map(|item| item.item_id.clone())
                .filter(|id| !ids.contains(id))
                .collect();
            if extra.is_empty() {
                break;
            }
            ids.extend(extra);
        }
        state.items.retain(|id, _| !ids.contains(id));
        state
            .host_prototypes
            .retain(|_, prototype| !ids.contains(&prototype.rule_id));
    }
}

impl StoredObject for Trigger {
    const ID_PREFIX: &'static str = "trigger";

    fn table(state: &StoreState) -> &std::collections::BTreeMap<ObjectId, Self> {
        &state.triggers
    }

    fn table_mut(state: &mut StoreState) -> &mut std::collections::BTreeMap<ObjectId, Self> {
        &mut state.triggers
    }

    fn cascade_delete(state: &mut StoreState, ids: BTreeSet<ObjectId>) {
        state.triggers.retain(|id, _| !ids.contains(id));
        for trigger in state.triggers.values_mut() {
            trigger.dependencies.retain(|id| !ids.contains(id));
        }
    }
}

impl StoredObject for HostPrototype {
    const ID_PREFIX: &'static str = "hp";

    fn table(state: &StoreState) -> &std::collections::BTreeMap<ObjectId, Self> {
        &state.host_prototypes
    }

    fn table_mut(state: &mut StoreState) -> &mut std::collections::BTreeMap<ObjectId, Self> {
        &mut state.host_prototypes
    }

    fn assign_nested_ids(&mut self, allocate: &mut dyn FnMut(&str) -> ObjectId) {
        for group in &mut self.group_prototypes {
            if group.group_prototype_id.is_none() {
                group.group_prototype_id = Some(allocate("gp"));
            }
        }
    }
}

fn select<T: StoredObject>(state: &StoreState, filter: impl Fn(&T) -> bool) -> Vec<T> {
    T::table(state)
        .values()
        .filter(|object| filter(object))
        .cloned()
        .collect()
}

#[async_trait]
impl<T: StoredObject> ObjectReader<T> for InMemoryConfigStore {
    async fn find_by_ids(
        &self,
        ctx: &SyncContext,
        ids: &[ObjectId],
    ) -> Result<Vec<T>, StorageError> {
        ensure_actor(ctx)?;
        let state = self.read_state()?;
        let table = T::table(&state);
        let wanted: BTreeSet<&ObjectId> = ids.iter().collect();
        Ok(wanted
            .into_iter()
            .filter_map(|id| table.get(id).cloned())
            .collect())
    }

    async fn find_by_template_ids(
        &self,
        ctx: &SyncContext,
        template_ids: &[ObjectId],
        host_ids: Option<&[HostId]>,
    ) -> Result<Vec<T>, StorageError> {
        ensure_actor(ctx)?;
        let state = self.read_state()?;
        Ok(select(&state, |object: &T| {
            object
                .template_id()
                .is_some_and(|id| template_ids.iter().any(|item| item == id))
                && host_ids.is_none_or(|hosts| hosts.iter().any(|host| host == object.owner_id()))
        }))
    }

    async fn find_by_natural_key(
        &self,
        ctx: &SyncContext,
        owner_id: &str,
        key: &NaturalKey,
    ) -> Result<Option<T>, StorageError> {
        ensure_actor(ctx)?;
        let state = self.read_state()?;
        Ok(T::table(&state)
            .values()
            .find(|object| object.owner_id() == owner_id && object.natural_key() == *key)
            .cloned())
    }

    async fn find_by_owners(
        &self,
        ctx: &SyncContext,
        owner_ids: &[HostId],
    ) -> Result<Vec<T>, StorageError> {
        ensure_actor(ctx)?;
        let state = self.read_state()?;
        Ok(select(&state, |object: &T| {
            owner_ids.iter().any(|owner| owner == object.owner_id())
        }))
    }

    async fn find_by_dependency_ids(
        &self,
        ctx: &SyncContext,
        ids: &[ObjectId],
    ) -> Result<Vec<T>, StorageError> {
        ensure_actor(ctx)?;
        let state = self.read_state()?;
        Ok(select(&state, |object: &T| {
            object
                .dependency_ids()
                .iter()
                .any(|dependency| ids.contains(dependency))
        }))
    }
}

#[async_trait]
impl<T: StoredObject> ObjectPersister<T> for InMemoryConfigStore {
    async fn save(
        &self,
        ctx: &SyncContext,
        objects: Vec<T>,
    ) -> Result<Vec<ObjectId>, StorageError> {
        ensure_actor(ctx)?;
        let mut state = self.write_state()?;
        let mut ids = Vec::with_capacity(objects.len());
        let count = objects.len();
        for mut object in objects {
            if !state.hosts.contains_key(object.owner_id()) {
                return Err(StorageError::new(format!(
                    "unknown host: {}",
                    object.owner_id()
                )));
            }
            let id = match object.id() {
                Some(id) => id.to_string(),
                None => state.allocate(T::ID_PREFIX),
            };
            object.set_id(id.clone());
            object.assign_nested_ids(&mut |prefix| state.allocate(prefix));
            T::table_mut(&mut state).insert(id.clone(), object);
            ids.push(id);
        }
        state.record_writes(count);
        Ok(ids)
    }

    async fn save_edges(
        &self,
        ctx: &SyncContext,
        edges: Vec<(ObjectId, Vec<ObjectId>)>,
    ) -> Result<(), StorageError> {
        ensure_actor(ctx)?;
        let mut state = self.write_state()?;
        let count = edges.len();
        for (from_id, targets) in edges {
            if let Some(target) = targets
                .iter()
                .find(|target| !T::table(&state).contains_key(*target))
            {
                return Err(StorageError::new(format!(
                    "unknown dependency target: {target}"
                )));
            }
            let object = T::table_mut(&mut state)
                .get_mut(&from_id)
                .ok_or_else(|| StorageError::new(format!("unknown object: {from_id}")))?;
            object.set_dependency_ids(targets);
        }
        state.record_writes(count);
        Ok(())
    }

    async fn delete(&self, ctx: &SyncContext, ids: &[ObjectId]) -> Result<(), StorageError> {
        ensure_actor(ctx)?;
        let mut state = self.write_state()?;
        let ids: BTreeSet<ObjectId> = ids.iter().cloned().collect();
        let count = ids.len();
        T::cascade_delete(&mut state, ids);
        state.record_writes(count);
        Ok(())
    }
}
