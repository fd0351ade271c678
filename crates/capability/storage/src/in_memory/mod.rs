//! 内存存储实现模块
//!
//! 用于本地演示、CLI 快照同步和测试。
//!
//! `InMemoryConfigStore` 同时实现全部协作者接口：
//! - LinkDirectory：links.rs
//! - ObjectReader / ObjectPersister（Item / Trigger / HostPrototype）：objects.rs
//! - UnitOfWork：transaction.rs

pub mod links;
pub mod objects;
pub mod transaction;

pub use objects::StoredObject;

use crate::error::StorageError;
use domain::{HostId, HostInfo, HostPrototype, HostStatus, Item, ObjectId, TemplateRef, Trigger};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, RwLock};

/// 全部表的内存状态。事务开始时整体克隆为快照。
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    pub(crate) hosts: BTreeMap<HostId, HostInfo>,
    /// (template_id, host_id)
    pub(crate) links: BTreeSet<(HostId, HostId)>,
    pub(crate) items: BTreeMap<ObjectId, Item>,
    pub(crate) triggers: BTreeMap<ObjectId, Trigger>,
    pub(crate) host_prototypes: BTreeMap<ObjectId, HostPrototype>,
    next_id: u64,
    writes: u64,
}

impl StoreState {
    /// 分配新 ID，跳过快照中已显式占用的 ID。
    pub(crate) fn allocate(&mut self, prefix: &str) -> ObjectId {
        loop {
            self.next_id += 1;
            let id = format!("{prefix}-{}", self.next_id);
            if !self.id_taken(&id) {
                return id;
            }
        }
    }

    fn id_taken(&self, id: &str) -> bool {
        self.items.contains_key(id)
            || self.triggers.contains_key(id)
            || self.host_prototypes.contains_key(id)
            || self.host_prototypes.values().any(|prototype| {
                prototype
                    .group_prototypes
                    .iter()
                    .any(|group| group.group_prototype_id.as_deref() == Some(id))
            })
    }

    pub(crate) fn record_writes(&mut self, count: usize) {
        self.writes += count as u64;
    }

    /// 附带直接父模板的主机视图。
    pub(crate) fn host_info(&self, host_id: &str) -> Option<HostInfo> {
        let mut host = self.hosts.get(host_id)?.clone();
        host.parent_templates = self
            .links
            .iter()
            .filter(|(_, linked)| linked == host_id)
            .filter_map(|(template_id, _)| {
                self.hosts.get(template_id).map(|template| TemplateRef {
                    template_id: template_id.clone(),
                    name: template.name.clone(),
                })
            })
            .collect();
        Some(host)
    }

    /// `ancestor` 是否（传递地）链接到 `host_id`。
    fn is_ancestor(&self, ancestor: &str, host_id: &str) -> bool {
        let mut stack = vec![host_id.to_string()];
        let mut seen = BTreeSet::new();
        while let Some(current) = stack.pop() {
            if current == ancestor {
                return true;
            }
            if !seen.insert(current.clone()) {
                continue;
            }
            stack.extend(
                self.links
                    .iter()
                    .filter(|(_, linked)| *linked == current)
                    .map(|(template_id, _)| template_id.clone()),
            );
        }
        false
    }
}

/// 配置内存存储
///
/// 使用 RwLock 保护状态；Mutex 中保存事务快照。
pub struct InMemoryConfigStore {
    state: RwLock<StoreState>,
    snapshot: Mutex<Option<StoreState>>,
}

impl Default for InMemoryConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryConfigStore {
    /// 创建空存储
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            snapshot: Mutex::new(None),
        }
    }

    fn read_state(&self) -> Result<std::sync::RwLockReadGuard<'_, StoreState>, StorageError> {
        self.state
            .read()
            .map_err(|_| StorageError::new("lock failed"))
    }

    fn write_state(&self) -> Result<std::sync::RwLockWriteGuard<'_, StoreState>, StorageError> {
        self.state
            .write()
            .map_err(|_| StorageError::new("lock failed"))
    }

    /// 登记主机或模板（`parent_templates` 由链接表推导，传入值被忽略）
    pub fn add_host(&self, mut host: HostInfo) -> Result<(), StorageError> {
        if host.host_id.is_empty() {
            return Err(StorageError::new("host_id required"));
        }
        host.parent_templates.clear();
        let mut state = self.write_state()?;
        if state
            .hosts
            .values()
            .any(|item| item.name == host.name && item.host_id != host.host_id)
        {
            return Err(StorageError::new(format!("host name taken: {}", host.name)));
        }
        state.hosts.insert(host.host_id.clone(), host);
        Ok(())
    }

    /// 链接模板到主机/模板，拒绝非模板源与成环链接
    pub fn link_template(&self, template_id: &str, host_id: &str) -> Result<(), StorageError> {
        let mut state = self.write_state()?;
        let template = state
            .hosts
            .get(template_id)
            .ok_or_else(|| StorageError::new(format!("unknown template: {template_id}")))?;
        if template.status != HostStatus::Template {
            return Err(StorageError::new(format!("not a template: {template_id}")));
        }
        if !state.hosts.contains_key(host_id) {
            return Err(StorageError::new(format!("unknown host: {host_id}")));
        }
        if template_id == host_id || state.is_ancestor(host_id, template_id) {
            return Err(StorageError::new(format!(
                "circular template link: {template_id} -> {host_id}"
            )));
        }
        state
            .links
            .insert((template_id.to_string(), host_id.to_string()));
        Ok(())
    }

    /// 解除链接，返回链接是否存在
    pub fn unlink_template(&self, template_id: &str, host_id: &str) -> Result<bool, StorageError> {
        let mut state = self.write_state()?;
        Ok(state
            .links
            .remove(&(template_id.to_string(), host_id.to_string())))
    }

    /// 直接写入对象（不计入写次数），未带 ID 时分配新 ID
    pub fn seed<T: StoredObject>(&self, mut object: T) -> Result<ObjectId, StorageError> {
        let mut state = self.write_state()?;
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
        Ok(id)
    }

    pub fn get<T: StoredObject>(&self, id: &str) -> Option<T> {
        self.read_state()
            .ok()
            .and_then(|state| T::table(&state).get(id).cloned())
    }

    pub fn all<T: StoredObject>(&self) -> Vec<T> {
        self.read_state()
            .map(|state| T::table(&state).values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn host(&self, host_id: &str) -> Option<HostInfo> {
        self.read_state()
            .ok()
            .and_then(|state| state.host_info(host_id))
    }

    pub fn hosts(&self) -> Vec<HostInfo> {
        self.read_state()
            .map(|state| {
                state
                    .hosts
                    .keys()
                    .filter_map(|host_id| state.host_info(host_id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// (template_id, host_id) 链接列表
    pub fn links(&self) -> Vec<(HostId, HostId)> {
        self.read_state()
            .map(|state| state.links.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 累计写入的对象与边数量
    pub fn write_count(&self) -> u64 {
        self.read_state().map(|state| state.writes).unwrap_or(0)
    }
}
