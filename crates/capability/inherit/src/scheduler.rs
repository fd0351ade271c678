//! 传播调度器：把一批父对象逐层下推到所有链接主机。
//!
//! 每一轮（pass）处理一层模板：
//! 1. 解析直接链接的主机（只有首轮应用主机过滤）
//! 2. 按批内依赖分层（wave），依赖目标先于依赖方写入
//! 3. 逐主机、逐层：解析身份、克隆、批量保存、重写依赖边
//! 4. 落在模板上的子对象作为下一轮的父对象
//!
//! 协作者调用全部顺序 await，不派生任务。

use crate::cloner::CloneContext;
use crate::error::InheritError;
use crate::report::PropagationReport;
use crate::resolver::{Resolution, resolve};
use crate::rewriter::DependencyRewriter;
use crate::strategy::InheritStrategy;
use domain::{ConfigObject, HostId, NaturalKey, ObjectId, SyncContext};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tmpl_storage::{LinkDirectory, ObjectStore};
use tmpl_telemetry::{
    record_edges_written, record_objects_adopted, record_objects_created,
    record_objects_unchanged, record_objects_updated, record_pass,
};
use tracing::{debug, info};

/// 单轮状态：Pending -> Leveled -> Propagated。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    Pending,
    Leveled,
    Propagated,
}

struct Pass<T> {
    parents: Vec<T>,
    host_filter: Option<Vec<HostId>>,
    depth: usize,
    state: PassState,
}

impl<T> Pass<T> {
    fn new(parents: Vec<T>, host_filter: Option<Vec<HostId>>, depth: usize) -> Self {
        Self {
            parents,
            host_filter,
            depth,
            state: PassState::Pending,
        }
    }
}

struct Staged<T> {
    parent_id: ObjectId,
    child: T,
    write: bool,
}

/// 按批内前置依赖分层，返回每层的下标。
///
/// 批外的前置对象视为已就绪；批内成环报 `CircularDependency`。
pub fn level<T: ConfigObject>(objects: &[T]) -> Result<Vec<Vec<usize>>, InheritError> {
    let index: HashMap<&str, usize> = objects
        .iter()
        .enumerate()
        .filter_map(|(position, object)| object.id().map(|id| (id, position)))
        .collect();
    let mut placed = vec![false; objects.len()];
    let mut remaining = objects.len();
    let mut waves = Vec::new();

    while remaining > 0 {
        let wave: Vec<usize> = (0..objects.len())
            .filter(|position| !placed[*position])
            .filter(|position| {
                objects[*position]
                    .prerequisite_ids()
                    .iter()
                    .all(|prerequisite| match index.get(prerequisite.as_str()) {
                        Some(other) => *other != *position && placed[*other],
                        None => true,
                    })
            })
            .collect();
        if wave.is_empty() {
            let chain = (0..objects.len())
                .filter(|position| !placed[*position])
                .map(|position| {
                    objects[position]
                        .id()
                        .map(str::to_string)
                        .unwrap_or_else(|| objects[position].label())
                })
                .collect();
            return Err(InheritError::CircularDependency { chain });
        }
        for position in &wave {
            placed[*position] = true;
        }
        remaining -= wave.len();
        waves.push(wave);
    }
    Ok(waves)
}

pub struct PropagationScheduler<'a, T: ConfigObject> {
    links: &'a dyn LinkDirectory,
    store: &'a dyn ObjectStore<T>,
    strategy: &'a dyn InheritStrategy<T>,
}

impl<'a, T: ConfigObject> PropagationScheduler<'a, T> {
    pub fn new(
        links: &'a dyn LinkDirectory,
        store: &'a dyn ObjectStore<T>,
        strategy: &'a dyn InheritStrategy<T>,
    ) -> Self {
        Self {
            links,
            store,
            strategy,
        }
    }

    /// 传播父对象直到没有模板可继续下推。
    pub async fn propagate(
        &self,
        ctx: &SyncContext,
        parents: Vec<T>,
        host_filter: Option<Vec<HostId>>,
    ) -> Result<PropagationReport, InheritError> {
        let mut report = PropagationReport::default();
        let mut worklist = VecDeque::from([Pass::new(parents, host_filter, 0)]);
        while let Some(mut pass) = worklist.pop_front() {
            if let Some(next) = self.run_pass(ctx, &mut pass, &mut report).await? {
                worklist.push_back(next);
            }
        }

        record_objects_created(report.created as u64);
        record_objects_updated(report.updated as u64);
        record_objects_adopted(report.adopted as u64);
        record_objects_unchanged(report.unchanged as u64);
        record_edges_written(report.edges_written as u64);
        Ok(report)
    }

    async fn run_pass(
        &self,
        ctx: &SyncContext,
        pass: &mut Pass<T>,
        report: &mut PropagationReport,
    ) -> Result<Option<Pass<T>>, InheritError> {
        let owner_ids: Vec<HostId> = pass
            .parents
            .iter()
            .map(|parent| parent.owner_id().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mut hosts = if owner_ids.is_empty() {
            Vec::new()
        } else {
            self.links
                .resolve_linked_hosts(ctx, &owner_ids, pass.host_filter.as_deref())
                .await?
        };
        hosts.retain(|host| self.strategy.accepts_host(host));
        if hosts.is_empty() {
            pass.state = PassState::Propagated;
            return Ok(None);
        }

        self.strategy
            .validate_pass(ctx, &pass.parents, &hosts)
            .await?;
        let waves = level(&pass.parents)?;
        pass.state = PassState::Leveled;
        record_pass();
        report.passes += 1;
        info!(
            target: "tmpl.inherit",
            request_id = %ctx.request_id,
            kind = %T::KIND,
            depth = pass.depth,
            parents = pass.parents.len(),
            hosts = hosts.len(),
            waves = waves.len(),
            "propagation pass"
        );

        let parent_ids: Vec<ObjectId> = pass
            .parents
            .iter()
            .filter_map(|parent| parent.id().map(str::to_string))
            .collect();
        let host_ids: Vec<HostId> = hosts.iter().map(|host| host.host_id.clone()).collect();
        let inherited: HashMap<(HostId, ObjectId), T> = self
            .store
            .find_by_template_ids(ctx, &parent_ids, Some(&host_ids))
            .await?
            .into_iter()
            .filter_map(|child| {
                let template_id = child.template_id()?.to_string();
                Some(((child.owner_id().to_string(), template_id), child))
            })
            .collect();
        let remap = self
            .strategy
            .load_remap(ctx, &pass.parents, &hosts)
            .await?;
        let rewriter = DependencyRewriter::new(self.store, self.strategy);

        let mut next_parents = Vec::new();
        for host in &hosts {
            let applicable: HashSet<usize> = pass
                .parents
                .iter()
                .enumerate()
                .filter(|(_, parent)| host.links_template(parent.owner_id()))
                .map(|(position, _)| position)
                .collect();
            if applicable.is_empty() {
                continue;
            }
            report.hosts += 1;

            let mut id_map: HashMap<ObjectId, ObjectId> = HashMap::new();
            let mut claimed: HashMap<NaturalKey, ObjectId> = HashMap::new();
            let mut child_ids: Vec<ObjectId> = Vec::new();
            for wave in &waves {
                let members: Vec<&T> = wave
                    .iter()
                    .filter(|position| applicable.contains(*position))
                    .map(|position| &pass.parents[*position])
                    .collect();
                if members.is_empty() {
                    continue;
                }

                let mut staged = Vec::with_capacity(members.len());
                for parent in &members {
                    let parent_id = parent.id().unwrap_or_default().to_string();
                    let cx = CloneContext {
                        host,
                        remap: &remap,
                        id_map: &id_map,
                    };
                    let key = self.strategy.child_key(parent, &cx)?;
                    if claimed.insert(key.clone(), parent_id.clone()).is_some() {
                        return Err(InheritError::AlreadyLinked {
                            kind: T::KIND,
                            key: key.to_string(),
                            host: host.name.clone(),
                        });
                    }

                    let inherited_child = inherited.get(&(host.host_id.clone(), parent_id.clone()));
                    let same_key = if inherited_child
                        .is_some_and(|child| child.natural_key() == key)
                    {
                        None
                    } else {
                        self.store
                            .find_by_natural_key(ctx, &host.host_id, &key)
                            .await?
                    };
                    let resolution =
                        resolve(*parent, &key, &host.name, inherited_child, same_key.as_ref())?;
                    let existing = match &resolution {
                        Resolution::Create => None,
                        Resolution::UpdateInPlace { .. } => inherited_child,
                        Resolution::Adopt(_) => same_key.as_ref(),
                    };
                    let child = self.strategy.clone_for_host(parent, &cx, existing)?;
                    if let (Resolution::Adopt(_), Some(existing)) = (&resolution, existing) {
                        self.strategy.check_adoption(&child, existing, host)?;
                    }

                    let write = existing.is_none_or(|existing| *existing != child);
                    match (&resolution, write) {
                        (Resolution::Create, _) => report.created += 1,
                        (Resolution::Adopt(_), _) => report.adopted += 1,
                        (Resolution::UpdateInPlace { .. }, true) => report.updated += 1,
                        (Resolution::UpdateInPlace { .. }, false) => report.unchanged += 1,
                    }
                    debug!(
                        target: "tmpl.inherit",
                        request_id = %ctx.request_id,
                        kind = %T::KIND,
                        host = %host.name,
                        parent_id = %parent_id,
                        resolution = ?resolution,
                        write,
                        "child resolved"
                    );
                    staged.push(Staged {
                        parent_id,
                        child,
                        write,
                    });
                }

                let pending: Vec<T> = staged
                    .iter()
                    .filter(|entry| entry.write)
                    .map(|entry| entry.child.clone())
                    .collect();
                if !pending.is_empty() {
                    let mut saved = self.store.save(ctx, pending).await?.into_iter();
                    for entry in staged.iter_mut().filter(|entry| entry.write) {
                        if let Some(id) = saved.next() {
                            entry.child.set_id(id);
                        }
                    }
                }
                for entry in &staged {
                    let child_id = entry.child.id().unwrap_or_default().to_string();
                    id_map.insert(entry.parent_id.clone(), child_id.clone());
                    child_ids.push(child_id);
                }

                let rewritten = rewriter.rewrite(ctx, &members, host, &id_map).await?;
                let mut edges = Vec::new();
                for (entry, (child_id, targets)) in staged.iter().zip(rewritten) {
                    let mut current = entry.child.dependency_ids();
                    current.sort();
                    current.dedup();
                    if current != targets {
                        edges.push((child_id, targets));
                    }
                }
                if !edges.is_empty() {
                    report.edges_written += edges.len();
                    self.store.save_edges(ctx, edges).await?;
                }
            }

            // 重新读取，拿到存储分配的嵌套 ID 与最终依赖。
            if host.is_template() && !child_ids.is_empty() {
                next_parents.extend(self.store.find_by_ids(ctx, &child_ids).await?);
            }
        }

        pass.state = PassState::Propagated;
        debug!(
            target: "tmpl.inherit",
            request_id = %ctx.request_id,
            depth = pass.depth,
            state = ?pass.state,
            next_parents = next_parents.len(),
            "propagation pass finished"
        );
        if next_parents.is_empty() {
            return Ok(None);
        }
        Ok(Some(Pass::new(next_parents, None, pass.depth + 1)))
    }

    /// 按父对象的当前依赖重写给定主机上全部继承子对象的出边。
    ///
    /// 链接新模板后，之前无法映射的依赖在此补齐。
    pub async fn reconcile_edges(
        &self,
        ctx: &SyncContext,
        host_ids: &[HostId],
    ) -> Result<PropagationReport, InheritError> {
        let mut report = PropagationReport::default();
        let children: Vec<T> = self
            .store
            .find_by_owners(ctx, host_ids)
            .await?
            .into_iter()
            .filter(|child| child.template_id().is_some())
            .collect();
        if children.is_empty() {
            return Ok(report);
        }
        let parent_ids: Vec<ObjectId> = children
            .iter()
            .filter_map(|child| child.template_id().map(str::to_string))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let parents: HashMap<ObjectId, T> = self
            .store
            .find_by_ids(ctx, &parent_ids)
            .await?
            .into_iter()
            .filter_map(|parent| parent.id().map(str::to_string).map(|id| (id, parent)))
            .collect();
        let rewriter = DependencyRewriter::new(self.store, self.strategy);

        let mut edges = Vec::new();
        for host in self.links.find_hosts(ctx, host_ids).await? {
            let on_host: Vec<&T> = children
                .iter()
                .filter(|child| child.owner_id() == host.host_id)
                .collect();
            let id_map: HashMap<ObjectId, ObjectId> = on_host
                .iter()
                .filter_map(|child| {
                    Some((child.template_id()?.to_string(), child.id()?.to_string()))
                })
                .collect();
            let mut members = Vec::new();
            let mut current = Vec::new();
            for child in &on_host {
                if let Some(parent) = child.template_id().and_then(|id| parents.get(id)) {
                    members.push(parent);
                    let mut dependency_ids = child.dependency_ids();
                    dependency_ids.sort();
                    dependency_ids.dedup();
                    current.push(dependency_ids);
                }
            }
            if members.is_empty() {
                continue;
            }
            let rewritten = rewriter.rewrite(ctx, &members, &host, &id_map).await?;
            for (dependency_ids, (child_id, targets)) in current.into_iter().zip(rewritten) {
                if dependency_ids != targets {
                    edges.push((child_id, targets));
                }
            }
        }

        if !edges.is_empty() {
            report.edges_written = edges.len();
            record_edges_written(edges.len() as u64);
            self.store.save_edges(ctx, edges).await?;
        }
        Ok(report)
    }

    /// 删除对象及其全部继承后代（监控项还包括依赖于它们的对象）。
    pub async fn delete(
        &self,
        ctx: &SyncContext,
        ids: &[ObjectId],
    ) -> Result<PropagationReport, InheritError> {
        let mut doomed: BTreeSet<ObjectId> = ids.iter().cloned().collect();
        let mut frontier: Vec<ObjectId> = doomed.iter().cloned().collect();
        while !frontier.is_empty() {
            let mut found = self
                .store
                .find_by_template_ids(ctx, &frontier, None)
                .await?;
            if self.strategy.cascades_to_dependents() {
                found.extend(self.store.find_by_dependency_ids(ctx, &frontier).await?);
            }
            frontier = found
                .iter()
                .filter_map(|object| object.id().map(str::to_string))
                .filter(|id| doomed.insert(id.clone()))
                .collect();
        }

        let doomed: Vec<ObjectId> = doomed.into_iter().collect();
        if !doomed.is_empty() {
            self.store.delete(ctx, &doomed).await?;
        }
        info!(
            target: "tmpl.inherit",
            request_id = %ctx.request_id,
            kind = %T::KIND,
            requested = ids.len(),
            deleted = doomed.len(),
            "objects deleted"
        );
        Ok(PropagationReport {
            deleted: doomed.len(),
            ..PropagationReport::default()
        })
    }

    /// 解除模板与主机的链接：`clear` 时删除继承对象，否则保留为独立对象。
    pub async fn unlink(
        &self,
        ctx: &SyncContext,
        template_ids: &[HostId],
        host_ids: &[HostId],
        clear: bool,
    ) -> Result<PropagationReport, InheritError> {
        let parent_ids: Vec<ObjectId> = self
            .store
            .find_by_owners(ctx, template_ids)
            .await?
            .iter()
            .filter_map(|parent| parent.id().map(str::to_string))
            .collect();
        if parent_ids.is_empty() {
            return Ok(PropagationReport::default());
        }
        let mut children = self
            .store
            .find_by_template_ids(ctx, &parent_ids, Some(host_ids))
            .await?;
        if clear {
            let child_ids: Vec<ObjectId> = children
                .iter()
                .filter_map(|child| child.id().map(str::to_string))
                .collect();
            return self.delete(ctx, &child_ids).await;
        }

        for child in &mut children {
            self.strategy.detach(child);
        }
        let detached = children.len();
        if detached > 0 {
            self.store.save(ctx, children).await?;
        }
        Ok(PropagationReport {
            detached,
            ..PropagationReport::default()
        })
    }
}
