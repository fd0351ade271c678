//! # 模板继承引擎
//!
//! 把模板上的监控项、触发器、主机原型级联复制到所有链接的主机与子模板，
//! 并保持依赖边、发现规则归属与自然键唯一性。
//!
//! ## 模块说明
//!
//! - [`resolver`]：子对象身份解析（更新 / 收编 / 新建）
//! - [`cloner`] 与 [`kinds`]：按种类克隆子对象
//! - [`rewriter`]：依赖边重写
//! - [`cycle_guard`]：依赖图校验（环、深度、数量、归属）
//! - [`scheduler`]：分层、逐主机、逐模板层传播
//!
//! 门面 [`TemplateInheritance`] 的每个操作都包在一个工作单元中：
//! 成功提交，任一错误整体回滚。

pub mod cloner;
pub mod cycle_guard;
pub mod error;
pub mod kinds;
pub mod report;
pub mod resolver;
pub mod rewriter;
pub mod scheduler;
pub mod strategy;
pub mod validate;

pub use cycle_guard::{DependencyGraph, DependencyLimits, validate_dependencies};
pub use error::InheritError;
pub use kinds::{HostPrototypeStrategy, ItemStrategy, TriggerStrategy};
pub use report::PropagationReport;
pub use resolver::{Resolution, resolve};
pub use scheduler::{PassState, PropagationScheduler, level};
pub use strategy::InheritStrategy;

use cycle_guard::{check_template_links, load_graph};
use domain::{
    ConfigObject, DependencyEdge, HostId, HostPrototype, Item, ObjectFlags, ObjectId, ObjectKind,
    SyncContext, Trigger,
};
use std::future::Future;
use std::sync::Arc;
use tmpl_storage::{LinkDirectory, ObjectStore, UnitOfWork};
use tmpl_telemetry::{record_cascade_aborted, record_cascade_committed};
use tracing::{info, warn};
use validate::{validate_host_prototypes, validate_items, validate_parents, validate_triggers};

pub struct TemplateInheritance {
    links: Arc<dyn LinkDirectory>,
    items: Arc<dyn ObjectStore<Item>>,
    triggers: Arc<dyn ObjectStore<Trigger>>,
    host_prototypes: Arc<dyn ObjectStore<HostPrototype>>,
    unit_of_work: Arc<dyn UnitOfWork>,
    item_strategy: ItemStrategy,
    trigger_strategy: TriggerStrategy,
    host_prototype_strategy: HostPrototypeStrategy,
    limits: DependencyLimits,
}

impl TemplateInheritance {
    /// 以同一个存储实现全部协作者接口。
    pub fn new<S>(store: Arc<S>) -> Self
    where
        S: LinkDirectory
            + ObjectStore<Item>
            + ObjectStore<Trigger>
            + ObjectStore<HostPrototype>
            + UnitOfWork
            + 'static,
    {
        let links: Arc<dyn LinkDirectory> = store.clone();
        let items: Arc<dyn ObjectStore<Item>> = store.clone();
        let triggers: Arc<dyn ObjectStore<Trigger>> = store.clone();
        let host_prototypes: Arc<dyn ObjectStore<HostPrototype>> = store.clone();
        let unit_of_work: Arc<dyn UnitOfWork> = store;
        Self {
            item_strategy: ItemStrategy::new(items.clone()),
            trigger_strategy: TriggerStrategy::new(links.clone(), triggers.clone()),
            host_prototype_strategy: HostPrototypeStrategy::new(items.clone()),
            links,
            items,
            triggers,
            host_prototypes,
            unit_of_work,
            limits: DependencyLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: DependencyLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> DependencyLimits {
        self.limits
    }

    fn item_scheduler(&self) -> PropagationScheduler<'_, Item> {
        PropagationScheduler::new(self.links.as_ref(), self.items.as_ref(), &self.item_strategy)
    }

    fn trigger_scheduler(&self) -> PropagationScheduler<'_, Trigger> {
        PropagationScheduler::new(
            self.links.as_ref(),
            self.triggers.as_ref(),
            &self.trigger_strategy,
        )
    }

    fn host_prototype_scheduler(&self) -> PropagationScheduler<'_, HostPrototype> {
        PropagationScheduler::new(
            self.links.as_ref(),
            self.host_prototypes.as_ref(),
            &self.host_prototype_strategy,
        )
    }

    async fn atomically<R>(
        &self,
        ctx: &SyncContext,
        operation: &'static str,
        work: impl Future<Output = Result<R, InheritError>>,
    ) -> Result<R, InheritError> {
        self.unit_of_work.begin(ctx).await?;
        match work.await {
            Ok(value) => {
                self.unit_of_work.commit(ctx).await?;
                record_cascade_committed();
                info!(
                    target: "tmpl.inherit",
                    request_id = %ctx.request_id,
                    user_id = %ctx.user_id,
                    operation,
                    "cascade committed"
                );
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.unit_of_work.rollback(ctx).await {
                    warn!(
                        target: "tmpl.inherit",
                        request_id = %ctx.request_id,
                        operation,
                        error = %rollback_err,
                        "rollback failed"
                    );
                }
                record_cascade_aborted();
                warn!(
                    target: "tmpl.inherit",
                    request_id = %ctx.request_id,
                    user_id = %ctx.user_id,
                    operation,
                    code = err.code(),
                    error = %err,
                    "cascade aborted"
                );
                Err(err)
            }
        }
    }

    /// 传播监控项（含发现规则与原型）；`target_host_ids` 只限定第一层链接。
    pub async fn propagate_items(
        &self,
        ctx: &SyncContext,
        parents: Vec<Item>,
        target_host_ids: Option<Vec<HostId>>,
    ) -> Result<PropagationReport, InheritError> {
        self.atomically(ctx, "propagate_items", async move {
            validate_parents(&parents)?;
            validate_items(&parents)?;
            self.item_scheduler()
                .propagate(ctx, parents, target_host_ids)
                .await
        })
        .await
    }

    pub async fn propagate_triggers(
        &self,
        ctx: &SyncContext,
        parents: Vec<Trigger>,
        target_host_ids: Option<Vec<HostId>>,
    ) -> Result<PropagationReport, InheritError> {
        self.atomically(ctx, "propagate_triggers", async move {
            validate_parents(&parents)?;
            validate_triggers(&parents)?;
            self.trigger_scheduler()
                .propagate(ctx, parents, target_host_ids)
                .await
        })
        .await
    }

    pub async fn propagate_host_prototypes(
        &self,
        ctx: &SyncContext,
        parents: Vec<HostPrototype>,
        target_host_ids: Option<Vec<HostId>>,
    ) -> Result<PropagationReport, InheritError> {
        self.atomically(ctx, "propagate_host_prototypes", async move {
            validate_parents(&parents)?;
            validate_host_prototypes(&parents)?;
            self.host_prototype_scheduler()
                .propagate(ctx, parents, target_host_ids)
                .await
        })
        .await
    }

    /// 持久化之前校验一批监控项的主从关系。批次对象可使用临时 ID。
    pub async fn validate_item_dependencies(
        &self,
        ctx: &SyncContext,
        batch: &[Item],
    ) -> Result<(), InheritError> {
        let graph = load_graph(ctx, self.items.as_ref(), self.links.as_ref(), batch).await?;
        let proposed: Vec<DependencyEdge> =
            batch.iter().flat_map(|object| object.edges()).collect();
        validate_dependencies(ObjectKind::Item, &proposed, &graph, self.limits)
    }

    pub async fn validate_trigger_dependencies(
        &self,
        ctx: &SyncContext,
        batch: &[Trigger],
    ) -> Result<(), InheritError> {
        let graph = load_graph(ctx, self.triggers.as_ref(), self.links.as_ref(), batch).await?;
        let proposed: Vec<DependencyEdge> =
            batch.iter().flat_map(|object| object.edges()).collect();
        validate_dependencies(ObjectKind::Trigger, &proposed, &graph, self.limits)?;
        check_template_links(ctx, self.links.as_ref(), &proposed, &graph).await
    }

    /// 主机新链接模板后，把模板上的全部对象同步到这些主机。
    ///
    /// 顺序：监控项，触发器（随后重算依赖边），主机原型。
    pub async fn sync_template_linkage(
        &self,
        ctx: &SyncContext,
        template_ids: &[HostId],
        host_ids: &[HostId],
    ) -> Result<PropagationReport, InheritError> {
        self.atomically(ctx, "sync_template_linkage", async {
            let mut report = PropagationReport::default();

            let items: Vec<Item> = inheritable(self.items.find_by_owners(ctx, template_ids).await?);
            report.merge(
                &self
                    .item_scheduler()
                    .propagate(ctx, items, Some(host_ids.to_vec()))
                    .await?,
            );

            let triggers: Vec<Trigger> =
                inheritable(self.triggers.find_by_owners(ctx, template_ids).await?);
            let scheduler = self.trigger_scheduler();
            report.merge(
                &scheduler
                    .propagate(ctx, triggers, Some(host_ids.to_vec()))
                    .await?,
            );
            report.merge(&scheduler.reconcile_edges(ctx, host_ids).await?);

            let host_prototypes: Vec<HostPrototype> =
                inheritable(self.host_prototypes.find_by_owners(ctx, template_ids).await?);
            report.merge(
                &self
                    .host_prototype_scheduler()
                    .propagate(ctx, host_prototypes, Some(host_ids.to_vec()))
                    .await?,
            );
            Ok(report)
        })
        .await
    }

    /// 解除链接：主机原型、触发器、监控项依次处理。
    pub async fn unlink_templates(
        &self,
        ctx: &SyncContext,
        template_ids: &[HostId],
        host_ids: &[HostId],
        clear: bool,
    ) -> Result<PropagationReport, InheritError> {
        self.atomically(ctx, "unlink_templates", async {
            let mut report = PropagationReport::default();
            report.merge(
                &self
                    .host_prototype_scheduler()
                    .unlink(ctx, template_ids, host_ids, clear)
                    .await?,
            );
            report.merge(
                &self
                    .trigger_scheduler()
                    .unlink(ctx, template_ids, host_ids, clear)
                    .await?,
            );
            report.merge(
                &self
                    .item_scheduler()
                    .unlink(ctx, template_ids, host_ids, clear)
                    .await?,
            );
            Ok(report)
        })
        .await
    }

    pub async fn delete_items(
        &self,
        ctx: &SyncContext,
        ids: &[ObjectId],
    ) -> Result<PropagationReport, InheritError> {
        self.atomically(ctx, "delete_items", self.item_scheduler().delete(ctx, ids))
            .await
    }

    pub async fn delete_triggers(
        &self,
        ctx: &SyncContext,
        ids: &[ObjectId],
    ) -> Result<PropagationReport, InheritError> {
        self.atomically(ctx, "delete_triggers", self.trigger_scheduler().delete(ctx, ids))
            .await
    }

    pub async fn delete_host_prototypes(
        &self,
        ctx: &SyncContext,
        ids: &[ObjectId],
    ) -> Result<PropagationReport, InheritError> {
        self.atomically(
            ctx,
            "delete_host_prototypes",
            self.host_prototype_scheduler().delete(ctx, ids),
        )
        .await
    }
}

// 已发现对象从不作为父对象。
fn inheritable<T: ConfigObject>(objects: Vec<T>) -> Vec<T> {
    objects
        .into_iter()
        .filter(|object| object.flags() != ObjectFlags::Discovered)
        .collect()
}
