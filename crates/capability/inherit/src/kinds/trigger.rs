//! 触发器传播策略。
//!
//! 子触发器的表达式把父模板名改写为目标主机名；自然键按改写后的表达式计算，
//! 因此主机上描述与表达式相同的手工触发器会被收编而不是重复创建。

use crate::cloner::CloneContext;
use crate::cycle_guard::{check_template_hierarchy, load_graph};
use crate::error::InheritError;
use crate::strategy::{InheritStrategy, inherit_base};
use async_trait::async_trait;
use domain::expression::{referenced_hosts, replace_hosts};
use domain::{
    ConfigObject, DependencyEdge, HostId, HostInfo, NaturalKey, ObjectId, ObjectKind, SyncContext,
    Trigger,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tmpl_storage::{LinkDirectory, ObjectStore};

pub struct TriggerStrategy {
    links: Arc<dyn LinkDirectory>,
    triggers: Arc<dyn ObjectStore<Trigger>>,
}

impl TriggerStrategy {
    pub fn new(links: Arc<dyn LinkDirectory>, triggers: Arc<dyn ObjectStore<Trigger>>) -> Self {
        Self { links, triggers }
    }

    /// 已有子触发器所在主机不再链接到父触发器所属模板时，禁止移动。
    async fn check_moved(
        &self,
        ctx: &SyncContext,
        parents: &[Trigger],
    ) -> Result<(), InheritError> {
        let parent_ids: Vec<ObjectId> = parents
            .iter()
            .filter_map(|item| item.id().map(str::to_string))
            .collect();
        let children = self
            .triggers
            .find_by_template_ids(ctx, &parent_ids, None)
            .await?;
        if children.is_empty() {
            return Ok(());
        }
        let owner_ids: Vec<HostId> = children
            .iter()
            .map(|child| child.host_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let hosts: HashMap<HostId, HostInfo> = self
            .links
            .find_hosts(ctx, &owner_ids)
            .await?
            .into_iter()
            .map(|host| (host.host_id.clone(), host))
            .collect();
        let by_id: HashMap<&str, &Trigger> = parents
            .iter()
            .filter_map(|item| item.id().map(|id| (id, item)))
            .collect();
        for child in &children {
            let Some(parent) = child.template_id.as_deref().and_then(|id| by_id.get(id)) else {
                continue;
            };
            let linked = hosts
                .get(&child.host_id)
                .is_some_and(|host| host.links_template(&parent.host_id));
            if !linked {
                return Err(InheritError::MovedWithChildren {
                    id: parent.id().unwrap_or_default().to_string(),
                    owner: parent.host_id.clone(),
                });
            }
        }
        Ok(())
    }

    /// 引用多个模板的触发器要求这些模板的链接主机完全一致。
    async fn check_linkages(
        &self,
        ctx: &SyncContext,
        parents: &[Trigger],
    ) -> Result<(), InheritError> {
        for parent in parents {
            let mut names = referenced_hosts(&parent.expression);
            for name in referenced_hosts(&parent.recovery_expression) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
            if names.len() < 2 {
                continue;
            }
            let templates: Vec<HostInfo> = self
                .links
                .find_hosts_by_name(ctx, &names)
                .await?
                .into_iter()
                .filter(|host| host.is_template())
                .collect();
            if templates.len() < 2 {
                continue;
            }
            let mut linkages = Vec::with_capacity(templates.len());
            for template in &templates {
                let linked: BTreeSet<HostId> = self
                    .links
                    .resolve_linked_hosts(ctx, std::slice::from_ref(&template.host_id), None)
                    .await?
                    .into_iter()
                    .map(|host| host.host_id)
                    .collect();
                linkages.push(linked);
            }
            if linkages.windows(2).any(|pair| pair[0] != pair[1]) {
                return Err(InheritError::LinkageMismatch {
                    id: parent.id().unwrap_or_default().to_string(),
                    templates: templates.into_iter().map(|host| host.name).collect(),
                });
            }
        }
        Ok(())
    }
}

/// 把表达式中的父模板名改写为目标主机名。
pub fn host_qualified(expression: &str, host: &HostInfo) -> String {
    let parents: HashSet<&str> = host
        .parent_templates
        .iter()
        .map(|template| template.name.as_str())
        .collect();
    replace_hosts(expression, &parents, &host.name)
}

#[async_trait]
impl InheritStrategy<Trigger> for TriggerStrategy {
    // 先做移动检测，再做多模板链接检测，最后检查依赖在链接层级中的方向。
    async fn validate_pass(
        &self,
        ctx: &SyncContext,
        parents: &[Trigger],
        _hosts: &[HostInfo],
    ) -> Result<(), InheritError> {
        self.check_moved(ctx, parents).await?;
        self.check_linkages(ctx, parents).await?;
        let proposed: Vec<DependencyEdge> =
            parents.iter().flat_map(|parent| parent.edges()).collect();
        if proposed.is_empty() {
            return Ok(());
        }
        let graph = load_graph(ctx, self.triggers.as_ref(), self.links.as_ref(), parents).await?;
        check_template_hierarchy(ctx, self.links.as_ref(), &proposed, &graph).await
    }

    fn child_key(
        &self,
        parent: &Trigger,
        cx: &CloneContext<'_>,
    ) -> Result<NaturalKey, InheritError> {
        Ok(NaturalKey::Trigger {
            description: parent.description.clone(),
            expression: host_qualified(&parent.expression, cx.host),
            recovery_expression: host_qualified(&parent.recovery_expression, cx.host),
        })
    }

    fn clone_for_host(
        &self,
        parent: &Trigger,
        cx: &CloneContext<'_>,
        existing: Option<&Trigger>,
    ) -> Result<Trigger, InheritError> {
        let mut child = inherit_base(parent, cx.host, existing);
        child.expression = host_qualified(&parent.expression, cx.host);
        child.recovery_expression = host_qualified(&parent.recovery_expression, cx.host);
        Ok(child)
    }

    // 指向普通主机触发器的依赖原样保留；指向模板触发器而主机上无对应子对象则无法映射。
    async fn unresolved_dependency(
        &self,
        ctx: &SyncContext,
        parent: &Trigger,
        dependency_id: &str,
        host: &HostInfo,
    ) -> Result<ObjectId, InheritError> {
        let dangling = || InheritError::DanglingReference {
            kind: ObjectKind::Trigger,
            from: parent.description.clone(),
            to: dependency_id.to_string(),
            host: host.name.clone(),
        };
        let target = self
            .triggers
            .find_by_ids(ctx, &[dependency_id.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(dangling)?;
        let owner = self
            .links
            .find_hosts(ctx, std::slice::from_ref(&target.host_id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(dangling)?;
        if owner.is_template() {
            return Err(dangling());
        }
        Ok(dependency_id.to_string())
    }
}
