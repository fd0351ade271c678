//! 主机原型传播策略。

use crate::cloner::{ChildIndex, CloneContext, remap_group_prototypes};
use crate::error::InheritError;
use crate::strategy::{InheritStrategy, inherit_base};
use async_trait::async_trait;
use domain::{HostId, HostInfo, HostPrototype, Item, NaturalKey, ObjectId, ObjectKind, SyncContext};
use std::collections::BTreeSet;
use std::sync::Arc;
use tmpl_storage::ObjectStore;

pub struct HostPrototypeStrategy {
    items: Arc<dyn ObjectStore<Item>>,
}

impl HostPrototypeStrategy {
    pub fn new(items: Arc<dyn ObjectStore<Item>>) -> Self {
        Self { items }
    }

    fn child_rule<'a>(
        &self,
        parent: &HostPrototype,
        cx: &'a CloneContext<'_>,
    ) -> Result<&'a ObjectId, InheritError> {
        cx.remap
            .get(&cx.host.host_id, &parent.rule_id)
            .ok_or_else(|| InheritError::DanglingReference {
                kind: ObjectKind::HostPrototype,
                from: parent.host.clone(),
                to: parent.rule_id.clone(),
                host: cx.host.name.clone(),
            })
    }
}

#[async_trait]
impl InheritStrategy<HostPrototype> for HostPrototypeStrategy {
    // 已发现主机不再继承主机原型。
    fn accepts_host(&self, host: &HostInfo) -> bool {
        !host.discovered
    }

    async fn load_remap(
        &self,
        ctx: &SyncContext,
        parents: &[HostPrototype],
        hosts: &[HostInfo],
    ) -> Result<ChildIndex, InheritError> {
        let rule_ids: Vec<ObjectId> = parents
            .iter()
            .map(|item| item.rule_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let host_ids: Vec<HostId> = hosts.iter().map(|host| host.host_id.clone()).collect();
        let rules = self
            .items
            .find_by_template_ids(ctx, &rule_ids, Some(&host_ids))
            .await?;
        Ok(ChildIndex::from_children(&rules))
    }

    fn child_key(
        &self,
        parent: &HostPrototype,
        cx: &CloneContext<'_>,
    ) -> Result<NaturalKey, InheritError> {
        Ok(NaturalKey::HostPrototype {
            rule_id: self.child_rule(parent, cx)?.clone(),
            host: parent.host.clone(),
        })
    }

    fn clone_for_host(
        &self,
        parent: &HostPrototype,
        cx: &CloneContext<'_>,
        existing: Option<&HostPrototype>,
    ) -> Result<HostPrototype, InheritError> {
        let mut child = inherit_base(parent, cx.host, existing);
        child.rule_id = self.child_rule(parent, cx)?.clone();
        let existing_groups = existing
            .map(|item| item.group_prototypes.as_slice())
            .unwrap_or_default();
        child.group_prototypes = remap_group_prototypes(&parent.group_prototypes, existing_groups);
        // 链接模板与资产模式跟随父原型，收编的原型也会被覆盖。
        child.template_ids = parent.template_ids.clone();
        child.inventory_mode = parent.inventory_mode;
        Ok(child)
    }

    fn detach(&self, child: &mut HostPrototype) {
        child.template_id = None;
        for group in &mut child.group_prototypes {
            group.template_id = None;
        }
    }

    async fn unresolved_dependency(
        &self,
        _ctx: &SyncContext,
        parent: &HostPrototype,
        dependency_id: &str,
        host: &HostInfo,
    ) -> Result<ObjectId, InheritError> {
        Err(InheritError::DanglingReference {
            kind: ObjectKind::HostPrototype,
            from: parent.host.clone(),
            to: dependency_id.to_string(),
            host: host.name.clone(),
        })
    }
}
