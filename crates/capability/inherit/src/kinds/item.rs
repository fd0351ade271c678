//! 监控项（含发现规则、原型）传播策略。

use crate::cloner::{
    ChildIndex, CloneContext, find_interface_for_item, remap_applications,
};
use crate::error::InheritError;
use crate::strategy::{InheritStrategy, inherit_base};
use async_trait::async_trait;
use domain::{ConfigObject, HostId, HostInfo, Item, NaturalKey, ObjectId, ObjectKind, SyncContext};
use std::collections::BTreeSet;
use std::sync::Arc;
use tmpl_storage::ObjectStore;

pub struct ItemStrategy {
    items: Arc<dyn ObjectStore<Item>>,
}

impl ItemStrategy {
    pub fn new(items: Arc<dyn ObjectStore<Item>>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl InheritStrategy<Item> for ItemStrategy {
    // 批次外的发现规则：其子规则需已存在于目标主机。
    async fn load_remap(
        &self,
        ctx: &SyncContext,
        parents: &[Item],
        hosts: &[HostInfo],
    ) -> Result<ChildIndex, InheritError> {
        let in_batch: BTreeSet<&str> = parents.iter().filter_map(|item| item.id()).collect();
        let rule_ids: Vec<ObjectId> = parents
            .iter()
            .filter_map(|item| item.rule_id.as_deref())
            .filter(|rule_id| !in_batch.contains(rule_id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        if rule_ids.is_empty() {
            return Ok(ChildIndex::default());
        }
        let host_ids: Vec<HostId> = hosts.iter().map(|host| host.host_id.clone()).collect();
        let children = self
            .items
            .find_by_template_ids(ctx, &rule_ids, Some(&host_ids))
            .await?;
        Ok(ChildIndex::from_children(&children))
    }

    fn child_key(&self, parent: &Item, _cx: &CloneContext<'_>) -> Result<NaturalKey, InheritError> {
        Ok(parent.natural_key())
    }

    fn clone_for_host(
        &self,
        parent: &Item,
        cx: &CloneContext<'_>,
        existing: Option<&Item>,
    ) -> Result<Item, InheritError> {
        let mut child = inherit_base(parent, cx.host, existing);

        let keep_interface = existing.and_then(|existing| {
            (existing.item_type == parent.item_type && !cx.host.is_template())
                .then(|| existing.interface_id.clone())
                .flatten()
        });
        child.interface_id = match keep_interface {
            Some(interface_id) => Some(interface_id),
            None => find_interface_for_item(parent.item_type, &parent.key, cx.host)?,
        };
        child.application_ids = remap_applications(&parent.application_ids, cx.host);
        child.rule_id = match parent.rule_id.as_deref() {
            Some(rule_id) => Some(cx.child_of(rule_id).cloned().ok_or_else(|| {
                InheritError::DanglingReference {
                    kind: ObjectKind::Item,
                    from: parent.key.clone(),
                    to: rule_id.to_string(),
                    host: cx.host.name.clone(),
                }
            })?),
            None => None,
        };
        Ok(child)
    }

    fn check_adoption(
        &self,
        clone: &Item,
        existing: &Item,
        host: &HostInfo,
    ) -> Result<(), InheritError> {
        if clone.rule_id != existing.rule_id {
            return Err(InheritError::RuleMismatch {
                kind: ObjectKind::Item,
                key: existing.key.clone(),
                host: host.name.clone(),
            });
        }
        Ok(())
    }

    async fn unresolved_dependency(
        &self,
        _ctx: &SyncContext,
        parent: &Item,
        dependency_id: &str,
        host: &HostInfo,
    ) -> Result<ObjectId, InheritError> {
        Err(InheritError::DanglingReference {
            kind: ObjectKind::Item,
            from: parent.key.clone(),
            to: dependency_id.to_string(),
            host: host.name.clone(),
        })
    }

    fn cascades_to_dependents(&self) -> bool {
        true
    }
}
