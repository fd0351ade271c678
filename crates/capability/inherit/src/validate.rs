//! 父对象输入校验。

use crate::error::InheritError;
use domain::expression::referenced_hosts;
use domain::{ConfigObject, HostPrototype, Item, ItemType, ObjectFlags, Trigger};
use std::collections::HashSet;

/// 所有种类共用：已持久化、有归属、非已发现对象、ID 不重复。
pub fn validate_parents<T: ConfigObject>(parents: &[T]) -> Result<(), InheritError> {
    let mut seen = HashSet::new();
    for parent in parents {
        let Some(id) = parent.id().filter(|id| !id.is_empty()) else {
            return Err(InheritError::validation(
                "id",
                format!("{} \"{}\" must be saved before propagation", T::KIND, parent.label()),
            ));
        };
        if !seen.insert(id) {
            return Err(InheritError::validation("id", format!("duplicate {} {id}", T::KIND)));
        }
        if parent.owner_id().is_empty() {
            return Err(InheritError::validation(
                "host_id",
                format!("{} {id} has no owner", T::KIND),
            ));
        }
        if parent.flags() == ObjectFlags::Discovered {
            return Err(InheritError::validation(
                "flags",
                format!("discovered {} {id} cannot be inherited", T::KIND),
            ));
        }
    }
    Ok(())
}

pub fn validate_items(items: &[Item]) -> Result<(), InheritError> {
    for item in items {
        if item.key.trim().is_empty() {
            return Err(InheritError::validation("key", "item key cannot be empty"));
        }
        if item.name.trim().is_empty() {
            return Err(InheritError::validation(
                "name",
                format!("item \"{}\" has no name", item.key),
            ));
        }
        let is_dependent = item.item_type == ItemType::Dependent;
        if is_dependent != item.master_item_id.is_some() {
            return Err(InheritError::validation(
                "master_item_id",
                format!("item \"{}\": only dependent items have a master item", item.key),
            ));
        }
        match (item.flags, item.rule_id.is_some()) {
            (ObjectFlags::Prototype, false) => {
                return Err(InheritError::validation(
                    "rule_id",
                    format!("item prototype \"{}\" has no discovery rule", item.key),
                ));
            }
            (ObjectFlags::Normal | ObjectFlags::DiscoveryRule, true) => {
                return Err(InheritError::validation(
                    "rule_id",
                    format!("item \"{}\" cannot belong to a discovery rule", item.key),
                ));
            }
            _ => {}
        }
    }
    Ok(())
}

pub fn validate_triggers(triggers: &[Trigger]) -> Result<(), InheritError> {
    for trigger in triggers {
        if trigger.description.trim().is_empty() {
            return Err(InheritError::validation(
                "description",
                "trigger description cannot be empty",
            ));
        }
        if referenced_hosts(&trigger.expression).is_empty() {
            return Err(InheritError::validation(
                "expression",
                format!(
                    "trigger \"{}\" expression must reference at least one item",
                    trigger.description
                ),
            ));
        }
        if trigger.priority > 5 {
            return Err(InheritError::validation(
                "priority",
                format!("trigger \"{}\" priority must be 0..=5", trigger.description),
            ));
        }
    }
    Ok(())
}

pub fn validate_host_prototypes(prototypes: &[HostPrototype]) -> Result<(), InheritError> {
    for prototype in prototypes {
        if prototype.host.trim().is_empty() {
            return Err(InheritError::validation("host", "host prototype name cannot be empty"));
        }
        if prototype.rule_id.is_empty() {
            return Err(InheritError::validation(
                "rule_id",
                format!("host prototype \"{}\" has no discovery rule", prototype.host),
            ));
        }
        if prototype.group_prototypes.is_empty() {
            return Err(InheritError::validation(
                "group_prototypes",
                format!("host prototype \"{}\" needs at least one group", prototype.host),
            ));
        }
        if prototype
            .group_prototypes
            .iter()
            .any(|group| group.name.is_none() && group.group_id.is_none())
        {
            return Err(InheritError::validation(
                "group_prototypes",
                format!("host prototype \"{}\" has an empty group prototype", prototype.host),
            ));
        }
    }
    Ok(())
}
