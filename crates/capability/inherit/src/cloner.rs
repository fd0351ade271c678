//! 子对象克隆的公共部分：接口选择、应用集映射、组原型映射。
//!
//! 克隆从不修改父对象；给定相同的映射表，结果确定。

use crate::error::InheritError;
use domain::{
    ConfigObject, GroupPrototype, HostId, HostInfo, InterfaceRequirement, InterfaceType, ItemType,
    ObjectId,
};
use std::collections::HashMap;

/// (主机, 父对象) -> 子对象 的索引。
#[derive(Debug, Clone, Default)]
pub struct ChildIndex {
    children: HashMap<(HostId, ObjectId), ObjectId>,
}

impl ChildIndex {
    pub fn from_children<T: ConfigObject>(children: &[T]) -> Self {
        let mut index = Self::default();
        for child in children {
            if let (Some(id), Some(template_id)) = (child.id(), child.template_id()) {
                index.insert(child.owner_id(), template_id, id);
            }
        }
        index
    }

    pub fn insert(&mut self, host_id: &str, parent_id: &str, child_id: &str) {
        self.children.insert(
            (host_id.to_string(), parent_id.to_string()),
            child_id.to_string(),
        );
    }

    pub fn get(&self, host_id: &str, parent_id: &str) -> Option<&ObjectId> {
        self.children
            .get(&(host_id.to_string(), parent_id.to_string()))
    }
}

/// 克隆单个父对象到某主机时可见的上下文。
pub struct CloneContext<'a> {
    pub host: &'a HostInfo,
    /// 跨种类或批次外的子对象索引（例如发现规则）。
    pub remap: &'a ChildIndex,
    /// 本主机本轮已解析的 父 ID -> 子 ID。
    pub id_map: &'a HashMap<ObjectId, ObjectId>,
}

impl CloneContext<'_> {
    /// 父对象在本主机上的子对象 ID。
    pub fn child_of(&self, parent_id: &str) -> Option<&ObjectId> {
        self.id_map
            .get(parent_id)
            .or_else(|| self.remap.get(&self.host.host_id, parent_id))
    }
}

/// 为监控项选择主机接口。
///
/// 返回 `Ok(None)` 表示无需接口（模板或不依赖接口的类型）。
pub fn find_interface_for_item(
    item_type: ItemType,
    key: &str,
    host: &HostInfo,
) -> Result<Option<String>, InheritError> {
    if host.is_template() {
        return Ok(None);
    }
    let requirement = item_type.interface_requirement();
    let candidates: &[InterfaceType] = match &requirement {
        InterfaceRequirement::NotNeeded => return Ok(None),
        InterfaceRequirement::Any => &InterfaceType::PRECEDENCE,
        InterfaceRequirement::Exact(interface_type) => std::slice::from_ref(interface_type),
    };
    candidates
        .iter()
        .find_map(|interface_type| host.main_interface(*interface_type))
        .map(|interface| Some(interface.interface_id.clone()))
        .ok_or_else(|| InheritError::NoInterface {
            host: host.name.clone(),
            key: key.to_string(),
        })
}

/// 父应用集 ID 映射为主机上继承的应用集，无法映射的直接丢弃。
pub fn remap_applications(parent_application_ids: &[String], host: &HostInfo) -> Vec<String> {
    let mut out: Vec<String> = parent_application_ids
        .iter()
        .filter_map(|id| host.application_inherited_from(id).cloned())
        .collect();
    out.sort();
    out.dedup();
    out
}

/// 组原型映射：已有子组原型依次按 template_id、名称、链接组匹配，其余新建。
pub fn remap_group_prototypes(
    parent_groups: &[GroupPrototype],
    existing: &[GroupPrototype],
) -> Vec<GroupPrototype> {
    let mut taken = vec![false; existing.len()];
    parent_groups
        .iter()
        .map(|parent| {
            let position = find_unclaimed(existing, &taken, |child| {
                child.template_id.is_some() && child.template_id == parent.group_prototype_id
            })
            .or_else(|| {
                find_unclaimed(existing, &taken, |child| {
                    parent.name.is_some() && child.name == parent.name
                })
            })
            .or_else(|| {
                find_unclaimed(existing, &taken, |child| {
                    parent.group_id.is_some() && child.group_id == parent.group_id
                })
            });
            let group_prototype_id = position.and_then(|index| {
                taken[index] = true;
                existing[index].group_prototype_id.clone()
            });
            GroupPrototype {
                group_prototype_id,
                name: parent.name.clone(),
                group_id: parent.group_id.clone(),
                template_id: parent.group_prototype_id.clone(),
            }
        })
        .collect()
}

fn find_unclaimed(
    existing: &[GroupPrototype],
    taken: &[bool],
    matches: impl Fn(&GroupPrototype) -> bool,
) -> Option<usize> {
    existing
        .iter()
        .enumerate()
        .position(|(index, child)| !taken[index] && matches(child))
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{Application, HostInterface, HostStatus};

    fn host() -> HostInfo {
        let mut host = HostInfo::new("h1", "web-01", HostStatus::Monitored);
        for (id, interface_type) in [("if-snmp", InterfaceType::Snmp), ("if-ipmi", InterfaceType::Ipmi)]
        {
            host.interfaces.push(HostInterface {
                interface_id: id.to_string(),
                interface_type,
                main: true,
            });
        }
        host
    }

    #[test]
    fn any_interface_uses_precedence() {
        let selected = find_interface_for_item(ItemType::Simple, "icmpping", &host()).expect("interface");
        assert_eq!(selected.as_deref(), Some("if-snmp"));
    }

    #[test]
    fn exact_interface_missing_fails() {
        let err = find_interface_for_item(ItemType::ZabbixAgent, "agent.ping", &host())
            .expect_err("no agent");
        assert!(matches!(err, InheritError::NoInterface { .. }));
    }

    #[test]
    fn templates_and_trappers_need_no_interface() {
        let template = HostInfo::new("t1", "Template OS", HostStatus::Template);
        assert_eq!(
            find_interface_for_item(ItemType::ZabbixAgent, "agent.ping", &template).expect("ok"),
            None
        );
        assert_eq!(
            find_interface_for_item(ItemType::Trapper, "trap", &host()).expect("ok"),
            None
        );
    }

    #[test]
    fn applications_are_remapped_or_dropped() {
        let mut host = host();
        host.applications.push(Application {
            application_id: "app-h".to_string(),
            name: "CPU".to_string(),
            template_ids: vec!["app-t".to_string()],
        });
        let mapped = remap_applications(&["app-t".to_string(), "app-missing".to_string()], &host);
        assert_eq!(mapped, vec!["app-h".to_string()]);
    }

    #[test]
    fn group_prototypes_match_template_then_name_then_group() {
        let parent = vec![
            GroupPrototype {
                group_prototype_id: Some("gp-1".to_string()),
                name: Some("VMs".to_string()),
                group_id: None,
                template_id: None,
            },
            GroupPrototype {
                group_prototype_id: Some("gp-2".to_string()),
                name: None,
                group_id: Some("g-linux".to_string()),
                template_id: None,
            },
            GroupPrototype {
                group_prototype_id: Some("gp-3".to_string()),
                name: Some("New".to_string()),
                group_id: None,
                template_id: None,
            },
        ];
        let existing = vec![
            GroupPrototype {
                group_prototype_id: Some("gp-20".to_string()),
                name: None,
                group_id: Some("g-linux".to_string()),
                template_id: None,
            },
            GroupPrototype {
                group_prototype_id: Some("gp-10".to_string()),
                name: Some("Renamed".to_string()),
                group_id: None,
                template_id: Some("gp-1".to_string()),
            },
        ];
        let mapped = remap_group_prototypes(&parent, &existing);
        assert_eq!(mapped[0].group_prototype_id.as_deref(), Some("gp-10"));
        assert_eq!(mapped[0].name.as_deref(), Some("VMs"));
        assert_eq!(mapped[1].group_prototype_id.as_deref(), Some("gp-20"));
        assert_eq!(mapped[2].group_prototype_id, None);
        assert!(mapped.iter().all(|group| group.template_id.is_some()));
    }
}
