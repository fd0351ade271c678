//! JSON 快照与内存存储之间的转换。
//!
//! - 加载：主机、链接、监控项、触发器、主机原型依次写入存储
//! - 导出：按存储当前状态生成快照（ID 有序）

use crate::error::CliError;
use api_contract::{
    ApplicationDto, GroupPrototypeDto, HostDto, HostPrototypeDto, InterfaceDto, ItemDto, LinkDto,
    SnapshotDto, TriggerDto,
};
use domain::{
    Application, GroupPrototype, HostInfo, HostInterface, HostPrototype, Item, ObjectFlags,
    ParseEnumError, Trigger,
};
use std::str::FromStr;
use tmpl_storage::{InMemoryConfigStore, StoredObject};

fn parse<E: FromStr<Err = ParseEnumError>>(value: &str) -> Result<E, CliError> {
    E::from_str(value).map_err(|err| CliError::Snapshot(err.to_string()))
}

/// 把快照写入新的内存存储。
pub fn load_store(snapshot: SnapshotDto) -> Result<InMemoryConfigStore, CliError> {
    let store = InMemoryConfigStore::new();
    for host in snapshot.hosts {
        store.add_host(host_from_dto(host)?)?;
    }
    for link in &snapshot.links {
        store.link_template(&link.template_id, &link.host_id)?;
    }

    let items = snapshot
        .items
        .into_iter()
        .map(item_from_dto)
        .collect::<Result<Vec<_>, _>>()?;
    seed_all(&store, items)?;
    let triggers = snapshot
        .triggers
        .into_iter()
        .map(trigger_from_dto)
        .collect::<Result<Vec<_>, _>>()?;
    seed_all(&store, triggers)?;
    let host_prototypes = snapshot
        .host_prototypes
        .into_iter()
        .map(host_prototype_from_dto)
        .collect::<Result<Vec<_>, _>>()?;
    seed_all(&store, host_prototypes)?;
    Ok(store)
}

// 先写入带 ID 的对象，新分配的 ID 才不会与之冲突。
fn seed_all<T: StoredObject>(
    store: &InMemoryConfigStore,
    objects: Vec<T>,
) -> Result<(), CliError> {
    let (with_ids, without_ids): (Vec<T>, Vec<T>) =
        objects.into_iter().partition(|object| object.id().is_some());
    for object in with_ids {
        if let Some(id) = object.id() {
            if store.get::<T>(id).is_some() {
                return Err(CliError::Snapshot(format!(
                    "duplicate {} id: {id}",
                    T::KIND.as_str()
                )));
            }
        }
        store.seed(object)?;
    }
    for object in without_ids {
        store.seed(object)?;
    }
    Ok(())
}

/// 导出存储当前状态。
pub fn export(store: &InMemoryConfigStore) -> SnapshotDto {
    SnapshotDto {
        hosts: store.hosts().into_iter().map(host_to_dto).collect(),
        links: store
            .links()
            .into_iter()
            .map(|(template_id, host_id)| LinkDto {
                template_id,
                host_id,
            })
            .collect(),
        items: store.all::<Item>().into_iter().map(item_to_dto).collect(),
        triggers: store
            .all::<Trigger>()
            .into_iter()
            .map(trigger_to_dto)
            .collect(),
        host_prototypes: store
            .all::<HostPrototype>()
            .into_iter()
            .map(host_prototype_to_dto)
            .collect(),
    }
}

fn host_from_dto(dto: HostDto) -> Result<HostInfo, CliError> {
    let mut host = HostInfo::new(dto.host_id, dto.name, parse(&dto.status)?);
    host.discovered = dto.discovered;
    host.interfaces = dto
        .interfaces
        .into_iter()
        .map(|item| {
            Ok(HostInterface {
                interface_id: item.interface_id,
                interface_type: parse(&item.interface_type)?,
                main: item.main,
            })
        })
        .collect::<Result<Vec<_>, CliError>>()?;
    host.applications = dto
        .applications
        .into_iter()
        .map(|item| Application {
            application_id: item.application_id,
            name: item.name,
            template_ids: item.template_ids,
        })
        .collect();
    Ok(host)
}

fn host_to_dto(host: HostInfo) -> HostDto {
    HostDto {
        host_id: host.host_id,
        name: host.name,
        status: host.status.as_str().to_string(),
        discovered: host.discovered,
        interfaces: host
            .interfaces
            .into_iter()
            .map(|item| InterfaceDto {
                interface_id: item.interface_id,
                interface_type: item.interface_type.as_str().to_string(),
                main: item.main,
            })
            .collect(),
        applications: host
            .applications
            .into_iter()
            .map(|item| ApplicationDto {
                application_id: item.application_id,
                name: item.name,
                template_ids: item.template_ids,
            })
            .collect(),
    }
}

fn item_from_dto(dto: ItemDto) -> Result<Item, CliError> {
    Ok(Item {
        item_id: dto.item_id,
        host_id: dto.host_id,
        template_id: dto.template_id,
        name: dto.name,
        key: dto.key,
        item_type: parse(&dto.item_type)?,
        flags: parse(&dto.flags)?,
        delay: dto.delay,
        master_item_id: dto.master_item_id,
        interface_id: dto.interface_id,
        rule_id: dto.rule_id,
        application_ids: dto.application_ids,
        description: dto.description,
    })
}

fn item_to_dto(item: Item) -> ItemDto {
    ItemDto {
        item_id: item.item_id,
        host_id: item.host_id,
        template_id: item.template_id,
        name: item.name,
        key: item.key,
        item_type: item.item_type.as_str().to_string(),
        flags: item.flags.as_str().to_string(),
        delay: item.delay,
        master_item_id: item.master_item_id,
        interface_id: item.interface_id,
        rule_id: item.rule_id,
        application_ids: item.application_ids,
        description: item.description,
    }
}

fn trigger_from_dto(dto: TriggerDto) -> Result<Trigger, CliError> {
    Ok(Trigger {
        trigger_id: dto.trigger_id,
        host_id: dto.host_id,
        template_id: dto.template_id,
        description: dto.description,
        expression: dto.expression,
        recovery_expression: dto.recovery_expression,
        priority: dto.priority,
        enabled: dto.enabled,
        comments: dto.comments,
        flags: parse(&dto.flags)?,
        dependencies: dto.dependencies,
    })
}

fn trigger_to_dto(trigger: Trigger) -> TriggerDto {
    TriggerDto {
        trigger_id: trigger.trigger_id,
        host_id: trigger.host_id,
        template_id: trigger.template_id,
        description: trigger.description,
        expression: trigger.expression,
        recovery_expression: trigger.recovery_expression,
        priority: trigger.priority,
        enabled: trigger.enabled,
        comments: trigger.comments,
        flags: trigger.flags.as_str().to_string(),
        dependencies: trigger.dependencies,
    }
}

// 快照中省略 flags 时主机原型按原型处理。
fn host_prototype_from_dto(dto: HostPrototypeDto) -> Result<HostPrototype, CliError> {
    let flags = match parse::<ObjectFlags>(&dto.flags)? {
        ObjectFlags::Normal => ObjectFlags::Prototype,
        other => other,
    };
    Ok(HostPrototype {
        host_prototype_id: dto.host_prototype_id,
        host_id: dto.host_id,
        rule_id: dto.rule_id,
        template_id: dto.template_id,
        host: dto.host,
        name: dto.name,
        enabled: dto.enabled,
        flags,
        group_prototypes: dto
            .group_prototypes
            .into_iter()
            .map(|group| GroupPrototype {
                group_prototype_id: group.group_prototype_id,
                name: group.name,
                group_id: group.group_id,
                template_id: group.template_id,
            })
            .collect(),
        template_ids: dto.template_ids,
        inventory_mode: parse(&dto.inventory_mode)?,
    })
}

fn host_prototype_to_dto(prototype: HostPrototype) -> HostPrototypeDto {
    HostPrototypeDto {
        host_prototype_id: prototype.host_prototype_id,
        host_id: prototype.host_id,
        rule_id: prototype.rule_id,
        template_id: prototype.template_id,
        host: prototype.host,
        name: prototype.name,
        enabled: prototype.enabled,
        flags: prototype.flags.as_str().to_string(),
        group_prototypes: prototype
            .group_prototypes
            .into_iter()
            .map(|group| GroupPrototypeDto {
                group_prototype_id: group.group_prototype_id,
                name: group.name,
                group_id: group.group_id,
                template_id: group.template_id,
            })
            .collect(),
        template_ids: prototype.template_ids,
        inventory_mode: prototype.inventory_mode.as_str().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::InventoryMode;

    fn sample() -> SnapshotDto {
        serde_json::from_str(
            r#"{
                "hosts": [
                    {"hostId": "t1", "name": "Template OS", "status": "template"},
                    {"hostId": "h1", "name": "web-01", "status": "monitored",
                     "interfaces": [{"interfaceId": "if-1", "type": "agent"}]}
                ],
                "links": [{"templateId": "t1", "hostId": "h1"}],
                "items": [
                    {"hostId": "t1", "name": "Ping", "key": "agent.ping", "type": "zabbix_agent"},
                    {"itemId": "item-1", "hostId": "t1", "name": "Disks",
                     "key": "vfs.dev.discovery", "type": "zabbix_agent", "flags": "discovery_rule"}
                ],
                "hostPrototypes": [
                    {"hostId": "t1", "ruleId": "item-1", "host": "{#DEV}",
                     "groupPrototypes": [{"groupId": "g1"}], "templateIds": ["t1"],
                     "inventoryMode": "automatic"}
                ]
            }"#,
        )
        .expect("snapshot json")
    }

    #[test]
    fn load_keeps_explicit_ids_and_links() {
        let store = load_store(sample()).expect("load");
        assert_eq!(store.links(), vec![("t1".to_string(), "h1".to_string())]);
        let rule: Item = store.get("item-1").expect("rule");
        assert_eq!(rule.flags, ObjectFlags::DiscoveryRule);

        let items = store.all::<Item>();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| item.item_id.is_some()));
        assert!(items.iter().any(|item| item.key == "agent.ping"
            && item.item_id.as_deref() != Some("item-1")));

        let prototype = store.all::<HostPrototype>().remove(0);
        assert_eq!(prototype.flags, ObjectFlags::Prototype);
        assert!(prototype.group_prototypes[0].group_prototype_id.is_some());
        assert_eq!(prototype.template_ids, vec!["t1".to_string()]);
        assert_eq!(prototype.inventory_mode, InventoryMode::Automatic);
    }

    #[test]
    fn export_reflects_store_state() {
        let store = load_store(sample()).expect("load");
        let exported = export(&store);
        assert_eq!(exported.hosts.len(), 2);
        let web = exported
            .hosts
            .iter()
            .find(|host| host.host_id == "h1")
            .expect("h1");
        assert_eq!(web.interfaces[0].interface_type, "agent");
        assert_eq!(exported.links.len(), 1);
        assert_eq!(exported.items.len(), 2);
        assert_eq!(exported.host_prototypes[0].flags, "prototype");
        assert_eq!(exported.host_prototypes[0].inventory_mode, "automatic");
    }

    #[test]
    fn unknown_enum_values_are_rejected() {
        let mut snapshot = sample();
        snapshot.items[0].item_type = "carrier_pigeon".to_string();
        let err = load_store(snapshot).err().expect("invalid type");
        assert_eq!(err.code(), "SNAPSHOT.INVALID");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut snapshot = sample();
        let mut duplicate = snapshot.items[1].clone();
        duplicate.key = "other.discovery".to_string();
        snapshot.items.push(duplicate);
        assert!(load_store(snapshot).is_err());
    }
}
