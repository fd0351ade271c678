use domain::expression::{referenced_hosts, replace_hosts};
use domain::{
    ConfigObject, DependencyEdge, HostInfo, HostInterface, HostStatus, InterfaceRequirement,
    InterfaceType, Item, ItemType, NaturalKey, ObjectFlags, Trigger,
};
use std::collections::HashSet;

#[test]
fn item_natural_key_is_key() {
    let item = Item::new("t1", "Ping", "agent.ping", ItemType::ZabbixAgent);
    assert_eq!(
        item.natural_key(),
        NaturalKey::Item {
            key: "agent.ping".to_string()
        }
    );
    assert_eq!(item.label(), "agent.ping");
}

#[test]
fn item_prerequisites_include_rule() {
    let mut item = Item::new("t1", "FS", "vfs.fs.size[{#FS}]", ItemType::ZabbixAgent);
    item.item_id = Some("i3".to_string());
    item.flags = ObjectFlags::Prototype;
    item.rule_id = Some("i1".to_string());
    item.master_item_id = Some("i2".to_string());

    assert_eq!(item.dependency_ids(), vec!["i2".to_string()]);
    assert_eq!(item.prerequisite_ids(), vec!["i2".to_string(), "i1".to_string()]);
    assert_eq!(item.edges(), vec![DependencyEdge::new("i3", "i2")]);
}

#[test]
fn trigger_dependencies_are_sorted_set() {
    let mut trigger = Trigger::new("t1", "High load", "{T1:system.cpu.load.last()}>5");
    trigger.set_dependency_ids(vec!["tr-3".to_string(), "tr-1".to_string(), "tr-3".to_string()]);
    assert_eq!(trigger.dependencies, vec!["tr-1".to_string(), "tr-3".to_string()]);
}

#[test]
fn interface_requirements_follow_item_type() {
    assert_eq!(
        ItemType::ZabbixAgent.interface_requirement(),
        InterfaceRequirement::Exact(InterfaceType::Agent)
    );
    assert_eq!(
        ItemType::SnmpTrap.interface_requirement(),
        InterfaceRequirement::Exact(InterfaceType::Snmp)
    );
    assert_eq!(ItemType::Simple.interface_requirement(), InterfaceRequirement::Any);
    assert_eq!(
        ItemType::Trapper.interface_requirement(),
        InterfaceRequirement::NotNeeded
    );
    assert_eq!("snmp_trap".parse::<ItemType>(), Ok(ItemType::SnmpTrap));
    assert!("bogus".parse::<ItemType>().is_err());
}

#[test]
fn host_info_helpers() {
    let mut host = HostInfo::new("h1", "web-01", HostStatus::Monitored);
    host.interfaces.push(HostInterface {
        interface_id: "if-2".to_string(),
        interface_type: InterfaceType::Snmp,
        main: false,
    });
    host.interfaces.push(HostInterface {
        interface_id: "if-1".to_string(),
        interface_type: InterfaceType::Snmp,
        main: true,
    });

    assert!(!host.is_template());
    assert_eq!(
        host.main_interface(InterfaceType::Snmp)
            .map(|item| item.interface_id.as_str()),
        Some("if-1")
    );
    assert!(host.main_interface(InterfaceType::Agent).is_none());
}

#[test]
fn expression_lists_hosts_and_skips_macros() {
    let expression =
        "{T1:vfs.fs.size[{#FSNAME},pfree].last()}<{$LOW.SPACE} or {T2:agent.ping.nodata(5m)}=1 and {TRIGGER.VALUE}=0";
    assert_eq!(
        referenced_hosts(expression),
        vec!["T1".to_string(), "T2".to_string()]
    );
}

#[test]
fn expression_rewrites_only_selected_hosts() {
    let expression = "{T1:agent.ping.last()}=0 or {Other:agent.ping.last()}=0 or {T1:system.uptime.last()}<600";
    let from: HashSet<&str> = ["T1"].into_iter().collect();
    assert_eq!(
        replace_hosts(expression, &from, "web-01"),
        "{web-01:agent.ping.last()}=0 or {Other:agent.ping.last()}=0 or {web-01:system.uptime.last()}<600"
    );
}

#[test]
fn expression_with_unbalanced_brace_is_kept() {
    let from: HashSet<&str> = ["T1"].into_iter().collect();
    assert_eq!(replace_hosts("{T1:agent.ping.last()", &from, "h"), "{T1:agent.ping.last()");
}
