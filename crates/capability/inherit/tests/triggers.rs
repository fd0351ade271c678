use domain::{HostInfo, HostStatus, SyncContext, Trigger};
use std::sync::Arc;
use tmpl_inherit::{InheritError, TemplateInheritance};
use tmpl_storage::InMemoryConfigStore;

fn ctx() -> SyncContext {
    SyncContext::system("req-triggers")
}

fn setup() -> (Arc<InMemoryConfigStore>, TemplateInheritance) {
    let store = Arc::new(InMemoryConfigStore::new());
    for (id, name, status) in [
        ("t1", "Template OS", HostStatus::Template),
        ("t2", "Template App", HostStatus::Template),
        ("h1", "web-01", HostStatus::Monitored),
        ("h2", "web-02", HostStatus::Monitored),
        ("h3", "db-01", HostStatus::Monitored),
    ] {
        store.add_host(HostInfo::new(id, name, status)).expect("host");
    }
    let engine = TemplateInheritance::new(store.clone());
    (store, engine)
}

fn seed_trigger(store: &InMemoryConfigStore, trigger: Trigger) -> Trigger {
    let id = store.seed(trigger).expect("seed");
    store.get::<Trigger>(&id).expect("seeded trigger")
}

fn triggers_on(store: &InMemoryConfigStore, host_id: &str) -> Vec<Trigger> {
    store
        .all::<Trigger>()
        .into_iter()
        .filter(|trigger| trigger.host_id == host_id)
        .collect()
}

fn high_load(store: &InMemoryConfigStore) -> Trigger {
    let mut trigger = Trigger::new(
        "t1",
        "High load",
        "{Template OS:system.cpu.load.avg(5m)}>5",
    );
    trigger.recovery_expression = "{Template OS:system.cpu.load.avg(5m)}<2".to_string();
    trigger.priority = 3;
    seed_trigger(store, trigger)
}

fn agent_down(store: &InMemoryConfigStore) -> Trigger {
    seed_trigger(
        store,
        Trigger::new("t1", "Agent down", "{Template OS:agent.ping.nodata(5m)}=1"),
    )
}

fn id_of(trigger: &Trigger) -> String {
    trigger.trigger_id.clone().expect("trigger id")
}

#[tokio::test]
async fn expressions_are_rewritten_for_each_host() {
    let (store, engine) = setup();
    store.link_template("t1", "h1").expect("link");
    store.link_template("t1", "h2").expect("link");
    let parent = high_load(&store);

    let report = engine
        .propagate_triggers(&ctx(), vec![parent.clone()], None)
        .await
        .expect("propagate");
    assert_eq!(report.created, 2);

    let child = &triggers_on(&store, "h2")[0];
    assert_eq!(child.template_id, parent.trigger_id);
    assert_eq!(child.expression, "{web-02:system.cpu.load.avg(5m)}>5");
    assert_eq!(child.recovery_expression, "{web-02:system.cpu.load.avg(5m)}<2");
    assert_eq!(child.priority, 3);
}

#[tokio::test]
async fn dependencies_map_to_host_children() {
    let (store, engine) = setup();
    store.link_template("t1", "h1").expect("link");
    let down = agent_down(&store);
    let mut load = high_load(&store);
    load.dependencies = vec![id_of(&down)];
    let load = seed_trigger(&store, load);

    let report = engine
        .propagate_triggers(&ctx(), vec![load, down.clone()], None)
        .await
        .expect("propagate");
    assert_eq!(report.created, 2);
    assert_eq!(report.edges_written, 1);

    let children = triggers_on(&store, "h1");
    let down_child = children
        .iter()
        .find(|trigger| trigger.template_id == down.trigger_id)
        .expect("down child");
    let load_child = children
        .iter()
        .find(|trigger| trigger.description == "High load")
        .expect("load child");
    assert_eq!(load_child.dependencies, vec![id_of(down_child)]);
}

#[tokio::test]
async fn rerun_writes_nothing() {
    let (store, engine) = setup();
    store.link_template("t1", "h1").expect("link");
    let down = agent_down(&store);
    let mut load = high_load(&store);
    load.dependencies = vec![id_of(&down)];
    let load = seed_trigger(&store, load);
    engine
        .propagate_triggers(&ctx(), vec![load.clone(), down.clone()], None)
        .await
        .expect("first run");
    let writes = store.write_count();

    let report = engine
        .propagate_triggers(&ctx(), vec![load, down], None)
        .await
        .expect("second run");
    assert_eq!(report.unchanged, 2);
    assert_eq!(report.edges_written, 0);
    assert_eq!(store.write_count(), writes);
}

#[tokio::test]
async fn dependency_on_plain_host_is_kept() {
    let (store, engine) = setup();
    store.link_template("t1", "h1").expect("link");
    let database = seed_trigger(
        &store,
        Trigger::new("h3", "MySQL down", "{db-01:mysql.ping.last()}=0"),
    );
    let mut load = high_load(&store);
    load.dependencies = vec![id_of(&database)];
    let load = seed_trigger(&store, load);

    engine
        .propagate_triggers(&ctx(), vec![load], None)
        .await
        .expect("propagate");
    let child = &triggers_on(&store, "h1")[0];
    assert_eq!(child.dependencies, vec![id_of(&database)]);
}

#[tokio::test]
async fn dependency_on_unlinked_template_fails() {
    let (store, engine) = setup();
    store.link_template("t1", "h1").expect("link");
    let app = seed_trigger(
        &store,
        Trigger::new("t2", "App down", "{Template App:app.ping.last()}=0"),
    );
    let mut load = high_load(&store);
    load.dependencies = vec![id_of(&app)];
    let load = seed_trigger(&store, load);

    let err = engine
        .validate_trigger_dependencies(&ctx(), std::slice::from_ref(&load))
        .await
        .expect_err("missing link");
    match err {
        InheritError::MissingTemplateLink { host, template } => {
            assert_eq!(host, "web-01");
            assert_eq!(template, "Template App");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let err = engine
        .propagate_triggers(&ctx(), vec![load.clone()], None)
        .await
        .expect_err("dangling");
    assert!(matches!(err, InheritError::DanglingReference { .. }));
    assert!(triggers_on(&store, "h1").is_empty());

    store.link_template("t2", "h1").expect("link");
    engine
        .validate_trigger_dependencies(&ctx(), std::slice::from_ref(&load))
        .await
        .expect("linked now");
    engine
        .propagate_triggers(&ctx(), vec![app.clone()], None)
        .await
        .expect("app trigger");
    engine
        .propagate_triggers(&ctx(), vec![load], None)
        .await
        .expect("load trigger");
    let children = triggers_on(&store, "h1");
    let app_child = children
        .iter()
        .find(|trigger| trigger.template_id == app.trigger_id)
        .expect("app child");
    let load_child = children
        .iter()
        .find(|trigger| trigger.description == "High load")
        .expect("load child");
    assert_eq!(load_child.dependencies, vec![id_of(app_child)]);
}

#[tokio::test]
async fn adopts_host_trigger_with_same_rewritten_expression() {
    let (store, engine) = setup();
    store.link_template("t1", "h1").expect("link");
    let parent = agent_down(&store);
    let manual = seed_trigger(
        &store,
        Trigger::new("h1", "Agent down", "{web-01:agent.ping.nodata(5m)}=1"),
    );

    let report = engine
        .propagate_triggers(&ctx(), vec![parent.clone()], None)
        .await
        .expect("propagate");
    assert_eq!(report.adopted, 1);
    let children = triggers_on(&store, "h1");
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].trigger_id, manual.trigger_id);
    assert_eq!(children[0].template_id, parent.trigger_id);
}

#[tokio::test]
async fn moving_a_trigger_with_children_fails() {
    let (store, engine) = setup();
    store.link_template("t1", "h1").expect("link");
    store.link_template("t2", "h2").expect("link");
    let mut parent = agent_down(&store);
    engine
        .propagate_triggers(&ctx(), vec![parent.clone()], None)
        .await
        .expect("propagate");

    parent.host_id = "t2".to_string();
    let parent = seed_trigger(&store, parent);
    let err = engine
        .propagate_triggers(&ctx(), vec![parent], None)
        .await
        .expect_err("moved");
    assert!(matches!(err, InheritError::MovedWithChildren { .. }));
}

#[tokio::test]
async fn multi_template_trigger_needs_equal_linkage() {
    let (store, engine) = setup();
    store.link_template("t1", "h1").expect("link");
    store.link_template("t2", "h1").expect("link");
    store.link_template("t2", "h2").expect("link");
    let parent = seed_trigger(
        &store,
        Trigger::new(
            "t1",
            "Stack down",
            "{Template OS:agent.ping.last()}=0 and {Template App:app.ping.last()}=0",
        ),
    );

    let err = engine
        .propagate_triggers(&ctx(), vec![parent.clone()], None)
        .await
        .expect_err("linkage");
    assert!(matches!(err, InheritError::LinkageMismatch { .. }));

    store.unlink_template("t2", "h2").expect("unlink");
    engine
        .propagate_triggers(&ctx(), vec![parent], None)
        .await
        .expect("equal linkage");
    let child = &triggers_on(&store, "h1")[0];
    assert_eq!(
        child.expression,
        "{web-01:agent.ping.last()}=0 and {web-01:app.ping.last()}=0"
    );
}

#[tokio::test]
async fn cycle_through_persisted_edges_is_reported_with_chain() {
    let (store, engine) = setup();
    let a = seed_trigger(&store, Trigger::new("h3", "A", "{db-01:a.last()}=0"));
    let c = seed_trigger(&store, Trigger::new("h3", "C", "{db-01:c.last()}=0"));
    let mut b = Trigger::new("h3", "B", "{db-01:b.last()}=0");
    b.dependencies = vec![id_of(&c)];
    let b = seed_trigger(&store, b);
    let mut c = c;
    c.dependencies = vec![id_of(&a)];
    seed_trigger(&store, c.clone());

    let mut a = a;
    a.dependencies = vec![id_of(&b)];
    let err = engine
        .validate_trigger_dependencies(&ctx(), &[a.clone()])
        .await
        .expect_err("cycle");
    match err {
        InheritError::CircularDependency { chain } => {
            assert_eq!(chain, vec![id_of(&a), id_of(&b), id_of(&c), id_of(&a)]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn invalid_edges_are_rejected() {
    let (store, engine) = setup();
    store.link_template("t1", "h1").expect("link");
    let parent = agent_down(&store);

    let mut own = parent.clone();
    own.dependencies = vec![id_of(&parent)];
    let err = engine
        .validate_trigger_dependencies(&ctx(), &[own])
        .await
        .expect_err("self");
    assert!(matches!(err, InheritError::SelfDependency { .. }));

    let mut host_trigger = Trigger::new("h3", "Depends on template", "{db-01:x.last()}=0");
    host_trigger.dependencies = vec![id_of(&parent)];
    let host_trigger = seed_trigger(&store, host_trigger);
    let err = engine
        .validate_trigger_dependencies(&ctx(), &[host_trigger])
        .await
        .expect_err("host to template");
    assert!(matches!(err, InheritError::HostToTemplate { .. }));

    engine
        .propagate_triggers(&ctx(), vec![parent.clone()], None)
        .await
        .expect("propagate");
    let child = triggers_on(&store, "h1").remove(0);
    let mut on_child = parent;
    on_child.dependencies = vec![id_of(&child)];
    let err = engine
        .validate_trigger_dependencies(&ctx(), &[on_child])
        .await
        .expect_err("depends on child");
    assert!(matches!(err, InheritError::DependsOnChild { .. }));
}

#[tokio::test]
async fn delete_removes_children_and_incoming_edges() {
    let (store, engine) = setup();
    store.link_template("t1", "h1").expect("link");
    let down = agent_down(&store);
    let mut load = high_load(&store);
    load.dependencies = vec![id_of(&down)];
    let load = seed_trigger(&store, load);
    engine
        .propagate_triggers(&ctx(), vec![load.clone(), down.clone()], None)
        .await
        .expect("propagate");

    let report = engine
        .delete_triggers(&ctx(), &[id_of(&down)])
        .await
        .expect("delete");
    assert_eq!(report.deleted, 2);
    let remaining = store.all::<Trigger>();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.iter().all(|trigger| trigger.dependencies.is_empty()));
}

#[tokio::test]
async fn dependency_on_trigger_below_the_template_is_rejected() {
    let (store, engine) = setup();
    store.link_template("t1", "h1").expect("link");
    store.link_template("t1", "h2").expect("link");
    let local = seed_trigger(
        &store,
        Trigger::new("h1", "Local", "{web-01:local.ping.last()}=0"),
    );
    let mut load = high_load(&store);
    load.dependencies = vec![id_of(&local)];
    let load = seed_trigger(&store, load);

    let err = engine
        .validate_trigger_dependencies(&ctx(), std::slice::from_ref(&load))
        .await
        .expect_err("host below template");
    match err {
        InheritError::DependsOnLinkedHost { host, .. } => assert_eq!(host, "web-01"),
        other => panic!("unexpected error: {other:?}"),
    }
    let err = engine
        .propagate_triggers(&ctx(), vec![load], None)
        .await
        .expect_err("propagation refuses cross-host edge");
    assert!(matches!(err, InheritError::DependsOnLinkedHost { .. }));
    assert!(triggers_on(&store, "h2").is_empty());
    assert_eq!(triggers_on(&store, "h1").len(), 1);

    // 链接了该模板的子模板同样在下层。
    store.link_template("t1", "t2").expect("nested link");
    let app = seed_trigger(
        &store,
        Trigger::new("t2", "App down", "{Template App:app.ping.last()}=0"),
    );
    let mut down = agent_down(&store);
    down.dependencies = vec![id_of(&app)];
    let err = engine
        .validate_trigger_dependencies(&ctx(), &[down])
        .await
        .expect_err("child template");
    match err {
        InheritError::DependsOnLinkedHost { host, .. } => assert_eq!(host, "Template App"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn dependency_on_parent_template_trigger_is_rejected() {
    let (store, engine) = setup();
    store.link_template("t1", "t2").expect("nested link");
    store.link_template("t2", "h3").expect("link");
    let down = agent_down(&store);
    let mut app = Trigger::new("t2", "App down", "{Template App:app.ping.last()}=0");
    app.dependencies = vec![id_of(&down)];
    let app = seed_trigger(&store, app);

    let err = engine
        .validate_trigger_dependencies(&ctx(), std::slice::from_ref(&app))
        .await
        .expect_err("parent template");
    match err {
        InheritError::DependsOnParentTemplate { template, .. } => {
            assert_eq!(template, "Template OS");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let err = engine
        .propagate_triggers(&ctx(), vec![app], None)
        .await
        .expect_err("propagation");
    assert!(matches!(err, InheritError::DependsOnParentTemplate { .. }));
    assert!(triggers_on(&store, "h3").is_empty());
}
