//! 依赖图校验。
//!
//! - 触发器依赖：自依赖、重复依赖、主机依赖模板、依赖自身的继承子对象、环
//! - 模板触发器依赖：不得指向链接层级中的上层模板或下层主机
//! - 监控项主从链：自引用、跨主机、跨发现规则、环、深度与后代数量上限
//!
//! `validate_dependencies` 为纯函数；`load_graph` 从存储加载校验所需的既有图。

use crate::error::InheritError;
use domain::{
    ConfigObject, DependencyEdge, HostId, HostInfo, HostPrototype, Item, ObjectId, ObjectKind,
    SyncContext, Trigger,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::iter::Flatten;
use std::option;
use tmpl_storage::{LinkDirectory, ObjectStore};

pub const MAX_DEPENDENCY_DEPTH: usize = 3;
pub const MAX_DEPENDENCY_COUNT: usize = 999;

/// 主从链深度与单棵树后代数量上限。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyLimits {
    pub max_depth: usize,
    pub max_count: usize,
}

impl Default for DependencyLimits {
    fn default() -> Self {
        Self {
            max_depth: MAX_DEPENDENCY_DEPTH,
            max_count: MAX_DEPENDENCY_COUNT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub owner_id: HostId,
    pub owner_is_template: bool,
    pub template_id: Option<ObjectId>,
    pub rule_id: Option<ObjectId>,
}

/// 既有依赖图：节点属性与出边。
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: BTreeMap<ObjectId, BTreeSet<ObjectId>>,
    nodes: HashMap<ObjectId, NodeInfo>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: impl Into<ObjectId>, info: NodeInfo) {
        self.nodes.insert(id.into(), info);
    }

    pub fn add_edge(&mut self, from_id: impl Into<ObjectId>, to_id: impl Into<ObjectId>) {
        self.edges
            .entry(from_id.into())
            .or_default()
            .insert(to_id.into());
    }

    pub fn node(&self, id: &str) -> Option<&NodeInfo> {
        self.nodes.get(id)
    }

    fn targets(&self, id: &str) -> Flatten<option::IntoIter<&BTreeSet<ObjectId>>> {
        self.edges.get(id).into_iter().flatten()
    }

    /// 以批次中的出边替换既有出边。
    fn merged(&self, proposed: &[DependencyEdge]) -> Self {
        let mut merged = self.clone();
        let mut replaced = HashSet::new();
        for edge in proposed {
            if replaced.insert(edge.from_id.clone()) {
                merged.edges.insert(edge.from_id.clone(), BTreeSet::new());
            }
            merged.add_edge(edge.from_id.clone(), edge.to_id.clone());
        }
        merged
    }
}

/// 校验批次依赖边与既有图合并后的结果。
pub fn validate_dependencies(
    kind: ObjectKind,
    proposed: &[DependencyEdge],
    graph: &DependencyGraph,
    limits: DependencyLimits,
) -> Result<(), InheritError> {
    let mut seen = HashSet::new();
    let mut froms = Vec::new();
    for edge in proposed {
        if edge.from_id == edge.to_id {
            return Err(InheritError::SelfDependency {
                kind,
                id: edge.from_id.clone(),
            });
        }
        if !seen.insert(edge) {
            return Err(InheritError::DuplicateDependency {
                from: edge.from_id.clone(),
                to: edge.to_id.clone(),
            });
        }
        if !froms.contains(&edge.from_id) {
            froms.push(edge.from_id.clone());
        }
    }

    let merged = graph.merged(proposed);
    for from in &froms {
        match kind {
            ObjectKind::Item => check_item(from, &merged, limits)?,
            ObjectKind::Trigger => check_trigger(from, &merged)?,
            ObjectKind::HostPrototype => {
                return Err(InheritError::validation(
                    "dependencies",
                    "host prototypes have no dependency edges",
                ));
            }
        }
    }
    Ok(())
}

fn known<'a>(
    graph: &'a DependencyGraph,
    id: &str,
    field: &str,
) -> Result<&'a NodeInfo, InheritError> {
    graph
        .node(id)
        .ok_or_else(|| InheritError::validation(field, format!("unknown object {id}")))
}

fn check_item(
    from: &str,
    graph: &DependencyGraph,
    limits: DependencyLimits,
) -> Result<(), InheritError> {
    let masters: Vec<&ObjectId> = graph.targets(from).collect();
    if masters.len() > 1 {
        return Err(InheritError::validation(
            "master_item_id",
            format!("item {from} can have only one master item"),
        ));
    }
    let Some(master) = masters.first() else {
        return Ok(());
    };
    let node = known(graph, from, "item_id")?;
    let master_node = known(graph, master, "master_item_id")?;
    if node.owner_id != master_node.owner_id {
        return Err(InheritError::OwnerMismatch {
            kind: ObjectKind::Item,
            from: from.to_string(),
            to: master.to_string(),
        });
    }
    if master_node.rule_id.is_some() && master_node.rule_id != node.rule_id {
        return Err(InheritError::RuleMismatch {
            kind: ObjectKind::Item,
            key: from.to_string(),
            host: node.owner_id.clone(),
        });
    }

    // 向上找到根，同时检测环。
    let mut path = vec![from.to_string()];
    let mut current = from.to_string();
    while let Some(next) = graph.targets(&current).next() {
        if path.contains(next) {
            path.push(next.clone());
            return Err(InheritError::CircularDependency { chain: path });
        }
        path.push(next.clone());
        current = next.clone();
    }
    let root = current;

    // 自根向下统计深度与后代数量。
    let mut dependents: HashMap<&ObjectId, Vec<&ObjectId>> = HashMap::new();
    for (item, targets) in &graph.edges {
        for target in targets {
            dependents.entry(target).or_default().push(item);
        }
    }
    let mut parent_of: HashMap<&ObjectId, &ObjectId> = HashMap::new();
    let mut queue = VecDeque::from([(&root, 0usize)]);
    let mut count = 0usize;
    while let Some((node, depth)) = queue.pop_front() {
        if depth > limits.max_depth {
            let mut chain = vec![node.clone()];
            let mut cursor = node;
            while let Some(parent) = parent_of.get(cursor) {
                chain.push(parent.to_string());
                cursor = *parent;
            }
            chain.reverse();
            return Err(InheritError::DepthExceeded {
                limit: limits.max_depth,
                chain,
            });
        }
        for child in dependents.get(node).into_iter().flatten() {
            if parent_of.contains_key(child) || *child == &root {
                continue;
            }
            parent_of.insert(*child, node);
            count += 1;
            queue.push_back((*child, depth + 1));
        }
    }
    if count > limits.max_count {
        return Err(InheritError::FanOutExceeded {
            root,
            count,
            limit: limits.max_count,
        });
    }
    Ok(())
}

fn check_trigger(from: &str, graph: &DependencyGraph) -> Result<(), InheritError> {
    let node = known(graph, from, "trigger_id")?;
    for to in graph.targets(from) {
        let target = known(graph, to, "dependencies")?;
        if !node.owner_is_template && target.owner_is_template {
            return Err(InheritError::HostToTemplate {
                from: from.to_string(),
                to: to.clone(),
            });
        }
        let mut visited = HashSet::new();
        let mut ancestor = target.template_id.as_deref();
        while let Some(template_id) = ancestor {
            if template_id == from {
                return Err(InheritError::DependsOnChild {
                    from: from.to_string(),
                    to: to.clone(),
                });
            }
            if !visited.insert(template_id) {
                break;
            }
            ancestor = graph
                .node(template_id)
                .and_then(|info| info.template_id.as_deref());
        }
    }

    // 深度优先回溯到起点即为环。
    let mut parent_of: HashMap<&str, &str> = HashMap::new();
    let mut stack: Vec<&str> = vec![from];
    let mut visited: HashSet<&str> = HashSet::new();
    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        for next in graph.targets(current) {
            if next == from {
                let mut chain = vec![from.to_string()];
                let mut cursor = current;
                let mut reversed = Vec::new();
                while cursor != from {
                    reversed.push(cursor.to_string());
                    cursor = parent_of.get(cursor).copied().unwrap_or(from);
                }
                reversed.reverse();
                chain.extend(reversed);
                chain.push(from.to_string());
                return Err(InheritError::CircularDependency { chain });
            }
            if !visited.contains(next.as_str()) {
                parent_of.entry(next.as_str()).or_insert(current);
                stack.push(next.as_str());
            }
        }
    }
    Ok(())
}

/// 参与依赖图的对象。
pub trait GraphNode: ConfigObject {
    fn rule_id(&self) -> Option<&str> {
        None
    }
}

impl GraphNode for Item {
    fn rule_id(&self) -> Option<&str> {
        self.rule_id.as_deref()
    }
}

impl GraphNode for Trigger {}

impl GraphNode for HostPrototype {}

/// 加载批次校验所需的既有图：祖先依赖、继承链，以及监控项的全部后代。
///
/// 批次对象可以携带尚未持久化的临时 ID。
pub async fn load_graph<T: GraphNode>(
    ctx: &SyncContext,
    store: &dyn ObjectStore<T>,
    links: &dyn LinkDirectory,
    batch: &[T],
) -> Result<DependencyGraph, InheritError> {
    let mut objects: HashMap<ObjectId, T> = HashMap::new();
    let batch_ids: HashSet<ObjectId> = batch
        .iter()
        .filter_map(|item| item.id().map(str::to_string))
        .collect();
    let mut pending: BTreeSet<ObjectId> = BTreeSet::new();
    for object in batch {
        let Some(id) = object.id() else {
            continue;
        };
        pending.extend(object.dependency_ids());
        pending.extend(object.template_id().map(str::to_string));
        objects.insert(id.to_string(), object.clone());
    }

    let mut requested: HashSet<ObjectId> = HashSet::new();
    loop {
        let missing: Vec<ObjectId> = pending
            .iter()
            .filter(|id| !objects.contains_key(*id) && !requested.contains(*id))
            .cloned()
            .collect();
        pending.clear();
        if missing.is_empty() {
            break;
        }
        requested.extend(missing.iter().cloned());
        for object in store.find_by_ids(ctx, &missing).await? {
            pending.extend(object.dependency_ids());
            pending.extend(object.template_id().map(str::to_string));
            if let Some(id) = object.id() {
                objects.insert(id.to_string(), object.clone());
            }
        }
    }

    if T::KIND == ObjectKind::Item {
        let mut frontier: Vec<ObjectId> = objects.keys().cloned().collect();
        while !frontier.is_empty() {
            let found = store.find_by_dependency_ids(ctx, &frontier).await?;
            frontier = Vec::new();
            for object in found {
                let Some(id) = object.id().map(str::to_string) else {
                    continue;
                };
                if !objects.contains_key(&id) {
                    frontier.push(id.clone());
                    objects.insert(id, object);
                }
            }
        }
    }

    let owner_ids: Vec<HostId> = objects
        .values()
        .map(|object| object.owner_id().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let templates: HashSet<HostId> = links
        .find_hosts(ctx, &owner_ids)
        .await?
        .into_iter()
        .filter(HostInfo::is_template)
        .map(|host| host.host_id)
        .collect();

    let mut graph = DependencyGraph::new();
    for (id, object) in &objects {
        graph.add_node(
            id.clone(),
            NodeInfo {
                owner_id: object.owner_id().to_string(),
                owner_is_template: templates.contains(object.owner_id()),
                template_id: object.template_id().map(str::to_string),
                rule_id: object.rule_id().map(str::to_string),
            },
        );
        if batch_ids.contains(id) {
            continue;
        }
        for target in object.dependency_ids() {
            graph.add_edge(id.clone(), target);
        }
    }
    Ok(graph)
}

/// 模板触发器不能依赖其下层（链接了该模板的模板或主机）与上层模板的触发器。
pub async fn check_template_hierarchy(
    ctx: &SyncContext,
    links: &dyn LinkDirectory,
    proposed: &[DependencyEdge],
    graph: &DependencyGraph,
) -> Result<(), InheritError> {
    let mut below: HashMap<HostId, HashSet<HostId>> = HashMap::new();
    let mut above: HashMap<HostId, HashSet<HostId>> = HashMap::new();
    for edge in proposed {
        let (Some(from), Some(to)) = (graph.node(&edge.from_id), graph.node(&edge.to_id)) else {
            continue;
        };
        if !from.owner_is_template || from.owner_id == to.owner_id {
            continue;
        }
        if !below.contains_key(&from.owner_id) {
            let hosts = linked_below(ctx, links, &from.owner_id).await?;
            below.insert(from.owner_id.clone(), hosts);
        }
        if below
            .get(&from.owner_id)
            .is_some_and(|hosts| hosts.contains(&to.owner_id))
        {
            return Err(InheritError::DependsOnLinkedHost {
                from: edge.from_id.clone(),
                to: edge.to_id.clone(),
                host: host_name(ctx, links, &to.owner_id).await?,
            });
        }
        if !above.contains_key(&from.owner_id) {
            let templates = linked_above(ctx, links, &from.owner_id).await?;
            above.insert(from.owner_id.clone(), templates);
        }
        if above
            .get(&from.owner_id)
            .is_some_and(|templates| templates.contains(&to.owner_id))
        {
            return Err(InheritError::DependsOnParentTemplate {
                from: edge.from_id.clone(),
                to: edge.to_id.clone(),
                template: host_name(ctx, links, &to.owner_id).await?,
            });
        }
    }
    Ok(())
}

// 逐层展开直接或间接链接了该模板的主机与模板。
async fn linked_below(
    ctx: &SyncContext,
    links: &dyn LinkDirectory,
    template_id: &str,
) -> Result<HashSet<HostId>, InheritError> {
    let mut found = HashSet::new();
    let mut frontier = vec![template_id.to_string()];
    while !frontier.is_empty() {
        let hosts = links.resolve_linked_hosts(ctx, &frontier, None).await?;
        frontier = hosts
            .into_iter()
            .map(|host| host.host_id)
            .filter(|host_id| host_id != template_id && found.insert(host_id.clone()))
            .collect();
    }
    Ok(found)
}

async fn linked_above(
    ctx: &SyncContext,
    links: &dyn LinkDirectory,
    host_id: &str,
) -> Result<HashSet<HostId>, InheritError> {
    let mut found = HashSet::new();
    let mut frontier = vec![host_id.to_string()];
    while !frontier.is_empty() {
        let hosts = links.find_hosts(ctx, &frontier).await?;
        frontier = hosts
            .into_iter()
            .flat_map(|host| host.parent_templates)
            .map(|template| template.template_id)
            .filter(|template_id| template_id != host_id && found.insert(template_id.clone()))
            .collect();
    }
    Ok(found)
}

async fn host_name(
    ctx: &SyncContext,
    links: &dyn LinkDirectory,
    host_id: &str,
) -> Result<String, InheritError> {
    Ok(links
        .find_hosts(ctx, &[host_id.to_string()])
        .await?
        .into_iter()
        .next()
        .map(|host| host.name)
        .unwrap_or_else(|| host_id.to_string()))
}

/// 模板触发器依赖其它模板的触发器时，链接到前者的主机必须同时链接到后者。
pub async fn check_template_links(
    ctx: &SyncContext,
    links: &dyn LinkDirectory,
    proposed: &[DependencyEdge],
    graph: &DependencyGraph,
) -> Result<(), InheritError> {
    check_template_hierarchy(ctx, links, proposed, graph).await?;
    let mut pairs: BTreeSet<(HostId, HostId)> = BTreeSet::new();
    for edge in proposed {
        let (Some(from), Some(to)) = (graph.node(&edge.from_id), graph.node(&edge.to_id)) else {
            continue;
        };
        if from.owner_is_template && to.owner_is_template && from.owner_id != to.owner_id {
            pairs.insert((from.owner_id.clone(), to.owner_id.clone()));
        }
    }
    for (template_id, dependency_template_id) in pairs {
        let hosts = links
            .resolve_linked_hosts(ctx, std::slice::from_ref(&template_id), None)
            .await?;
        if let Some(host) = hosts
            .iter()
            .find(|host| !host.links_template(&dependency_template_id))
        {
            let template = links
                .find_hosts(ctx, std::slice::from_ref(&dependency_template_id))
                .await?
                .into_iter()
                .next()
                .map(|item| item.name)
                .unwrap_or(dependency_template_id);
            return Err(InheritError::MissingTemplateLink {
                host: host.name.clone(),
                template,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(owner: &str, template: bool) -> NodeInfo {
        NodeInfo {
            owner_id: owner.to_string(),
            owner_is_template: template,
            template_id: None,
            rule_id: None,
        }
    }

    fn item_chain(length: usize) -> (DependencyGraph, Vec<DependencyEdge>) {
        let mut graph = DependencyGraph::new();
        let mut proposed = Vec::new();
        graph.add_node("i0", node("h1", false));
        for index in 1..=length {
            let id = format!("i{index}");
            graph.add_node(id.clone(), node("h1", false));
            proposed.push(DependencyEdge::new(id, format!("i{}", index - 1)));
        }
        (graph, proposed)
    }

    #[test]
    fn item_chain_at_depth_limit_passes() {
        let (graph, proposed) = item_chain(MAX_DEPENDENCY_DEPTH);
        validate_dependencies(ObjectKind::Item, &proposed, &graph, DependencyLimits::default())
            .expect("within limit");
    }

    #[test]
    fn item_chain_over_depth_limit_fails() {
        let (graph, proposed) = item_chain(MAX_DEPENDENCY_DEPTH + 1);
        let err =
            validate_dependencies(ObjectKind::Item, &proposed, &graph, DependencyLimits::default())
                .expect_err("too deep");
        match err {
            InheritError::DepthExceeded { limit, chain } => {
                assert_eq!(limit, MAX_DEPENDENCY_DEPTH);
                assert_eq!(chain.first().map(String::as_str), Some("i0"));
                assert_eq!(chain.len(), MAX_DEPENDENCY_DEPTH + 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn item_fan_out_limit() {
        let mut graph = DependencyGraph::new();
        graph.add_node("root", node("h1", false));
        let mut proposed = Vec::new();
        for index in 0..3 {
            let id = format!("d{index}");
            graph.add_node(id.clone(), node("h1", false));
            proposed.push(DependencyEdge::new(id, "root"));
        }
        let limits = DependencyLimits {
            max_depth: 3,
            max_count: 2,
        };
        let err = validate_dependencies(ObjectKind::Item, &proposed, &graph, limits)
            .expect_err("fan out");
        assert!(matches!(err, InheritError::FanOutExceeded { count: 3, .. }));
    }

    #[test]
    fn item_master_on_other_host_fails() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a", node("h1", false));
        graph.add_node("b", node("h2", false));
        let err = validate_dependencies(
            ObjectKind::Item,
            &[DependencyEdge::new("b", "a")],
            &graph,
            DependencyLimits::default(),
        )
        .expect_err("owner");
        assert!(matches!(err, InheritError::OwnerMismatch { .. }));
    }

    #[test]
    fn item_prototype_master_in_other_rule_fails() {
        let mut graph = DependencyGraph::new();
        let mut master = node("h1", false);
        master.rule_id = Some("r1".to_string());
        let mut dependent = node("h1", false);
        dependent.rule_id = Some("r2".to_string());
        graph.add_node("a", master);
        graph.add_node("b", dependent);
        let err = validate_dependencies(
            ObjectKind::Item,
            &[DependencyEdge::new("b", "a")],
            &graph,
            DependencyLimits::default(),
        )
        .expect_err("rule");
        assert!(matches!(err, InheritError::RuleMismatch { .. }));
    }

    #[test]
    fn item_cycle_is_rejected() {
        let mut graph = DependencyGraph::new();
        for id in ["a", "b", "c"] {
            graph.add_node(id, node("h1", false));
        }
        graph.add_edge("b", "a");
        graph.add_edge("c", "b");
        let err = validate_dependencies(
            ObjectKind::Item,
            &[DependencyEdge::new("a", "c")],
            &graph,
            DependencyLimits::default(),
        )
        .expect_err("cycle");
        assert!(matches!(err, InheritError::CircularDependency { .. }));
    }

    #[test]
    fn trigger_cycle_reports_chain() {
        let mut graph = DependencyGraph::new();
        for id in ["a", "b", "c"] {
            graph.add_node(id, node("h1", false));
        }
        graph.add_edge("b", "c");
        graph.add_edge("c", "a");
        let err = validate_dependencies(
            ObjectKind::Trigger,
            &[DependencyEdge::new("a", "b")],
            &graph,
            DependencyLimits::default(),
        )
        .expect_err("cycle");
        match err {
            InheritError::CircularDependency { chain } => {
                assert_eq!(chain, vec!["a", "b", "c", "a"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn self_and_duplicate_dependencies() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a", node("h1", false));
        graph.add_node("b", node("h1", false));
        let err = validate_dependencies(
            ObjectKind::Trigger,
            &[DependencyEdge::new("a", "a")],
            &graph,
            DependencyLimits::default(),
        )
        .expect_err("self");
        assert!(matches!(err, InheritError::SelfDependency { .. }));

        let err = validate_dependencies(
            ObjectKind::Trigger,
            &[DependencyEdge::new("a", "b"), DependencyEdge::new("a", "b")],
            &graph,
            DependencyLimits::default(),
        )
        .expect_err("duplicate");
        assert!(matches!(err, InheritError::DuplicateDependency { .. }));
    }

    #[test]
    fn host_trigger_cannot_depend_on_template_trigger() {
        let mut graph = DependencyGraph::new();
        graph.add_node("host-trigger", node("h1", false));
        graph.add_node("template-trigger", node("t1", true));
        let err = validate_dependencies(
            ObjectKind::Trigger,
            &[DependencyEdge::new("host-trigger", "template-trigger")],
            &graph,
            DependencyLimits::default(),
        )
        .expect_err("direction");
        assert!(matches!(err, InheritError::HostToTemplate { .. }));
    }

    #[test]
    fn trigger_cannot_depend_on_own_descendant() {
        let mut graph = DependencyGraph::new();
        graph.add_node("parent", node("t1", true));
        let mut middle = node("t2", true);
        middle.template_id = Some("parent".to_string());
        graph.add_node("middle", middle);
        let mut leaf = node("t3", true);
        leaf.template_id = Some("middle".to_string());
        graph.add_node("leaf", leaf);
        let err = validate_dependencies(
            ObjectKind::Trigger,
            &[DependencyEdge::new("parent", "leaf")],
            &graph,
            DependencyLimits::default(),
        )
        .expect_err("child");
        assert!(matches!(err, InheritError::DependsOnChild { .. }));
    }
}
