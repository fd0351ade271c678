//! 子命令定义与执行。

use crate::error::CliError;
use crate::snapshot;
use api_contract::{ReportDto, SyncResultDto, ValidationResultDto};
use clap::{Parser, Subcommand, ValueEnum};
use domain::{HostId, HostPrototype, Item, ObjectFlags, SyncContext, Trigger};
use std::collections::BTreeSet;
use std::sync::Arc;
use tmpl_inherit::{DependencyLimits, InheritError, PropagationReport, TemplateInheritance};
use tmpl_storage::{InMemoryConfigStore, PermissionChecker, RolePermissionChecker, StoredObject};
use tracing::info;

/// 命令行参数。ID 列表均以逗号分隔。
#[derive(Debug, Parser)]
#[command(name = "tmpl-sync", version, about = "Propagate template objects onto linked hosts")]
pub struct Cli {
    /// 成功后把结果快照写入该文件
    #[arg(long = "out", env = "TMPL_OUT_PATH", global = true)]
    pub out: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// 链接模板并把模板上的全部对象同步到主机
    Sync {
        templates: String,
        /// 缺省为模板当前直接链接的主机
        hosts: Option<String>,
    },
    /// 传播模板上的一类对象
    Propagate {
        kind: PropagateKind,
        templates: String,
        /// 只传播到这些直接链接的主机
        #[arg(long)]
        hosts: Option<String>,
    },
    /// 校验主机上一类对象的依赖关系
    Validate { kind: ValidateKind, owners: String },
    /// 解除模板链接
    Unlink {
        templates: String,
        hosts: String,
        /// 删除继承对象，而不是仅解除关联
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PropagateKind {
    Items,
    Triggers,
    HostPrototypes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ValidateKind {
    Items,
    Triggers,
}

#[derive(Debug)]
pub enum CommandOutput {
    Sync(SyncResultDto),
    Validation(ValidationResultDto),
}

impl CommandOutput {
    pub fn writes_snapshot(&self) -> bool {
        matches!(self, CommandOutput::Sync(_))
    }
}

pub fn split_ids(value: &str) -> Vec<HostId> {
    let mut seen = BTreeSet::new();
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .filter(|item| seen.insert(item.to_string()))
        .map(str::to_string)
        .collect()
}

fn required_ids(value: &str, field: &str) -> Result<Vec<HostId>, CliError> {
    let ids = split_ids(value);
    if ids.is_empty() {
        return Err(CliError::Argument(format!("{field} required")));
    }
    Ok(ids)
}

fn report_to_dto(report: &PropagationReport) -> ReportDto {
    ReportDto {
        passes: report.passes,
        hosts: report.hosts,
        created: report.created,
        updated: report.updated,
        adopted: report.adopted,
        unchanged: report.unchanged,
        edges_written: report.edges_written,
        deleted: report.deleted,
        detached: report.detached,
    }
}

/// 绑定一份内存存储的命令执行器。
pub struct Runner {
    store: Arc<InMemoryConfigStore>,
    engine: TemplateInheritance,
    checker: RolePermissionChecker,
}

impl Runner {
    pub fn new(store: Arc<InMemoryConfigStore>, limits: DependencyLimits) -> Self {
        let engine = TemplateInheritance::new(store.clone()).with_limits(limits);
        Self {
            store,
            engine,
            checker: RolePermissionChecker::new(),
        }
    }

    pub fn store(&self) -> &InMemoryConfigStore {
        &self.store
    }

    pub async fn execute(
        &self,
        ctx: &SyncContext,
        command: Command,
    ) -> Result<CommandOutput, CliError> {
        match command {
            Command::Sync { templates, hosts } => {
                let templates = required_ids(&templates, "templates")?;
                let hosts = match hosts {
                    Some(hosts) => required_ids(&hosts, "hosts")?,
                    None => self.linked_hosts(&templates),
                };
                self.ensure_writable(ctx, self.write_scope(&hosts)).await?;
                let mut added = Vec::new();
                for template_id in &templates {
                    for host_id in &hosts {
                        if !self.is_linked(template_id, host_id) {
                            self.store.link_template(template_id, host_id)?;
                            added.push((template_id, host_id));
                        }
                    }
                }
                // 级联失败时撤销本次新建的链接，存储回到命令执行前的状态。
                let report = match self
                    .engine
                    .sync_template_linkage(ctx, &templates, &hosts)
                    .await
                {
                    Ok(report) => report,
                    Err(err) => {
                        for (template_id, host_id) in added {
                            self.store.unlink_template(template_id, host_id)?;
                        }
                        return Err(err.into());
                    }
                };
                Ok(self.sync_output(ctx, "sync", &report))
            }
            Command::Propagate {
                kind,
                templates,
                hosts,
            } => {
                let templates = required_ids(&templates, "templates")?;
                let target = hosts.map(|hosts| split_ids(&hosts));
                let scope = match &target {
                    Some(hosts) => self.write_scope(hosts),
                    None => {
                        let mut scope = self.write_scope(&templates);
                        scope.retain(|host_id| !templates.contains(host_id));
                        scope
                    }
                };
                self.ensure_writable(ctx, scope).await?;
                let report = match kind {
                    PropagateKind::Items => {
                        let parents = self.parents::<Item>(&templates);
                        self.engine.propagate_items(ctx, parents, target).await?
                    }
                    PropagateKind::Triggers => {
                        let parents = self.parents::<Trigger>(&templates);
                        self.engine.propagate_triggers(ctx, parents, target).await?
                    }
                    PropagateKind::HostPrototypes => {
                        let parents = self.parents::<HostPrototype>(&templates);
                        self.engine
                            .propagate_host_prototypes(ctx, parents, target)
                            .await?
                    }
                };
                Ok(self.sync_output(ctx, "propagate", &report))
            }
            Command::Validate { kind, owners } => {
                let owners = required_ids(&owners, "owners")?;
                let checked = match kind {
                    ValidateKind::Items => {
                        let batch = self.owned_by::<Item>(&owners);
                        self.engine.validate_item_dependencies(ctx, &batch).await?;
                        batch.len()
                    }
                    ValidateKind::Triggers => {
                        let batch = self.owned_by::<Trigger>(&owners);
                        self.engine
                            .validate_trigger_dependencies(ctx, &batch)
                            .await?;
                        batch.len()
                    }
                };
                info!(
                    target: "tmpl.sync",
                    request_id = %ctx.request_id,
                    kind = ?kind,
                    checked,
                    "dependencies valid"
                );
                Ok(CommandOutput::Validation(ValidationResultDto {
                    request_id: ctx.request_id.clone(),
                    kind: match kind {
                        ValidateKind::Items => "items".to_string(),
                        ValidateKind::Triggers => "triggers".to_string(),
                    },
                    checked,
                }))
            }
            Command::Unlink {
                templates,
                hosts,
                clear,
            } => {
                let templates = required_ids(&templates, "templates")?;
                let hosts = required_ids(&hosts, "hosts")?;
                self.ensure_writable(ctx, self.write_scope(&hosts)).await?;
                let report = self
                    .engine
                    .unlink_templates(ctx, &templates, &hosts, clear)
                    .await?;
                for template_id in &templates {
                    for host_id in &hosts {
                        self.store.unlink_template(template_id, host_id)?;
                    }
                }
                Ok(self.sync_output(ctx, "unlink", &report))
            }
        }
    }

    fn sync_output(
        &self,
        ctx: &SyncContext,
        operation: &str,
        report: &PropagationReport,
    ) -> CommandOutput {
        info!(
            target: "tmpl.sync",
            request_id = %ctx.request_id,
            operation,
            writes = report.writes(),
            "command finished"
        );
        CommandOutput::Sync(SyncResultDto {
            request_id: ctx.request_id.clone(),
            operation: operation.to_string(),
            report: report_to_dto(report),
            snapshot: snapshot::export(&self.store),
        })
    }

    async fn ensure_writable(
        &self,
        ctx: &SyncContext,
        owners: Vec<HostId>,
    ) -> Result<(), CliError> {
        if owners.is_empty() || self.checker.can_write(ctx, &owners).await? {
            return Ok(());
        }
        Err(InheritError::Permission { owners }.into())
    }

    fn is_linked(&self, template_id: &str, host_id: &str) -> bool {
        self.store
            .links()
            .iter()
            .any(|(template, host)| template == template_id && host == host_id)
    }

    fn linked_hosts(&self, templates: &[HostId]) -> Vec<HostId> {
        let hosts: BTreeSet<HostId> = self
            .store
            .links()
            .into_iter()
            .filter(|(template_id, _)| templates.contains(template_id))
            .map(|(_, host_id)| host_id)
            .collect();
        hosts.into_iter().collect()
    }

    /// `roots` 及其经模板链接可达的全部主机：继承会级联写到这些主机上。
    fn write_scope(&self, roots: &[HostId]) -> Vec<HostId> {
        let links = self.store.links();
        let mut scope: BTreeSet<HostId> = BTreeSet::new();
        let mut stack: Vec<HostId> = roots.to_vec();
        while let Some(current) = stack.pop() {
            if !scope.insert(current.clone()) {
                continue;
            }
            stack.extend(
                links
                    .iter()
                    .filter(|(template_id, _)| *template_id == current)
                    .map(|(_, host_id)| host_id.clone()),
            );
        }
        scope.into_iter().collect()
    }

    fn owned_by<T: StoredObject>(&self, owners: &[HostId]) -> Vec<T> {
        self.store
            .all::<T>()
            .into_iter()
            .filter(|object| owners.iter().any(|owner| owner == object.owner_id()))
            .collect()
    }

    // 已发现对象不作为父对象。
    fn parents<T: StoredObject>(&self, templates: &[HostId]) -> Vec<T> {
        self.owned_by::<T>(templates)
            .into_iter()
            .filter(|object| object.flags() != ObjectFlags::Discovered)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{HostInfo, HostInterface, HostStatus, InterfaceType, ItemType};

    fn store() -> Arc<InMemoryConfigStore> {
        let store = Arc::new(InMemoryConfigStore::new());
        store
            .add_host(HostInfo::new("t1", "Template OS", HostStatus::Template))
            .expect("t1");
        let mut host = HostInfo::new("h1", "web-01", HostStatus::Monitored);
        host.interfaces.push(HostInterface {
            interface_id: "if-h1".to_string(),
            interface_type: InterfaceType::Agent,
            main: true,
        });
        store.add_host(host).expect("h1");
        store
            .add_host(HostInfo::new("h2", "web-02", HostStatus::Monitored))
            .expect("h2");
        store
            .seed(Item::new("t1", "Agent ping", "agent.ping", ItemType::ZabbixAgent))
            .expect("item");
        store
            .seed(Trigger::new(
                "t1",
                "Agent down",
                "{Template OS:agent.ping.nodata(5m)}=1",
            ))
            .expect("trigger");
        store
    }

    fn operator(permissions: &[&str]) -> SyncContext {
        SyncContext::new(
            "req-cli",
            "operator",
            vec!["operator".to_string()],
            permissions.iter().map(|item| item.to_string()).collect(),
        )
    }

    #[test]
    fn split_ids_trims_and_dedups() {
        assert_eq!(split_ids(" h1, h2,,h1 "), vec!["h1".to_string(), "h2".to_string()]);
        assert!(split_ids(" , ").is_empty());
    }

    #[test]
    fn cli_parses_comma_lists_and_flags() {
        let cli = Cli::parse_from(["tmpl-sync", "unlink", "t1,t2", "h1", "--clear"]);
        match cli.command {
            Command::Unlink {
                templates,
                hosts,
                clear,
            } => {
                assert_eq!(split_ids(&templates).len(), 2);
                assert_eq!(hosts, "h1");
                assert!(clear);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        let cli = Cli::parse_from(["tmpl-sync", "propagate", "host-prototypes", "t1"]);
        assert!(matches!(
            cli.command,
            Command::Propagate {
                kind: PropagateKind::HostPrototypes,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn sync_links_and_copies_objects() {
        let runner = Runner::new(store(), DependencyLimits::default());
        let output = runner
            .execute(
                &SyncContext::system("req-cli"),
                Command::Sync {
                    templates: "t1".to_string(),
                    hosts: Some("h1".to_string()),
                },
            )
            .await
            .expect("sync");
        let CommandOutput::Sync(result) = output else {
            panic!("expected sync output");
        };
        assert_eq!(result.report.created, 2);
        assert!(result
            .snapshot
            .links
            .iter()
            .any(|link| link.template_id == "t1" && link.host_id == "h1"));
        assert!(result
            .snapshot
            .triggers
            .iter()
            .any(|trigger| trigger.expression == "{web-01:agent.ping.nodata(5m)}=1"));
    }

    #[tokio::test]
    async fn failed_sync_removes_new_links() {
        let runner = Runner::new(store(), DependencyLimits::default());
        let err = runner
            .execute(
                &SyncContext::system("req-cli"),
                Command::Sync {
                    templates: "t1".to_string(),
                    hosts: Some("h2".to_string()),
                },
            )
            .await
            .expect_err("h2 has no agent interface");
        assert_eq!(err.code(), "INHERIT.NO_INTERFACE");
        assert!(runner.store().links().is_empty());
        assert!(runner
            .store()
            .all::<Item>()
            .iter()
            .all(|item| item.host_id == "t1"));
    }

    #[tokio::test]
    async fn missing_write_permission_is_rejected() {
        let runner = Runner::new(store(), DependencyLimits::default());
        let err = runner
            .execute(
                &operator(&["HOST.WRITE:h2"]),
                Command::Sync {
                    templates: "t1".to_string(),
                    hosts: Some("h1".to_string()),
                },
            )
            .await
            .expect_err("permission");
        assert_eq!(err.code(), "INHERIT.PERMISSION");
        assert!(runner.store().links().is_empty());

        runner
            .execute(
                &operator(&["HOST.WRITE:h1"]),
                Command::Sync {
                    templates: "t1".to_string(),
                    hosts: Some("h1".to_string()),
                },
            )
            .await
            .expect("permitted");
    }

    #[tokio::test]
    async fn unlink_with_clear_removes_children_and_link() {
        let runner = Runner::new(store(), DependencyLimits::default());
        let ctx = SyncContext::system("req-cli");
        runner
            .execute(
                &ctx,
                Command::Sync {
                    templates: "t1".to_string(),
                    hosts: Some("h1".to_string()),
                },
            )
            .await
            .expect("sync");

        let output = runner
            .execute(
                &ctx,
                Command::Unlink {
                    templates: "t1".to_string(),
                    hosts: "h1".to_string(),
                    clear: true,
                },
            )
            .await
            .expect("unlink");
        let CommandOutput::Sync(result) = output else {
            panic!("expected sync output");
        };
        assert_eq!(result.report.deleted, 2);
        assert!(result.snapshot.links.is_empty());
        assert!(result.snapshot.items.iter().all(|item| item.host_id == "t1"));
    }

    #[tokio::test]
    async fn validate_counts_checked_objects() {
        let runner = Runner::new(store(), DependencyLimits::default());
        let output = runner
            .execute(
                &SyncContext::system("req-cli"),
                Command::Validate {
                    kind: ValidateKind::Items,
                    owners: "t1".to_string(),
                },
            )
            .await
            .expect("validate");
        let CommandOutput::Validation(result) = output else {
            panic!("expected validation output");
        };
        assert_eq!(result.checked, 1);
        assert_eq!(result.kind, "items");
    }

    #[tokio::test]
    async fn empty_template_list_is_an_argument_error() {
        let runner = Runner::new(store(), DependencyLimits::default());
        let err = runner
            .execute(
                &SyncContext::system("req-cli"),
                Command::Propagate {
                    kind: PropagateKind::Items,
                    templates: " , ".to_string(),
                    hosts: None,
                },
            )
            .await
            .expect_err("no templates");
        assert_eq!(err.code(), "INVALID.REQUEST");
    }
}
