//! 模板继承同步 CLI：加载 JSON 快照，执行命令，输出 ApiResponse JSON。

mod commands;
mod error;
mod snapshot;

use api_contract::{ApiResponse, SnapshotDto};
use clap::Parser;
use commands::{Cli, CommandOutput, Runner};
use domain::SyncContext;
use error::CliError;
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;
use tmpl_config::AppConfig;
use tmpl_inherit::DependencyLimits;
use tmpl_telemetry::{init_tracing, new_request_ids};
use tracing::{Instrument, warn};

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在）
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 日志写 stderr，stdout 只输出 JSON
    init_tracing();

    let ids = new_request_ids();
    let ctx = SyncContext::new(
        ids.request_id.clone(),
        config.actor.clone(),
        config.roles.clone(),
        config.permissions.clone(),
    );
    let span = tracing::info_span!(
        "tmpl_sync",
        request_id = %ids.request_id,
        trace_id = %ids.trace_id
    );

    let outcome = run(&config, &cli, &ctx).instrument(span).await;
    let (rendered, code) = match outcome {
        Ok(CommandOutput::Sync(result)) => (
            render(&ApiResponse::success(result), config.pretty_output)?,
            ExitCode::SUCCESS,
        ),
        Ok(CommandOutput::Validation(result)) => (
            render(&ApiResponse::success(result), config.pretty_output)?,
            ExitCode::SUCCESS,
        ),
        Err(err) => {
            warn!(
                target: "tmpl.sync",
                request_id = %ids.request_id,
                code = err.code(),
                error = %err,
                "command failed"
            );
            (
                render(
                    &ApiResponse::<()>::error(err.code(), err.to_string()),
                    config.pretty_output,
                )?,
                ExitCode::FAILURE,
            )
        }
    };
    println!("{rendered}");
    Ok(code)
}

async fn run(
    config: &AppConfig,
    cli: &Cli,
    ctx: &SyncContext,
) -> Result<CommandOutput, CliError> {
    let raw = tokio::fs::read_to_string(&config.snapshot_path).await?;
    let dto: SnapshotDto = serde_json::from_str(&raw)?;
    let store = Arc::new(snapshot::load_store(dto)?);
    let limits = DependencyLimits {
        max_depth: config.max_dependency_depth,
        max_count: config.max_dependency_count,
    };
    let runner = Runner::new(store, limits);
    let output = runner.execute(ctx, cli.command.clone()).await?;

    if let (Some(path), true) = (&cli.out, output.writes_snapshot()) {
        let exported = snapshot::export(runner.store());
        tokio::fs::write(path, serde_json::to_string_pretty(&exported)?).await?;
    }
    Ok(output)
}

fn render<T: Serialize>(value: &T, pretty: bool) -> Result<String, serde_json::Error> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
}
