//! Xecutor - 单指令驱动的任务路由编排器
//!
//! 入口：解析命令行、初始化日志、按配置装配编排器，执行一条指令并输出完整轨迹。

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use xecutor::{config::load_config, observability, OrchestratorBuilder, RunReport};

/// Classify an instruction, author a post and publish it
#[derive(Parser, Debug)]
#[command(name = "xecutor")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Natural-language instruction, e.g. "write a bull post about Aptos and tweet it"
    instruction: String,

    /// Specify alternate configuration file
    #[arg(long, value_name = "PATH", env = "XECUTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Override the step ceiling from the configuration
    #[arg(long, value_name = "N")]
    max_steps: Option<usize>,

    /// Print the trace as JSON
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn print_report(report: &RunReport, json: bool) -> anyhow::Result<()> {
    if json {
        let out = serde_json::json!({
            "runId": report.run_id,
            "path": report.path,
            "stepCount": report.step_count,
            "intentFlags": report.intent_flags,
            "trace": report.trace(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&out).context("Failed to serialize trace")?
        );
    } else {
        for entry in report.trace() {
            println!("{}: {}", entry.role, entry.content);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    observability::init(cli.json_logs);

    let cfg = load_config(cli.config.clone()).context("Failed to load configuration")?;
    let mut builder =
        OrchestratorBuilder::from_config(&cfg).context("Failed to configure capabilities")?;
    if let Some(max_steps) = cli.max_steps {
        builder = builder.max_steps(max_steps);
    }
    let executor = builder.build().context("Failed to build orchestrator")?;

    // Ctrl-C 在节点之间生效
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current node");
            on_signal.cancel();
        }
    });

    match executor.invoke_with_cancel(&cli.instruction, cancel).await {
        Ok(report) => print_report(&report, cli.json),
        Err(aborted) => {
            print_report(&aborted.report, cli.json)?;
            Err(aborted.error).context("Invocation aborted")
        }
    }
}
