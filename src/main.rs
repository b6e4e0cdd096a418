//! Muse - 营销内容智能体流水线
//!
//! 入口：初始化日志、加载配置、创建编排器，按子命令执行并以 JSON 输出结果。
//! 只读子命令（status / history / score）不创建生成能力，因此不需要 API Key。

use anyhow::Context;
use clap::Parser;
use muse::cli::{Args, Commands};
use muse::config::{load_config, AppConfig};
use muse::core::{Orchestrator, WorkflowState};
use serde::Serialize;

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    muse::observability::init();

    let args = Args::parse();
    let mut cfg = load_config(args.config.clone()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    args.apply(&mut cfg);

    let orchestrator = if args.command.needs_generators() {
        Orchestrator::from_config(&cfg).context("Failed to create orchestrator")?
    } else {
        Orchestrator::read_only(&cfg)
    };

    match &args.command {
        Commands::Campaign { .. } => {
            let request = args
                .command
                .campaign_request()
                .context("campaign arguments missing")?;
            let record = orchestrator.execute_workflow(request).await;
            print_json(&*record)?;
        }
        Commands::Pipeline { steps, input } => {
            let initial: WorkflowState =
                serde_json::from_str(input).context("--input must be a JSON object")?;
            let record = orchestrator.run_steps(steps.as_slice(), initial).await;
            print_json(&*record)?;
        }
        Commands::Status => print_json(&orchestrator.get_system_status())?,
        Commands::History { limit } => match orchestrator.campaign_history() {
            Some(history) => {
                let history = history.context("Failed to read campaign history")?;
                let recent: Vec<_> = history.into_iter().take(*limit).collect();
                print_json(&recent)?;
            }
            None => anyhow::bail!("campaign persistence is disabled"),
        },
        Commands::Analyze { input } => {
            let state: WorkflowState =
                serde_json::from_str(input).context("--input must be a JSON object")?;
            match orchestrator.analyze_content_performance(&state).await {
                Some(out) => print_json(&out)?,
                None => anyhow::bail!("content analytics is unavailable"),
            }
        }
        Commands::Score { campaign_id, score } => {
            match orchestrator.record_engagement(*campaign_id, *score).await {
                Some(result) => {
                    result.context("Failed to record engagement")?;
                    print_json(&serde_json::json!({ "campaign_id": campaign_id, "engagement_score": score }))?;
                }
                None => anyhow::bail!("campaign persistence is disabled"),
            }
        }
    }

    Ok(())
}
