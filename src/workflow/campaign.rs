//! 六阶段营销活动
//!
//! trend_analysis → content_strategy → content_creation（批处理）→ visual_assets（批处理）
//! → social_media → client_briefing。阶段严格串行，批处理阶段内的子任务并发。
//! 单个 Agent 的失败只体现为状态中的标记与阶段记录的 succeeded = false，不会中断活动。

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::agents::{
    CLIENT_BRIEFING, CONTENT_STRATEGY, CONTENT_WRITER, IMAGE_GENERATION, SOCIAL_MEDIA,
    TREND_ANALYSIS, VISUAL_SUGGESTION,
};
use crate::config::WorkflowSection;
use crate::core::state::{map, Value};
use crate::core::{
    AgentMetricsReport, AgentRegistry, BatchScheduler, ManagedAgent, RunOutcome, WorkflowState,
};
use crate::workflow::engine::{resolve_agents, run_batch, run_phase};
use crate::workflow::types::{seconds_between, PhaseRecord, WorkflowError, WorkflowSummary};

pub const PHASE_CONTENT_CREATION: &str = "content_creation";
pub const PHASE_VISUAL_ASSETS: &str = "visual_assets";

/// 活动各阶段执行完毕后的结果
pub struct CampaignOutcome {
    pub final_state: WorkflowState,
    pub phases: Vec<PhaseRecord>,
}

pub struct CampaignRunner<'a> {
    registry: &'a AgentRegistry,
    scheduler: &'a BatchScheduler,
    settings: &'a WorkflowSection,
}

/// 批处理子任务的结果
enum ItemResult {
    Done(Value),
    Failed { id: String, reason: String },
}

impl ItemResult {
    fn outcome(&self) -> RunOutcome {
        match self {
            ItemResult::Done(_) => RunOutcome::Completed,
            ItemResult::Failed { .. } => RunOutcome::Failed,
        }
    }
}

struct CampaignAgents {
    trend: Arc<ManagedAgent>,
    strategy: Arc<ManagedAgent>,
    writer: Arc<ManagedAgent>,
    visual: Arc<ManagedAgent>,
    image: Option<Arc<ManagedAgent>>,
    social: Arc<ManagedAgent>,
    briefing: Arc<ManagedAgent>,
}

impl<'a> CampaignRunner<'a> {
    pub fn new(
        registry: &'a AgentRegistry,
        scheduler: &'a BatchScheduler,
        settings: &'a WorkflowSection,
    ) -> Self {
        Self {
            registry,
            scheduler,
            settings,
        }
    }

    fn agents(&self) -> Result<CampaignAgents, WorkflowError> {
        let mut keys = vec![
            TREND_ANALYSIS,
            CONTENT_STRATEGY,
            CONTENT_WRITER,
            VISUAL_SUGGESTION,
            SOCIAL_MEDIA,
            CLIENT_BRIEFING,
        ];
        if self.settings.generate_images {
            keys.push(IMAGE_GENERATION);
        }
        let mut resolved = resolve_agents(self.registry, &keys)?.into_iter();
        let mut next = || {
            resolved
                .next()
                .ok_or_else(|| WorkflowError::InvalidConfiguration("agent list changed".into()))
        };
        Ok(CampaignAgents {
            trend: next()?,
            strategy: next()?,
            writer: next()?,
            visual: next()?,
            social: next()?,
            briefing: next()?,
            image: if self.settings.generate_images {
                Some(next()?)
            } else {
                None
            },
        })
    }

    /// 依次执行六个阶段；只有缺少 Agent 时返回错误（此时不运行任何阶段）
    pub async fn run(&self, initial: WorkflowState) -> Result<CampaignOutcome, WorkflowError> {
        let agents = self.agents()?;
        let mut phases = Vec::with_capacity(6);

        tracing::info!(phase = 1, "campaign phase: trend analysis");
        let (trend_out, record) = run_phase(TREND_ANALYSIS, &agents.trend, &initial).await;
        phases.push(record);

        tracing::info!(phase = 2, "campaign phase: content strategy");
        let (strategy_out, record) = run_phase(CONTENT_STRATEGY, &agents.strategy, &trend_out).await;
        phases.push(record);

        tracing::info!(phase = 3, "campaign phase: content creation");
        let (content_out, record) = self.content_creation(&agents.writer, &strategy_out).await;
        phases.push(record);

        tracing::info!(phase = 4, "campaign phase: visual assets");
        let (visual_out, record) = self
            .visual_assets(&agents.visual, agents.image.as_deref(), &content_out)
            .await;
        phases.push(record);

        tracing::info!(phase = 5, "campaign phase: social media");
        let (social_out, record) = run_phase(SOCIAL_MEDIA, &agents.social, &visual_out).await;
        phases.push(record);

        tracing::info!(phase = 6, "campaign phase: client briefing");
        let (final_state, record) = run_phase(CLIENT_BRIEFING, &agents.briefing, &social_out).await;
        phases.push(record);

        Ok(CampaignOutcome { final_state, phases })
    }

    /// 日历前 N 条，每条交给文案 Agent；结果按 day 记录
    async fn content_creation(
        &self,
        writer: &ManagedAgent,
        input: &WorkflowState,
    ) -> (WorkflowState, PhaseRecord) {
        let started_at = Utc::now();
        let calendar: Vec<Value> = input.get_list("content_calendar").unwrap_or_default().to_vec();
        let planned = calendar.len();
        let topic = input.get_text("topic").unwrap_or_default().to_string();

        let results = run_batch(
            self.scheduler,
            calendar.into_iter().take(self.settings.content_sample_size).enumerate(),
            |(i, entry)| {
                let topic = topic.clone();
                async move {
                    let day = entry
                        .field_text("day")
                        .map(String::from)
                        .unwrap_or_else(|| (i + 1).to_string());
                    let field = |k: &str, default: &str| {
                        entry.field_text(k).filter(|v| !v.is_empty()).unwrap_or(default).to_string()
                    };
                    let idea = entry
                        .field_text("description")
                        .filter(|v| !v.is_empty())
                        .or_else(|| entry.field_text("theme").filter(|v| !v.is_empty()))
                        .unwrap_or(topic.as_str())
                        .to_string();
                    let platform = field("platform", "instagram");
                    let theme = field("theme", "general");
                    let content_type = field("type", "post");

                    let sub = input
                        .clone()
                        .with("selected_idea", idea.as_str())
                        .with("theme", theme.as_str())
                        .with("platform", platform.as_str())
                        .with("content_type", content_type.as_str())
                        .with("day", day.as_str());

                    match writer.try_run_outcome(&sub).await {
                        Ok((out, RunOutcome::Skipped)) => ItemResult::Failed {
                            id: day,
                            reason: out
                                .get_text(&format!("{CONTENT_WRITER}_skipped"))
                                .unwrap_or("skipped")
                                .to_string(),
                        },
                        Ok((out, _)) => ItemResult::Done(map([
                            ("day", Value::from(day)),
                            ("idea", Value::from(idea)),
                            ("content", Value::from(out.get_text("final_content").unwrap_or_default())),
                            ("platform", Value::from(platform)),
                            ("theme", Value::from(theme)),
                            ("content_type", Value::from(content_type)),
                        ])),
                        Err(e) => ItemResult::Failed {
                            id: day,
                            reason: e.to_string(),
                        },
                    }
                }
            },
        )
        .await;

        let outcomes = batch_outcomes(&results);
        let (pieces, failed) = split_results(results);
        tracing::info!(created = pieces.len(), failed = failed.len(), planned, "content batch done");

        let mut output = input
            .clone()
            .with("content_created", pieces.len())
            .with("content_planned", planned)
            .with("content", pieces)
            .with("content_failed_items", failed.clone());
        if planned == 0 {
            output.mark_skipped(PHASE_CONTENT_CREATION, "missing required field(s): content_calendar");
        } else if !failed.is_empty() {
            output.mark_error(
                PHASE_CONTENT_CREATION,
                "Content Creation Phase",
                &format!("{} content item(s) failed", failed.len()),
            );
        }

        let record = batch_record(
            PHASE_CONTENT_CREATION,
            started_at,
            &output,
            &outcomes,
            vec![writer.metrics_report()],
        );
        (output, record)
    }

    /// 内容前 N 条：视觉建议，然后（开启时）按第一条提示词生成图片
    async fn visual_assets(
        &self,
        visual: &ManagedAgent,
        image: Option<&ManagedAgent>,
        input: &WorkflowState,
    ) -> (WorkflowState, PhaseRecord) {
        let started_at = Utc::now();
        let pieces: Vec<Value> = input.get_list("content").unwrap_or_default().to_vec();

        let results = run_batch(
            self.scheduler,
            pieces.into_iter().take(self.settings.visual_sample_size),
            |piece| async move {
                let id = piece.field_text("day").unwrap_or_default().to_string();
                let content = piece.field_text("content").unwrap_or_default().to_string();
                let sub = input
                    .clone()
                    .with("final_content", content)
                    .with("content_type", "social_media_post");

                let suggested = match visual.try_run_outcome(&sub).await {
                    Ok((_, RunOutcome::Skipped)) => {
                        return ItemResult::Failed {
                            id,
                            reason: "no content to illustrate".to_string(),
                        }
                    }
                    Ok((out, _)) => out,
                    Err(e) => {
                        return ItemResult::Failed {
                            id,
                            reason: e.to_string(),
                        }
                    }
                };

                let mut entry = vec![
                    ("content_id", Value::from(id.as_str())),
                    (
                        "visual_prompt",
                        Value::from(suggested.get_text("image_prompt").unwrap_or_default()),
                    ),
                    (
                        "suggestions",
                        suggested
                            .get("visual_suggestions")
                            .cloned()
                            .unwrap_or(Value::List(Vec::new())),
                    ),
                ];

                if let Some(image) = image.filter(|_| suggested.has_value("image_prompt")) {
                    match image.try_run(&suggested).await {
                        Ok(out) => {
                            for key in ["image_path", "image_url", "image_error"] {
                                if let Some(v) = out.get(key) {
                                    entry.push((key, v.clone()));
                                }
                            }
                        }
                        Err(e) => {
                            return ItemResult::Failed {
                                id,
                                reason: format!("image generation failed: {e}"),
                            }
                        }
                    }
                }
                ItemResult::Done(map(entry))
            },
        )
        .await;

        let outcomes = batch_outcomes(&results);
        let (visuals, failed) = split_results(results);
        tracing::info!(created = visuals.len(), failed = failed.len(), "visual batch done");

        let mut output = input
            .clone()
            .with("visuals_created", visuals.len())
            .with("visuals", visuals)
            .with("visual_failed_items", failed.clone());
        if outcomes.is_empty() {
            output.mark_skipped(PHASE_VISUAL_ASSETS, "missing required field(s): content");
        } else if !failed.is_empty() {
            output.mark_error(
                PHASE_VISUAL_ASSETS,
                "Visual Assets Phase",
                &format!("{} visual item(s) failed", failed.len()),
            );
        }

        let mut metrics = vec![visual.metrics_report()];
        if let Some(image) = image {
            metrics.push(image.metrics_report());
        }
        let record = batch_record(PHASE_VISUAL_ASSETS, started_at, &output, &outcomes, metrics);
        (output, record)
    }
}

fn split_results(results: Vec<ItemResult>) -> (Vec<Value>, Vec<Value>) {
    let mut done = Vec::new();
    let mut failed = Vec::new();
    for result in results {
        match result {
            ItemResult::Done(v) => done.push(v),
            ItemResult::Failed { id, reason } => failed.push(map([
                ("id", Value::from(id)),
                ("error", Value::from(reason)),
            ])),
        }
    }
    (done, failed)
}

/// 每个子任务一个终态；空批次没有终态，阶段记为未成功
fn batch_outcomes(results: &[ItemResult]) -> Vec<RunOutcome> {
    results.iter().map(ItemResult::outcome).collect()
}

fn batch_record(
    name: &str,
    started_at: DateTime<Utc>,
    output: &WorkflowState,
    outcomes: &[RunOutcome],
    metrics: Vec<AgentMetricsReport>,
) -> PhaseRecord {
    let succeeded = PhaseRecord::succeeded_from(outcomes);
    tracing::info!(phase = name, succeeded, "phase finished");
    PhaseRecord {
        name: name.to_string(),
        started_at,
        finished_at: Utc::now(),
        output: output.clone(),
        metrics,
        succeeded,
    }
}

/// 汇总：耗时从第一个阶段开始算，成功率 = 成功阶段数 / 阶段总数
pub fn compile_summary(
    phases: &[PhaseRecord],
    final_state: &WorkflowState,
    finished_at: DateTime<Utc>,
) -> Result<(WorkflowSummary, f64), WorkflowError> {
    let first = phases
        .first()
        .ok_or_else(|| WorkflowError::Compilation("no phases were recorded".into()))?;
    let duration = seconds_between(first.started_at, finished_at);

    let total = phases.len();
    let successful = phases.iter().filter(|p| p.succeeded).count();
    let count = |key: &str| final_state.get_number(key).unwrap_or(0.0) as usize;

    let summary = WorkflowSummary {
        total_phases: total,
        successful_phases: successful,
        success_rate: successful as f64 / total as f64,
        content_pieces_created: count("content_created"),
        content_pieces_planned: count("content_planned"),
        visuals_created: count("visuals_created"),
    };
    Ok((summary, duration))
}
