//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `MUSE__*` 覆盖（双下划线表示嵌套，如 `MUSE__LLM__PROVIDER=mock`）。
//! 每个字段都有默认值，空配置也是合法配置。

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::{AgentConfig, AgentError};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub image: ImageSection,
    pub agents: AgentsSection,
    pub workflow: WorkflowSection,
    pub storage: StorageSection,
    pub analytics: AnalyticsSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "muse".to_string(),
        }
    }
}

/// [llm] 段：文本生成后端
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：groq / openai / mock
    pub provider: String,
    pub base_url: Option<String>,
    /// 读取 API Key 的环境变量名；为空时按 provider 取默认（GROQ_API_KEY / OPENAI_API_KEY）
    pub api_key_env: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "groq".to_string(),
            base_url: None,
            api_key_env: None,
        }
    }
}

/// [image] 段：图像生成后端与输出目录
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ImageSection {
    /// 后端：openai / mock
    pub provider: String,
    pub model: String,
    pub size: String,
    pub base_url: Option<String>,
    pub api_key_env: Option<String>,
    pub output_dir: PathBuf,
}

impl Default for ImageSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "dall-e-3".to_string(),
            size: "1024x1024".to_string(),
            base_url: None,
            api_key_env: None,
            output_dir: PathBuf::from("output/images"),
        }
    }
}

/// [agents] 段：所有 Agent 共用的默认参数 + 按 key 覆盖
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentsSection {
    pub defaults: AgentConfig,
    /// `[agents.overrides.content_writer]` 等；未出现的字段沿用 defaults
    pub overrides: BTreeMap<String, AgentOverride>,
}

/// 单个 Agent 的部分覆盖
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentOverride {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<f64>,
    pub retry_count: Option<u32>,
    pub retry_delay_secs: Option<f64>,
}

impl AgentsSection {
    /// 合并 defaults 与该 key 的覆盖项
    pub fn config_for(&self, key: &str) -> AgentConfig {
        let mut cfg = self.defaults.clone();
        if let Some(o) = self.overrides.get(key) {
            if let Some(model) = &o.model {
                cfg.model = model.clone();
            }
            if let Some(v) = o.temperature {
                cfg.temperature = v;
            }
            if let Some(v) = o.max_tokens {
                cfg.max_tokens = v;
            }
            if let Some(v) = o.timeout_secs {
                cfg.timeout_secs = v;
            }
            if let Some(v) = o.retry_count {
                cfg.retry_count = v;
            }
            if let Some(v) = o.retry_delay_secs {
                cfg.retry_delay_secs = v;
            }
        }
        cfg
    }

    /// 校验 defaults 与每个覆盖项合并后的配置
    pub fn validate(&self) -> Result<(), AgentError> {
        self.defaults.validate()?;
        for key in self.overrides.keys() {
            self.config_for(key)
                .validate()
                .map_err(|e| AgentError::Configuration(format!("agents.overrides.{key}: {e}")))?;
        }
        Ok(())
    }
}

/// [workflow] 段：批处理采样、并发与健康阈值
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkflowSection {
    /// 内容创作阶段从日历中取前 N 条
    pub content_sample_size: usize,
    /// 视觉阶段从内容中取前 N 条
    pub visual_sample_size: usize,
    pub batch_concurrency: usize,
    /// 所有 Agent 成功率都严格大于该值时系统为 healthy
    pub health_threshold: f64,
    pub generate_images: bool,
}

impl Default for WorkflowSection {
    fn default() -> Self {
        Self {
            content_sample_size: 5,
            visual_sample_size: 3,
            batch_concurrency: 3,
            health_threshold: 0.8,
            generate_images: true,
        }
    }
}

/// [storage] 段：活动持久化（SQLite）
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageSection {
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("marketing_agent.db"),
        }
    }
}

/// [analytics] 段：内容表现分析（默认关闭）
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalyticsSection {
    pub enabled: bool,
    /// 计算表现基准时最多参考的同类活动数
    pub similar_campaigns_limit: usize,
}

impl Default for AnalyticsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            similar_campaigns_limit: 5,
        }
    }
}

/// 从 config 目录加载配置，环境变量 MUSE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 MUSE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("MUSE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    let cfg: AppConfig = c.try_deserialize()?;
    cfg.agents
        .validate()
        .map_err(|e| config::ConfigError::Message(e.to_string()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.llm.provider, "groq");
        assert_eq!(cfg.workflow.content_sample_size, 5);
        assert_eq!(cfg.workflow.visual_sample_size, 3);
        assert_eq!(cfg.workflow.health_threshold, 0.8);
        assert_eq!(cfg.agents.defaults.retry_count, 3);
        assert_eq!(cfg.image.size, "1024x1024");
        assert!(!cfg.analytics.enabled);
        assert_eq!(cfg.analytics.similar_campaigns_limit, 5);
    }

    #[test]
    fn test_overrides_apply_per_key() {
        let mut agents = AgentsSection::default();
        agents.overrides.insert(
            "content_writer".into(),
            AgentOverride {
                temperature: Some(0.9),
                retry_count: Some(1),
                ..AgentOverride::default()
            },
        );
        let writer = agents.config_for("content_writer");
        assert_eq!(writer.temperature, 0.9);
        assert_eq!(writer.retry_count, 1);
        assert_eq!(writer.max_tokens, 2000);
        assert_eq!(agents.config_for("trend_analysis"), AgentConfig::default());
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("muse.toml");
        std::fs::write(
            &path,
            r#"
[llm]
provider = "mock"

[workflow]
content_sample_size = 2

[agents.overrides.trend_analysis]
timeout_secs = 5.0
"#,
        )
        .unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.llm.provider, "mock");
        assert_eq!(cfg.workflow.content_sample_size, 2);
        assert_eq!(cfg.workflow.visual_sample_size, 3);
        assert_eq!(cfg.agents.config_for("trend_analysis").timeout_secs, 5.0);
    }

    #[test]
    fn test_non_finite_timeout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("muse.toml");
        std::fs::write(
            &path,
            r#"
[agents.overrides.content_writer]
timeout_secs = inf
"#,
        )
        .unwrap();

        let err = load_config(Some(path)).unwrap_err();
        assert!(err.to_string().contains("agents.overrides.content_writer"));

        let mut agents = AgentsSection::default();
        agents.defaults.retry_delay_secs = -1.0;
        assert!(matches!(agents.validate(), Err(AgentError::Configuration(_))));
    }
}
