//! 图像生成 Agent：按提示词生成图片，下载后保存到输出目录
//!
//! 生成失败属于外部能力错误（可重试）；下载或写盘失败不重试，
//! 写入 `image_path = "Error: ..."` 与 `image_error`。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::agents::{ImageOptions, IMAGE_GENERATION};
use crate::core::{Agent, AgentConfig, AgentError, StateContract, WorkflowState};
use crate::llm::ImageGenerator;

pub struct ImageGenerationAgent {
    image: Arc<dyn ImageGenerator>,
    http: reqwest::Client,
    options: ImageOptions,
}

impl ImageGenerationAgent {
    pub fn new(image: Arc<dyn ImageGenerator>, options: ImageOptions) -> Self {
        Self {
            image,
            http: reqwest::Client::new(),
            options,
        }
    }

    async fn download(&self, url: &str) -> Result<PathBuf, String> {
        let bytes = self
            .http
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| format!("download failed: {e}"))?
            .bytes()
            .await
            .map_err(|e| format!("download failed: {e}"))?;
        save_image(&bytes, &self.options.output_dir).await
    }
}

/// 写入 `generated_image_<时间戳>_<短 id>.png`，返回文件路径
pub async fn save_image(bytes: &[u8], output_dir: &Path) -> Result<PathBuf, String> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| format!("cannot create {}: {e}", output_dir.display()))?;

    let id = uuid::Uuid::new_v4().simple().to_string();
    let file_name = format!(
        "generated_image_{}_{}.png",
        Utc::now().format("%Y%m%d_%H%M%S"),
        &id[..8]
    );
    let path = output_dir.join(file_name);
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| format!("cannot write {}: {e}", path.display()))?;
    Ok(path)
}

#[async_trait]
impl Agent for ImageGenerationAgent {
    fn key(&self) -> &str {
        IMAGE_GENERATION
    }

    fn name(&self) -> &str {
        "Image Generation Agent"
    }

    fn contract(&self) -> StateContract {
        StateContract::new(&["image_prompt"], &[])
    }

    async fn execute(
        &self,
        state: &WorkflowState,
        _config: &AgentConfig,
    ) -> Result<WorkflowState, AgentError> {
        let prompt = state.get_text("image_prompt").unwrap_or_default();
        let url = self
            .image
            .generate_image(prompt, &self.options.size)
            .await?;

        let mut out = WorkflowState::new().with("image_url", url.as_str());
        match self.download(&url).await {
            Ok(path) => {
                tracing::info!(agent = IMAGE_GENERATION, path = %path.display(), "image saved");
                out.insert("image_path", path.display().to_string());
            }
            Err(e) => {
                tracing::warn!(agent = IMAGE_GENERATION, error = %e, "image not saved");
                out.insert("image_path", format!("Error: {e}"));
                out.insert("image_error", e);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, MockImageGenerator};

    fn options(dir: &Path) -> ImageOptions {
        ImageOptions {
            size: "512x512".into(),
            output_dir: dir.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn test_save_image_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_image(b"png-bytes", &dir.path().join("images")).await.unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("generated_image_"));
        assert_eq!(std::fs::read(&path).unwrap(), b"png-bytes");
    }

    #[tokio::test]
    async fn test_download_failure_becomes_marker() {
        let dir = tempfile::tempdir().unwrap();
        let agent = ImageGenerationAgent::new(
            Arc::new(MockImageGenerator::new("http://127.0.0.1:9/unreachable.png")),
            options(dir.path()),
        );
        let state = WorkflowState::new().with("image_prompt", "a cat");
        let out = agent.execute(&state, &AgentConfig::default()).await.unwrap();
        assert!(out.get_text("image_path").unwrap().starts_with("Error: "));
        assert!(out.contains("image_error"));
        assert_eq!(out.get_text("image_url"), Some("http://127.0.0.1:9/unreachable.png"));
    }

    #[tokio::test]
    async fn test_generation_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let agent = ImageGenerationAgent::new(Arc::new(MockImageGenerator::failing()), options(dir.path()));
        let state = WorkflowState::new().with("image_prompt", "a cat");
        let err = agent.execute(&state, &AgentConfig::default()).await.unwrap_err();
        assert!(matches!(err, AgentError::Capability(LlmError::Api(_))));
    }
}
