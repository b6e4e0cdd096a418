//! OpenAI 兼容 API 客户端
//!
//! 文本：通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url；Groq、OpenAI、自建代理等）。
//! 图像：直接用 reqwest 调用 `/images/generations`，取返回的第一张图片 URL。

use std::sync::atomic::{AtomicU64, Ordering};

use async_openai::config::OpenAIConfig;
use async_openai::error::{ApiError, OpenAIError};
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use serde::Deserialize;

use crate::llm::{GenerationRequest, ImageGenerator, LlmError, TextGenerator, TokenUsage};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// 并发安全的 token 累加器
#[derive(Debug, Default)]
pub(crate) struct UsageCounter {
    prompt: AtomicU64,
    completion: AtomicU64,
}

impl UsageCounter {
    pub(crate) fn add(&self, prompt: u64, completion: u64) {
        self.prompt.fetch_add(prompt, Ordering::Relaxed);
        self.completion.fetch_add(completion, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> TokenUsage {
        let prompt_tokens = self.prompt.load(Ordering::Relaxed);
        let completion_tokens = self.completion.load(Ordering::Relaxed);
        TokenUsage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// OpenAI 兼容文本客户端；模型、温度、最大 token 由每次请求携带
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    usage: UsageCounter,
}

impl OpenAiClient {
    /// api_key 由调用方在构造期解析好（缺失属于配置错误，不在这里兜底）
    pub fn new(base_url: Option<&str>, api_key: &str) -> Self {
        let config = match base_url {
            Some(url) => OpenAIConfig::new().with_api_base(url).with_api_key(api_key),
            None => OpenAIConfig::new().with_api_key(api_key),
        };

        Self {
            client: Client::with_config(config),
            usage: UsageCounter::default(),
        }
    }
}

/// 限流按 API 错误对象的 code / type 判断（OpenAI: rate_limit_exceeded，Groq: tokens / requests）
fn is_rate_limit(err: &ApiError) -> bool {
    let code = err.code.as_deref().unwrap_or_default();
    let kind = err.r#type.as_deref().unwrap_or_default();
    code == "rate_limit_exceeded" || kind.contains("rate_limit") || kind == "tokens" || kind == "requests"
}

fn map_openai_error(err: OpenAIError) -> LlmError {
    match err {
        OpenAIError::Reqwest(e) => LlmError::Network(e.to_string()),
        OpenAIError::JSONDeserialize(..) => LlmError::MalformedResponse(err.to_string()),
        OpenAIError::ApiError(api) if is_rate_limit(&api) => {
            LlmError::RateLimited { retry_after_ms: 1000 }
        }
        other => LlmError::Api(other.to_string()),
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    fn token_usage(&self) -> TokenUsage {
        self.usage.snapshot()
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(request.prompt.clone())
            .build()
            .map_err(|e| LlmError::Api(e.to_string()))?;

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&request.model)
            .messages(vec![ChatCompletionRequestMessage::User(message)])
            .temperature(request.temperature)
            .max_completion_tokens(request.max_tokens)
            .build()
            .map_err(|e| LlmError::Api(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(map_openai_error)?;

        // 提取 token 使用统计
        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| LlmError::MalformedResponse("response has no message content".into()))
    }
}

/// OpenAI 图像生成客户端（DALL·E 兼容接口）
pub struct OpenAiImageClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    url: Option<String>,
}

impl OpenAiImageClient {
    pub fn new(base_url: Option<&str>, api_key: &str, model: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.unwrap_or(OPENAI_BASE_URL).trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImageClient {
    async fn generate_image(&self, prompt: &str, size: &str) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "size": size,
            "n": 1,
        });

        let response = self
            .http
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(1000);
            return Err(LlmError::RateLimited { retry_after_ms });
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("{status}: {text}")));
        }

        let parsed: ImagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        parsed
            .data
            .into_iter()
            .find_map(|d| d.url)
            .ok_or_else(|| LlmError::MalformedResponse("image response has no url".into()))
    }
}
