//! Groq API 客户端（OpenAI 兼容格式）
//!
//! Groq 提供与 OpenAI 兼容的 Chat Completions 接口。
//! - Base URL: https://api.groq.com/openai/v1
//! - 默认模型: deepseek-r1-distill-llama-70b（输出带 <think> 段，由解析层清洗）

use crate::llm::OpenAiClient;

/// Groq API 常量
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const GROQ_DEFAULT_MODEL: &str = "deepseek-r1-distill-llama-70b";
pub const GROQ_API_KEY_ENV: &str = "GROQ_API_KEY";

/// 创建 Groq 客户端；base_url 为空时使用官方端点
pub fn create_groq_client(api_key: &str, base_url: Option<&str>) -> OpenAiClient {
    OpenAiClient::new(Some(base_url.unwrap_or(GROQ_BASE_URL)), api_key)
}
