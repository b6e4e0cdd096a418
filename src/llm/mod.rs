//! 生成能力层：文本 / 图像能力抽象与实现（OpenAI 兼容 / Groq / Mock）

pub mod groq;
pub mod mock;
pub mod openai;
pub mod traits;

pub use groq::{create_groq_client, GROQ_API_KEY_ENV, GROQ_BASE_URL, GROQ_DEFAULT_MODEL};
pub use mock::{MockImageGenerator, MockTextGenerator};
pub use openai::{OpenAiClient, OpenAiImageClient, OPENAI_BASE_URL};
pub use traits::{GenerationRequest, ImageGenerator, LlmError, TextGenerator, TokenUsage};
