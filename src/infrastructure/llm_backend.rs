//! 外部模型能力边界
//!
//! 网关只依赖 `LlmBackend`，不关心背后是 OpenAI 兼容服务还是测试替身

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LlmMessage {
    pub role: LlmRole,
    pub content: String,
}

impl LlmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: LlmRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: LlmRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: LlmRole::Assistant,
            content: content.into(),
        }
    }
}

/// 期望的结构化输出（schema 名称 + JSON Schema）
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFormat {
    pub name: String,
    pub schema: Value,
}

/// 一次模型调用
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LlmRequest {
    pub messages: Vec<LlmMessage>,
    /// 为 None 时返回自由文本
    pub output: Option<OutputFormat>,
    pub temperature: Option<f32>,
}

impl LlmRequest {
    pub fn new(messages: Vec<LlmMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_output(mut self, output: OutputFormat) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// 外部模型调用能力
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// 发送请求，返回模型输出的原始文本
    async fn complete(&self, request: LlmRequest) -> anyhow::Result<String>;
}
