//! OpenAI 兼容服务的模型调用
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 有输出约定时使用 `response_format = json_schema`（严格模式）

use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ResponseFormat, ResponseFormatJsonSchema,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::infrastructure::llm_backend::{LlmBackend, LlmMessage, LlmRequest, LlmRole};

/// 基于 async-openai 的模型后端
pub struct OpenAiBackend {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl OpenAiBackend {
    /// 创建新的模型后端
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
        }
    }

    fn build_message(message: &LlmMessage) -> Result<ChatCompletionRequestMessage> {
        let built = match message.role {
            LlmRole::System => ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(message.content.as_str())
                    .build()?,
            ),
            LlmRole::User => ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(message.content.as_str())
                    .build()?,
            ),
            LlmRole::Assistant => ChatCompletionRequestMessage::Assistant(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .content(message.content.as_str())
                    .build()?,
            ),
        };
        Ok(built)
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn complete(&self, request: LlmRequest) -> Result<String> {
        debug!(
            "调用 LLM API，模型: {}，消息数: {}",
            self.model_name,
            request.messages.len()
        );

        let messages = request
            .messages
            .iter()
            .map(Self::build_message)
            .collect::<Result<Vec<_>>>()?;

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model_name).messages(messages);

        if let Some(temperature) = request.temperature {
            args.temperature(temperature);
        }

        if let Some(output) = request.output {
            debug!("请求结构化输出: {}", output.name);
            args.response_format(ResponseFormat::JsonSchema {
                json_schema: ResponseFormatJsonSchema {
                    description: None,
                    name: output.name,
                    schema: Some(output.schema),
                    strict: Some(true),
                },
            });
        }

        let response = self
            .client
            .chat()
            .create(args.build()?)
            .await
            .map_err(|e| {
                warn!("LLM API 调用失败: {}", e);
                anyhow::anyhow!("LLM API 调用失败: {}", e)
            })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow::anyhow!("LLM 返回内容为空"))?;

        Ok(content.trim().to_string())
    }
}
