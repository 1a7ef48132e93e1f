//! AI 网关 - 业务能力层
//!
//! 只负责"构建提示词 → 调用模型 → 校验结果"，不读写任何状态
//!
//! 三个操作：
//! - `generate`：出题，结构化输出 `question_list_schema`
//! - `grade`：批改，结构化输出 `question_grade_schema`
//! - `chat`：追问对话，自由文本
//!
//! 不做自动重试，失败统一转换为 `GatewayError`

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{GatewayError, GatewayOperation, ValidationError};
use crate::infrastructure::{LlmBackend, LlmMessage, LlmRequest, OutputFormat};
use crate::models::{ChatMessage, Contract, GenerateResult, GradeResult, QuestionResponse};
use crate::services::{prompts, schema_validator};
use crate::utils::logging::truncate_text;

/// 追问对话所需的批改上下文
#[derive(Debug, Clone, Copy)]
pub struct ChatContext<'a> {
    pub question: &'a str,
    pub reference_answer: &'a str,
    pub user_answer: &'a str,
    pub feedback: Option<&'a str>,
}

pub struct AiGateway {
    backend: Arc<dyn LlmBackend>,
    chat_temperature: f32,
}

impl AiGateway {
    pub fn new(backend: Arc<dyn LlmBackend>, config: &Config) -> Self {
        Self {
            backend,
            chat_temperature: config.chat_temperature,
        }
    }

    /// 出题
    ///
    /// 返回的题目数量必须正好是 `count`；知识点覆盖不足只记录警告
    pub async fn generate(
        &self,
        topic: &str,
        count: usize,
        subtopics: &[String],
    ) -> Result<Vec<QuestionResponse>, GatewayError> {
        let op = GatewayOperation::Generate;
        info!("🤖 请求生成 {} 道题目，主题: {}", count, topic);

        let messages = vec![
            LlmMessage::system(prompts::EXAM_GENERATOR_PROMPT),
            LlmMessage::user(prompts::build_generate_message(topic, count, subtopics)),
        ];
        let result: GenerateResult = self.request_structured(op, messages).await?;

        if result.questions.len() != count {
            return Err(GatewayError::validation(
                op,
                ValidationError::single(
                    GenerateResult::NAME,
                    "$.questions",
                    format!("{} items", count),
                    format!("{} items", result.questions.len()),
                ),
            ));
        }

        let missing = uncovered_subtopics(&result.questions, subtopics);
        if !missing.is_empty() {
            warn!("⚠️ 以下子主题没有对应题目: {}", missing.join(", "));
        }

        info!("✓ 生成完成，共 {} 道题目", result.questions.len());
        Ok(result.questions)
    }

    /// 批改答案
    pub async fn grade(
        &self,
        question: &str,
        reference_answer: &str,
        user_answer: &str,
    ) -> Result<GradeResult, GatewayError> {
        info!("📝 请求批改答案: {}", truncate_text(user_answer, 60));

        let messages = vec![
            LlmMessage::system(prompts::EXAM_GENERATOR_PROMPT),
            LlmMessage::user(prompts::build_grade_message(
                question,
                reference_answer,
                user_answer,
            )),
        ];
        let result: GradeResult = self
            .request_structured(GatewayOperation::Grade, messages)
            .await?;

        info!("✓ 批改完成，通过: {}", result.grade.pass);
        Ok(result)
    }

    /// 追问对话，每次都发送完整上下文和全部历史，只返回最新回复
    pub async fn chat(
        &self,
        context: ChatContext<'_>,
        history: &[ChatMessage],
    ) -> Result<String, GatewayError> {
        let op = GatewayOperation::Chat;
        debug!("💬 发送追问，历史消息数: {}", history.len());

        let mut messages = vec![
            LlmMessage::system(prompts::CHAT_TUTOR_PROMPT),
            LlmMessage::assistant(prompts::build_chat_context(
                context.question,
                context.reference_answer,
                context.user_answer,
                context.feedback,
            )),
        ];
        messages.extend(prompts::history_messages(history));

        let request = LlmRequest::new(messages).with_temperature(self.chat_temperature);
        let reply = self
            .backend
            .complete(request)
            .await
            .map_err(|e| GatewayError::transport(op, e))?;

        let reply = reply.trim();
        if reply.is_empty() {
            return Err(GatewayError::transport(
                op,
                anyhow::anyhow!("LLM 返回内容为空"),
            ));
        }

        debug!("✓ 收到回复: {}", truncate_text(reply, 80));
        Ok(reply.to_string())
    }

    async fn request_structured<T: Contract>(
        &self,
        op: GatewayOperation,
        messages: Vec<LlmMessage>,
    ) -> Result<T, GatewayError> {
        let request = LlmRequest::new(messages).with_output(OutputFormat {
            name: T::NAME.to_string(),
            schema: schema_validator::strict_schema::<T>(),
        });

        let raw = self
            .backend
            .complete(request)
            .await
            .map_err(|e| GatewayError::transport(op, e))?;
        debug!("{} 返回 {} 字节", T::NAME, raw.len());

        schema_validator::decode::<T>(&raw).map_err(|e| {
            warn!("⚠️ {} 响应不符合约定: {}", op, e);
            GatewayError::validation(op, e)
        })
    }
}

/// 没有出现在任何题目 topics 中的子主题（不区分大小写）
fn uncovered_subtopics(questions: &[QuestionResponse], subtopics: &[String]) -> Vec<String> {
    subtopics
        .iter()
        .filter(|sub| {
            let needle = sub.to_lowercase();
            !questions
                .iter()
                .flat_map(|q| q.topics.iter())
                .any(|t| t.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}
