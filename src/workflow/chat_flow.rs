//! 追问流程
//!
//! 流程顺序：
//! 1. 追加用户消息
//! 2. 带完整上下文和历史（包括刚追加的消息）调用 AI 网关
//! 3. 追加助手回复
//!
//! 第 1 步在网络调用之前就修改了共享状态，所以同一讨论同时只允许一个发送，
//! 后来的发送按顺序排队

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{error, info};

use crate::error::{AppResult, PreconditionError};
use crate::models::{ChatMessage, ChatRole};
use crate::services::{AiGateway, ChatContext};
use crate::store::{DiscussionStore, QuestionStore};

pub struct ChatFlow {
    gateway: Arc<AiGateway>,
    questions: Arc<QuestionStore>,
    discussions: Arc<DiscussionStore>,
    /// 每个讨论一把异步锁（按答案 id），公平锁保证先到先发；
    /// 没有发送在进行或排队时条目会被移除
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ChatFlow {
    pub fn new(
        gateway: Arc<AiGateway>,
        questions: Arc<QuestionStore>,
        discussions: Arc<DiscussionStore>,
    ) -> Self {
        Self {
            gateway,
            questions,
            discussions,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// 发送一条追问，返回助手的回复消息
    pub async fn send(&self, answer_id: &str, text: &str) -> AppResult<ChatMessage> {
        let lock = self.lock_for(answer_id);
        let result = {
            let _permit = lock.lock().await;
            self.send_locked(answer_id, text).await
        };
        self.release(answer_id, lock);
        result
    }

    async fn send_locked(&self, answer_id: &str, text: &str) -> AppResult<ChatMessage> {
        if self.discussions.get_discussion(answer_id).is_none() {
            return Err(PreconditionError::DiscussionNotFound(answer_id.to_string()).into());
        }
        let answer = self
            .questions
            .get_answer_by_id(answer_id)
            .ok_or_else(|| PreconditionError::AnswerNotFound(answer_id.to_string()))?;
        let version = self
            .questions
            .get_question_version_by_version_id(&answer.question_version_id)
            .ok_or_else(|| PreconditionError::VersionNotFound(answer.question_version_id.clone()))?;

        self.discussions
            .append_message(answer_id, text, ChatRole::User)?;
        let history = self
            .discussions
            .get_discussion(answer_id)
            .map(|d| d.messages)
            .unwrap_or_default();

        info!("💬 [追问] 答案 {} | 历史消息数: {}", answer_id, history.len());

        let context = ChatContext {
            question: &version.question,
            reference_answer: &version.answer,
            user_answer: &answer.text,
            feedback: answer.feedback.as_deref(),
        };
        let reply = match self.gateway.chat(context, &history).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("❌ [追问] 失败: {}", e);
                self.questions.set_error(Some(e.to_string()));
                return Err(e.into());
            }
        };

        let message = self
            .discussions
            .append_message(answer_id, reply, ChatRole::Assistant)?;
        info!("✓ [追问] 已追加回复 {}", message.id);
        Ok(message)
    }

    fn lock_for(&self, answer_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(answer_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// 只剩表里和调用方两个引用时，说明没有其他发送在等待，移除条目
    fn release(&self, answer_id: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if Arc::strong_count(&lock) == 2 {
            locks.remove(answer_id);
        }
    }

    #[cfg(test)]
    fn tracked_discussions(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
