//! 出题流程
//!
//! 流程顺序：
//! 1. 校验输入（主题、子主题、数量）
//! 2. `loading = true`
//! 3. AI 网关出题
//! 4. 成功：整体替换题目集合，然后 `loading = false`
//!    失败：`loading = false`，错误写入状态，题目集合不变
//!
//! 新的请求会取代仍在进行中的旧请求，旧请求的结果直接丢弃

use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

use crate::error::{AppResult, PreconditionError};
use crate::models::Question;
use crate::services::AiGateway;
use crate::store::QuestionStore;

/// 出题结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateOutcome {
    /// 题目集合已被替换
    Replaced { count: usize },
    /// 已有更新的请求，本次结果被丢弃
    Superseded,
}

pub struct GenerateFlow {
    gateway: Arc<AiGateway>,
    store: Arc<QuestionStore>,
    max_questions: usize,
    /// 最新请求的编号；检查与替换在同一把锁内完成
    latest_ticket: Mutex<u64>,
}

impl GenerateFlow {
    pub fn new(gateway: Arc<AiGateway>, store: Arc<QuestionStore>, max_questions: usize) -> Self {
        Self {
            gateway,
            store,
            max_questions,
            latest_ticket: Mutex::new(0),
        }
    }

    pub async fn run(
        &self,
        topic: &str,
        count: usize,
        subtopics: Option<&[String]>,
    ) -> AppResult<GenerateOutcome> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(PreconditionError::EmptyTopic.into());
        }

        let subtopics: Vec<String> = subtopics
            .unwrap_or_default()
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        // 每个子主题至少一道题
        let min = subtopics.len().max(1);
        if count < min || count > self.max_questions {
            return Err(PreconditionError::InvalidQuestionCount {
                requested: count,
                min,
                max: self.max_questions,
            }
            .into());
        }

        let ticket = self.begin();
        info!("🚀 [出题 #{}] 主题: {} | 数量: {}", ticket, topic, count);

        let result = self.gateway.generate(topic, count, &subtopics).await;

        let latest = self
            .latest_ticket
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *latest != ticket {
            warn!(
                "⚠️ [出题 #{}] 已被请求 #{} 取代，丢弃本次结果",
                ticket, *latest
            );
            return Ok(GenerateOutcome::Superseded);
        }

        match result {
            Ok(responses) => {
                let questions: Vec<Question> =
                    responses.iter().map(Question::from_response).collect();
                let count = questions.len();
                self.store.replace_questions(questions);
                self.store.finish_loading(None);
                info!("✓ [出题 #{}] 完成，共 {} 道题目", ticket, count);
                Ok(GenerateOutcome::Replaced { count })
            }
            Err(e) => {
                error!("❌ [出题 #{}] 失败: {}", ticket, e);
                self.store.finish_loading(Some(e.to_string()));
                Err(e.into())
            }
        }
    }

    fn begin(&self) -> u64 {
        let mut latest = self
            .latest_ticket
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *latest += 1;
        self.store.begin_loading();
        *latest
    }
}
