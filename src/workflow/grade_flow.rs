//! 批改流程
//!
//! 版本 + 答案 → AI 批改 → 更新答案状态与反馈（文本和 id 不变）

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::{AppResult, PreconditionError};
use crate::models::{AnswerStatus, UserAnswer};
use crate::services::AiGateway;
use crate::store::QuestionStore;
use crate::utils::logging::truncate_text;

pub struct GradeFlow {
    gateway: Arc<AiGateway>,
    store: Arc<QuestionStore>,
}

impl GradeFlow {
    pub fn new(gateway: Arc<AiGateway>, store: Arc<QuestionStore>) -> Self {
        Self { gateway, store }
    }

    pub async fn run(&self, version_id: &str, answer_id: &str) -> AppResult<UserAnswer> {
        let version = self
            .store
            .get_question_version_by_version_id(version_id)
            .ok_or_else(|| PreconditionError::VersionNotFound(version_id.to_string()))?;
        let answer = self
            .store
            .get_answer_by_id(answer_id)
            .ok_or_else(|| PreconditionError::AnswerNotFound(answer_id.to_string()))?;

        info!(
            "📝 [批改] 题目: {} | 答案: {}",
            truncate_text(&version.question, 40),
            truncate_text(&answer.text, 40)
        );

        let graded = match self
            .gateway
            .grade(&version.question, &version.answer, &answer.text)
            .await
        {
            Ok(graded) => graded,
            Err(e) => {
                error!("❌ [批改] 失败: {}", e);
                self.store.set_error(Some(e.to_string()));
                return Err(e.into());
            }
        };

        // 批改期间答案可能被自动保存修改过
        let current = self
            .store
            .get_answer_by_id(answer_id)
            .ok_or_else(|| PreconditionError::AnswerNotFound(answer_id.to_string()))?;
        if current.text != answer.text {
            warn!("⚠️ [批改] 答案 {} 在批改期间已修改，丢弃本次结果", answer_id);
            return Ok(current);
        }

        let updated = UserAnswer {
            status: AnswerStatus::from_pass(Some(graded.grade.pass)),
            feedback: Some(graded.feedback),
            ..current
        };
        self.store.save_answer(updated.clone());

        info!("✓ [批改] 答案 {} → {:?}", answer_id, updated.status);
        Ok(updated)
    }
}
