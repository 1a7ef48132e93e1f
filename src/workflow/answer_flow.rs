//! 答案保存流程
//!
//! 同一个题目版本始终只有一个答案：已有答案时复用其 id

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::{AppResult, PreconditionError};
use crate::models::{new_id, AnswerStatus, UserAnswer};
use crate::store::QuestionStore;

#[derive(Clone)]
pub struct AnswerFlow {
    store: Arc<QuestionStore>,
    /// 查找已有答案与写入之间不能插入其他保存
    save_lock: Arc<Mutex<()>>,
}

impl AnswerFlow {
    pub fn new(store: Arc<QuestionStore>) -> Self {
        Self {
            store,
            save_lock: Arc::new(Mutex::new(())),
        }
    }

    /// 版本当前已保存的答案文本
    pub fn saved_text(&self, version_id: &str) -> Option<String> {
        self.store
            .get_answer_for_version(version_id)
            .map(|answer| answer.text)
    }

    /// 保存答案文本
    ///
    /// 空文本不保存，返回 `Ok(None)`。与已保存文本相同时原样返回已有答案（保留批改结果）；
    /// 新文本会把批改状态重置为 unchecked
    pub fn save(&self, version_id: &str, text: &str) -> AppResult<Option<UserAnswer>> {
        if text.is_empty() {
            debug!("版本 {} 的答案为空，跳过保存", version_id);
            return Ok(None);
        }

        let question = self
            .store
            .get_question_for_version(version_id)
            .ok_or_else(|| PreconditionError::VersionNotFound(version_id.to_string()))?;

        let _guard = self
            .save_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let existing = self.store.get_answer_for_version(version_id);
        if let Some(existing) = existing.as_ref().filter(|a| a.text == text) {
            debug!("版本 {} 的答案未变化，跳过保存", version_id);
            return Ok(Some(existing.clone()));
        }
        let id = existing.map(|a| a.id).unwrap_or_else(new_id);

        let answer = UserAnswer {
            id,
            question_id: question.id,
            question_version_id: version_id.to_string(),
            text: text.to_string(),
            status: AnswerStatus::Unchecked,
            feedback: None,
        };
        self.store.save_answer(answer.clone());

        Ok(Some(answer))
    }
}
