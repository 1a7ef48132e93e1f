//! 题目 / 答案状态容器
//!
//! - 唯一持有 Question 和 UserAnswer 集合的地方
//! - 每次修改都会发布一个新的不可变快照（`watch` 通道）
//! - 集合变化后写入会话存储，失败只记录警告

use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::{PersistenceWarning, PreconditionError};
use crate::infrastructure::{SessionStorage, ANSWERS_STORAGE_KEY, QUESTIONS_STORAGE_KEY};
use crate::models::{Question, QuestionResponse, QuestionVersion, UserAnswer};

/// 题目 / 答案状态快照
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionState {
    pub questions: Vec<Question>,
    pub answers: Vec<UserAnswer>,
    /// 出题进行中
    pub loading: bool,
    /// 最近一次流水线失败的信息
    pub error: Option<String>,
}

impl QuestionState {
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// 遍历所有题目的所有版本
    pub fn version(&self, version_id: &str) -> Option<&QuestionVersion> {
        self.questions
            .iter()
            .flat_map(|q| q.versions.iter())
            .find(|v| v.version_id == version_id)
    }

    /// 包含该版本的题目
    pub fn question_for_version(&self, version_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.has_version(version_id))
    }

    pub fn answer(&self, id: &str) -> Option<&UserAnswer> {
        self.answers.iter().find(|a| a.id == id)
    }

    pub fn answer_for_version(&self, version_id: &str) -> Option<&UserAnswer> {
        self.answers
            .iter()
            .find(|a| a.question_version_id == version_id)
    }
}

pub struct QuestionStore {
    state: watch::Sender<Arc<QuestionState>>,
    storage: Arc<dyn SessionStorage>,
    /// 串行化写入，保证最后写入的是最新快照
    persist_lock: Mutex<()>,
}

impl QuestionStore {
    /// 从会话存储加载初始状态；读不到或无法解析时从空状态开始
    pub fn load(storage: Arc<dyn SessionStorage>) -> Self {
        let questions: Vec<Question> = read_collection(storage.as_ref(), QUESTIONS_STORAGE_KEY);
        let answers: Vec<UserAnswer> = read_collection(storage.as_ref(), ANSWERS_STORAGE_KEY);

        if !questions.is_empty() || !answers.is_empty() {
            info!(
                "📂 从会话存储恢复 {} 道题目、{} 个答案",
                questions.len(),
                answers.len()
            );
        }

        let initial = QuestionState {
            questions,
            answers,
            ..Default::default()
        };

        Self {
            state: watch::Sender::new(Arc::new(initial)),
            storage,
            persist_lock: Mutex::new(()),
        }
    }

    /// 当前快照
    pub fn snapshot(&self) -> Arc<QuestionState> {
        self.state.borrow().clone()
    }

    /// 订阅快照变化
    pub fn subscribe(&self) -> watch::Receiver<Arc<QuestionState>> {
        self.state.subscribe()
    }

    // ========== 查询 ==========

    pub fn get_question_by_id(&self, id: &str) -> Option<Question> {
        self.state.borrow().question(id).cloned()
    }

    pub fn get_question_version_by_version_id(&self, version_id: &str) -> Option<QuestionVersion> {
        self.state.borrow().version(version_id).cloned()
    }

    pub fn get_question_for_version(&self, version_id: &str) -> Option<Question> {
        self.state.borrow().question_for_version(version_id).cloned()
    }

    pub fn get_answer_by_id(&self, answer_id: &str) -> Option<UserAnswer> {
        self.state.borrow().answer(answer_id).cloned()
    }

    pub fn get_answer_for_version(&self, version_id: &str) -> Option<UserAnswer> {
        self.state.borrow().answer_for_version(version_id).cloned()
    }

    /// 优先返回最新版本上的答案，否则返回该题目的任意答案
    pub fn get_latest_answer_for_question(&self, question_id: &str) -> Option<UserAnswer> {
        let state = self.state.borrow();
        let question = state.question(question_id)?;
        let latest = question.current_version()?;

        state
            .answers
            .iter()
            .find(|a| a.question_id == question.id && a.question_version_id == latest.version_id)
            .or_else(|| state.answers.iter().find(|a| a.question_id == question.id))
            .cloned()
    }

    // ========== 修改 ==========

    /// 按 id 插入或替换答案
    pub fn save_answer(&self, answer: UserAnswer) {
        debug!("保存答案 {} (版本 {})", answer.id, answer.question_version_id);
        self.update(|state| match state.answers.iter().position(|a| a.id == answer.id) {
            Some(index) => state.answers[index] = answer,
            None => state.answers.push(answer),
        });
        self.persist();
    }

    /// 整体替换题目集合
    ///
    /// 旧题目及其 id 全部丢弃，引用旧 id 的答案 / 讨论不做清理
    pub fn replace_questions(&self, questions: Vec<Question>) {
        info!("🔄 替换题目集合，共 {} 道题目", questions.len());
        self.update(|state| state.questions = questions);
        self.persist();
    }

    /// 为已有题目追加新版本（重新生成）
    pub fn append_version(
        &self,
        question_id: &str,
        response: &QuestionResponse,
    ) -> Result<QuestionVersion, PreconditionError> {
        let version = QuestionVersion::from_response(response);
        let mut appended = false;

        self.update(|state| {
            if let Some(question) = state.questions.iter_mut().find(|q| q.id == question_id) {
                question.versions.push(version.clone());
                appended = true;
            }
        });

        if !appended {
            return Err(PreconditionError::QuestionNotFound(question_id.to_string()));
        }

        info!("➕ 题目 {} 新增版本 {}", question_id, version.version_id);
        self.persist();
        Ok(version)
    }

    /// 开始出题：`loading = true`，清空错误
    pub fn begin_loading(&self) {
        self.update(|state| {
            state.loading = true;
            state.error = None;
        });
    }

    /// 结束出题：`loading = false`，记录错误（如有）
    pub fn finish_loading(&self, error: Option<String>) {
        self.update(|state| {
            state.loading = false;
            state.error = error;
        });
    }

    pub fn set_error(&self, error: Option<String>) {
        self.update(|state| state.error = error);
    }

    fn update(&self, f: impl FnOnce(&mut QuestionState)) {
        // 仍被外部持有的快照不受影响
        self.state.send_modify(|snapshot| f(Arc::make_mut(snapshot)));
    }

    fn persist(&self) {
        let _guard = self
            .persist_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let snapshot = self.snapshot();

        write_collection(self.storage.as_ref(), QUESTIONS_STORAGE_KEY, &snapshot.questions);
        write_collection(self.storage.as_ref(), ANSWERS_STORAGE_KEY, &snapshot.answers);
    }
}

fn read_collection<T: DeserializeOwned>(storage: &dyn SessionStorage, key: &str) -> Vec<T> {
    let text = match storage.get_item(key) {
        Ok(Some(text)) => text,
        Ok(None) => return Vec::new(),
        Err(source) => {
            PersistenceWarning::ReadFailed {
                key: key.to_string(),
                source,
            }
            .log();
            return Vec::new();
        }
    };

    serde_json::from_str(&text).unwrap_or_else(|source| {
        PersistenceWarning::Corrupt {
            key: key.to_string(),
            source,
        }
        .log();
        Vec::new()
    })
}

fn write_collection<T: Serialize>(storage: &dyn SessionStorage, key: &str, items: &[T]) {
    let json = match serde_json::to_string(items) {
        Ok(json) => json,
        Err(source) => {
            PersistenceWarning::SerializeFailed {
                key: key.to_string(),
                source,
            }
            .log();
            return;
        }
    };

    if let Err(source) = storage.set_item(key, &json) {
        PersistenceWarning::WriteFailed {
            key: key.to_string(),
            source,
        }
        .log();
    }
}
