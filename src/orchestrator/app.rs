//! 应用入口 - 编排层
//!
//! `App` 持有两个状态容器和 AI 网关，对外暴露四个操作：
//! 生成题目、保存答案、批改答案、追问。
//! 读取操作只返回快照，调用方无法直接修改状态。

use std::sync::Arc;

use tokio::sync::watch;
use tracing::warn;

use crate::config::Config;
use crate::error::{AppResult, PreconditionError};
use crate::infrastructure::{
    FileSessionStorage, LlmBackend, MemorySessionStorage, OpenAiBackend, SessionStorage,
};
use crate::models::{AnswerDiscussion, ChatMessage, Question, UserAnswer};
use crate::services::AiGateway;
use crate::store::{DiscussionState, DiscussionStore, QuestionState, QuestionStore};
use crate::workflow::{
    AnswerAutosave, AnswerFlow, ChatFlow, GenerateFlow, GenerateOutcome, GradeFlow,
};

/// 应用主结构
pub struct App {
    config: Config,
    questions: Arc<QuestionStore>,
    discussions: Arc<DiscussionStore>,
    generate_flow: GenerateFlow,
    answer_flow: AnswerFlow,
    grade_flow: GradeFlow,
    chat_flow: ChatFlow,
}

impl App {
    /// 用指定的后端和存储组装应用
    pub fn new(
        config: Config,
        backend: Arc<dyn LlmBackend>,
        storage: Arc<dyn SessionStorage>,
    ) -> Self {
        let gateway = Arc::new(AiGateway::new(backend, &config));
        let questions = Arc::new(QuestionStore::load(storage));
        let discussions = Arc::new(DiscussionStore::new());

        let generate_flow =
            GenerateFlow::new(gateway.clone(), questions.clone(), config.max_questions);
        let answer_flow = AnswerFlow::new(questions.clone());
        let grade_flow = GradeFlow::new(gateway.clone(), questions.clone());
        let chat_flow = ChatFlow::new(gateway, questions.clone(), discussions.clone());

        Self {
            config,
            questions,
            discussions,
            generate_flow,
            answer_flow,
            grade_flow,
            chat_flow,
        }
    }

    /// 按配置选择 OpenAI 后端，以及文件或内存存储
    pub fn from_config(config: Config) -> Self {
        let backend: Arc<dyn LlmBackend> = Arc::new(OpenAiBackend::new(&config));
        let storage: Arc<dyn SessionStorage> = match &config.session_dir {
            Some(dir) => Arc::new(FileSessionStorage::new(dir)),
            None => {
                warn!("⚠️ 未配置 session_dir，会话数据只保存在内存中");
                Arc::new(MemorySessionStorage::new())
            }
        };
        Self::new(config, backend, storage)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ========== 操作 ==========

    /// 按主题生成一组新题目，成功后整体替换现有题目
    pub async fn generate_questions(
        &self,
        topic: &str,
        count: usize,
        subtopics: Option<&[String]>,
    ) -> AppResult<GenerateOutcome> {
        self.generate_flow.run(topic, count, subtopics).await
    }

    /// 保存某个版本的答案；空文本不保存
    pub fn save_answer(&self, version_id: &str, text: &str) -> AppResult<Option<UserAnswer>> {
        self.answer_flow.save(version_id, text)
    }

    /// 让 AI 批改一份答案
    pub async fn check_answer(&self, version_id: &str, answer_id: &str) -> AppResult<UserAnswer> {
        self.grade_flow.run(version_id, answer_id).await
    }

    /// 针对一份答案发起追问，讨论不存在时自动创建
    pub async fn send_message(&self, answer_id: &str, text: &str) -> AppResult<ChatMessage> {
        if self.questions.get_answer_by_id(answer_id).is_none() {
            return Err(PreconditionError::AnswerNotFound(answer_id.to_string()).into());
        }
        self.discussions.start_discussion(answer_id);
        self.chat_flow.send(answer_id, text).await
    }

    /// 为某个版本启动答案自动保存（需要在 tokio 运行时内调用）
    pub fn autosave(&self, version_id: &str) -> AnswerAutosave {
        AnswerAutosave::spawn(
            self.answer_flow.clone(),
            version_id,
            self.config.autosave_debounce(),
        )
    }

    // ========== 只读查询 ==========

    pub fn get_question_by_id(&self, id: &str) -> Option<Question> {
        self.questions.get_question_by_id(id)
    }

    pub fn get_answer_by_id(&self, id: &str) -> Option<UserAnswer> {
        self.questions.get_answer_by_id(id)
    }

    pub fn get_answer_for_version(&self, version_id: &str) -> Option<UserAnswer> {
        self.questions.get_answer_for_version(version_id)
    }

    pub fn get_latest_answer_for_question(&self, question_id: &str) -> Option<UserAnswer> {
        self.questions.get_latest_answer_for_question(question_id)
    }

    pub fn get_discussion(&self, answer_id: &str) -> Option<AnswerDiscussion> {
        self.discussions.get_discussion(answer_id)
    }

    pub fn snapshot(&self) -> Arc<QuestionState> {
        self.questions.snapshot()
    }

    pub fn discussions_snapshot(&self) -> Arc<DiscussionState> {
        self.discussions.snapshot()
    }

    /// 订阅题目状态的变化
    pub fn subscribe(&self) -> watch::Receiver<Arc<QuestionState>> {
        self.questions.subscribe()
    }

    /// 订阅讨论状态的变化
    pub fn subscribe_discussions(&self) -> watch::Receiver<Arc<DiscussionState>> {
        self.discussions.subscribe()
    }
}
