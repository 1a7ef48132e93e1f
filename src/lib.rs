//! # Promptr
//!
//! AI 辅助的考试练习：按主题生成题目，保存答案，由 AI 批改，并针对答案继续追问
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 外部资源，只暴露能力
//! - `LlmBackend` - 大模型调用能力（`OpenAiBackend` 为默认实现）
//! - `SessionStorage` - 会话级键值存储（内存 / 文件）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `AiGateway` - 生成 / 批改 / 追问三种 AI 请求
//! - `schema_validator` - 校验模型返回的结构化数据
//! - `prompts` - 提示词和消息拼装
//!
//! ### ③ 状态层（Store）
//! - `QuestionStore` - 题目、答案、加载状态和错误，持久化到会话存储
//! - `DiscussionStore` - 每份答案的追问记录
//!
//! ### ④ 流程层（Workflow）
//! - `GenerateFlow` / `AnswerFlow` / `GradeFlow` / `ChatFlow` - 单个操作的完整流程
//! - `AnswerAutosave` - 答案编辑的去抖保存
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator::App` - 组装各层，对外唯一入口
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod store;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, GatewayError, PreconditionError, ValidationError};
pub use infrastructure::{LlmBackend, SessionStorage};
pub use models::{
    AnswerDiscussion, AnswerStatus, ChatMessage, ChatRole, Question, QuestionVersion, UserAnswer,
};
pub use orchestrator::App;
pub use workflow::{AnswerAutosave, GenerateOutcome};
