//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 组装各层并对外暴露应用操作，是调用方唯一的入口。
//!
//! ## 层次关系
//!
//! ```text
//! orchestrator::App (generate / save / check / chat)
//!     ↓
//! workflow (GenerateFlow / AnswerFlow / GradeFlow / ChatFlow / AnswerAutosave)
//!     ↓
//! store (QuestionStore / DiscussionStore)   services (AiGateway / 校验 / 提示词)
//!     ↓
//! infrastructure (LlmBackend / SessionStorage)
//! ```
//!
//! ## 设计原则
//!
//! 1. **向下依赖**：编排层 → workflow → store / services → infrastructure
//! 2. **无业务逻辑**：只做组装和转发

pub mod app;

pub use app::App;
