pub mod contracts;
pub mod discussion;
pub mod question;

pub use contracts::{Contract, GenerateResult, Grade, GradeResult, QuestionResponse};
pub use discussion::{AnswerDiscussion, ChatMessage, ChatRole};
pub use question::{AnswerStatus, Question, QuestionVersion, UserAnswer};

/// 生成本地 id
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
