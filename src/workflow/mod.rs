pub mod answer_flow;
pub mod autosave;
pub mod chat_flow;
pub mod generate_flow;
pub mod grade_flow;

pub use answer_flow::AnswerFlow;
pub use autosave::AnswerAutosave;
pub use chat_flow::ChatFlow;
pub use generate_flow::{GenerateFlow, GenerateOutcome};
pub use grade_flow::GradeFlow;
