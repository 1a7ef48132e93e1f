//! 状态层
//!
//! 两个状态容器都由 `App` 持有，外部只能通过公开操作读写

pub mod discussion_store;
pub mod question_store;

pub use discussion_store::{DiscussionState, DiscussionStore};
pub use question_store::{QuestionState, QuestionStore};
