use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::new_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// 讨论中的一条消息，创建后不可修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// 针对某个答案的追问讨论，只追加不修改
///
/// `user_answer_id` 只是反向引用，不代表生命周期绑定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerDiscussion {
    pub id: String,
    pub user_answer_id: String,
    pub messages: Vec<ChatMessage>,
}

impl AnswerDiscussion {
    pub fn new(user_answer_id: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            user_answer_id: user_answer_id.into(),
            messages: Vec::new(),
        }
    }
}
