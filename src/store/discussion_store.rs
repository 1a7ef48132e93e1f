//! 讨论状态容器
//!
//! 讨论按答案 id 索引，只追加消息；当前不写入会话存储

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::error::PreconditionError;
use crate::models::{AnswerDiscussion, ChatMessage, ChatRole};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscussionState {
    pub discussions: Vec<AnswerDiscussion>,
}

impl DiscussionState {
    pub fn discussion(&self, answer_id: &str) -> Option<&AnswerDiscussion> {
        self.discussions
            .iter()
            .find(|d| d.user_answer_id == answer_id)
    }
}

pub struct DiscussionStore {
    state: watch::Sender<Arc<DiscussionState>>,
}

impl Default for DiscussionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscussionStore {
    pub fn new() -> Self {
        Self {
            state: watch::Sender::new(Arc::new(DiscussionState::default())),
        }
    }

    pub fn snapshot(&self) -> Arc<DiscussionState> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<DiscussionState>> {
        self.state.subscribe()
    }

    pub fn get_discussion(&self, answer_id: &str) -> Option<AnswerDiscussion> {
        self.state.borrow().discussion(answer_id).cloned()
    }

    /// 没有讨论时创建一个空讨论；已存在时原样返回
    pub fn start_discussion(&self, answer_id: &str) -> AnswerDiscussion {
        let mut discussion = AnswerDiscussion::new(answer_id);
        self.state.send_if_modified(|snapshot| {
            if let Some(existing) = snapshot.discussion(answer_id) {
                discussion = existing.clone();
                return false;
            }
            debug!("为答案 {} 创建讨论 {}", answer_id, discussion.id);
            Arc::make_mut(snapshot).discussions.push(discussion.clone());
            true
        });
        discussion
    }

    /// 向讨论追加一条消息；讨论不存在时失败
    pub fn append_message(
        &self,
        answer_id: &str,
        content: impl Into<String>,
        role: ChatRole,
    ) -> Result<ChatMessage, PreconditionError> {
        let message = ChatMessage::new(role, content);
        let mut appended = false;

        self.state.send_if_modified(|snapshot| {
            let state = Arc::make_mut(snapshot);
            match state
                .discussions
                .iter()
                .position(|d| d.user_answer_id == answer_id)
            {
                Some(index) => {
                    state.discussions[index].messages.push(message.clone());
                    appended = true;
                    true
                }
                None => false,
            }
        });

        if appended {
            Ok(message)
        } else {
            Err(PreconditionError::DiscussionNotFound(answer_id.to_string()))
        }
    }
}
