use serde::{Deserialize, Serialize};

use crate::models::contracts::QuestionResponse;
use crate::models::new_id;

/// 题目的一个具体版本（题干 + 参考答案 + 知识点），创建后不可修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionVersion {
    pub version_id: String,
    pub topics: Vec<String>,
    pub question: String,
    /// 参考答案
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_feedback: Option<String>,
}

impl QuestionVersion {
    /// 由模型返回的题目创建一个新版本
    pub fn from_response(response: &QuestionResponse) -> Self {
        Self {
            version_id: new_id(),
            topics: response.topics.clone(),
            question: response.question.clone(),
            answer: response.answer.clone(),
            user_feedback: None,
        }
    }
}

/// 题目，`versions` 按创建顺序排列，最后一个为当前版本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub versions: Vec<QuestionVersion>,
}

impl Question {
    /// 由模型返回的题目创建新题目（只有一个初始版本）
    pub fn from_response(response: &QuestionResponse) -> Self {
        Self {
            id: new_id(),
            versions: vec![QuestionVersion::from_response(response)],
        }
    }

    /// 当前版本
    pub fn current_version(&self) -> Option<&QuestionVersion> {
        self.versions.last()
    }

    pub fn version(&self, version_id: &str) -> Option<&QuestionVersion> {
        self.versions.iter().find(|v| v.version_id == version_id)
    }

    pub fn has_version(&self, version_id: &str) -> bool {
        self.version(version_id).is_some()
    }
}

/// 答案批改状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerStatus {
    #[default]
    Unchecked,
    Correct,
    Incorrect,
}

impl AnswerStatus {
    /// `pass` 映射：true → correct，false → incorrect，缺失 → unchecked
    pub fn from_pass(pass: Option<bool>) -> Self {
        match pass {
            Some(true) => AnswerStatus::Correct,
            Some(false) => AnswerStatus::Incorrect,
            None => AnswerStatus::Unchecked,
        }
    }
}

/// 用户对某个题目版本的作答
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAnswer {
    pub id: String,
    pub question_id: String,
    pub question_version_id: String,
    pub text: String,
    #[serde(default)]
    pub status: AnswerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}
