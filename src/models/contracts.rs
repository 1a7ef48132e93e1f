//! AI 响应的线上约定
//!
//! 结构只在 serde 类型上声明一次，JSON Schema 由 `schemars` 从类型派生

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// 结构化输出约定
pub trait Contract: DeserializeOwned + JsonSchema {
    /// 请求中使用的 schema 名称
    const NAME: &'static str;
}

/// 模型生成的一道题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QuestionResponse {
    pub topics: Vec<String>,
    pub question: String,
    pub answer: String,
}

/// 出题结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GenerateResult {
    pub questions: Vec<QuestionResponse>,
}

impl Contract for GenerateResult {
    const NAME: &'static str = "question_list_schema";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Grade {
    pub pass: bool,
}

/// 批改结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GradeResult {
    pub question: String,
    pub user_answer: String,
    pub feedback: String,
    pub grade: Grade,
    #[serde(default)]
    pub suggested_solution: Option<String>,
}

impl Contract for GradeResult {
    const NAME: &'static str = "question_grade_schema";
}
