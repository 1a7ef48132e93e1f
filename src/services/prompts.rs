//! 提示词模板
//!
//! 所有提示词都由类型化输入确定性地构建，同样的输入得到同样的提示词

use crate::models::{ChatMessage, ChatRole};
use crate::infrastructure::LlmMessage;

/// 出题与批改共用的系统提示词
pub const EXAM_GENERATOR_PROMPT: &str = "\
You are an exam assistant that can generate questions with answers and provide feedback.
The user will not see your answer until they have provided their own.
Talk about the answer rather than the user, e.g. \"the answer addresses x, the answer does not address y\".

Rules:
- Only ask questions relevant to the general topic and subtopics (if provided)
- If subtopics are provided, ask at least one question per sub-topic
- Questions should be challenging but clear
- Questions should not be overly long or complex or cover too many topics
- Each question should be self-contained and not require external resources
- Questions should be given with a corresponding answer
- Questions should be written in markdown for formatting
- When generating questions, always return JSON matching the schema
- When grading answers, return structured feedback
";

/// 追问对话的系统提示词
pub const CHAT_TUTOR_PROMPT: &str = "\
You are an expert coding tutor.
The user answered a coding interview-style question.
They received initial feedback. Now they want to have a back-and-forth chat.
You will receive the necessary context, and the entire discussion history including the latest message to be responded to.

- Be constructive and educational.
- Reference the question, their answer, and the feedback when relevant.
- Keep answers clear and concise, but you can expand if they ask.
";

/// 构建出题用户消息
pub fn build_generate_message(topic: &str, count: usize, subtopics: &[String]) -> String {
    let subtopics_line = if subtopics.is_empty() {
        "none".to_string()
    } else {
        subtopics.join(", ")
    };

    format!(
        "Generate exactly {count} exam questions.
Topic: {topic}
Subtopics: {subtopics_line}
Question style: a mix of long-form discursive, multiple choice, short answer, and code challenges.
Each question must be self-contained.
For each question, list the topic(s) relevant to that specific question."
    )
}

/// 构建批改用户消息
pub fn build_grade_message(question: &str, reference_answer: &str, user_answer: &str) -> String {
    format!(
        "Question: {question}
Reference answer: {reference_answer}
User's answer: {user_answer}

Give clear feedback, a pass/fail mark, then a suggested correct solution (if required)."
    )
}

/// 构建追问对话的上下文消息
pub fn build_chat_context(
    question: &str,
    reference_answer: &str,
    user_answer: &str,
    feedback: Option<&str>,
) -> String {
    format!(
        "Here is the context of the task:
Question: {question}
Answer: {reference_answer}
User's Answer: {user_answer}
Feedback: {}",
        feedback.unwrap_or("none yet")
    )
}

/// 讨论历史转换为模型消息
pub fn history_messages(history: &[ChatMessage]) -> impl Iterator<Item = LlmMessage> + '_ {
    history.iter().map(|m| match m.role {
        ChatRole::User => LlmMessage::user(m.content.as_str()),
        ChatRole::Assistant => LlmMessage::assistant(m.content.as_str()),
    })
}
