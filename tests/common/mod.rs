//! 集成测试共用的脚本化 LLM 后端

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use promptr::infrastructure::{LlmBackend, LlmRequest, MemorySessionStorage, SessionStorage};
use promptr::{App, Config};
use tokio::sync::Notify;

struct Step {
    reply: Result<String, String>,
    gate: Option<Arc<Notify>>,
}

/// 按顺序返回预设回复，并记录每一次请求
#[derive(Default)]
pub struct ScriptedBackend {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, text: impl Into<String>) {
        self.push(Ok(text.into()), None);
    }

    pub fn fail(&self, message: impl Into<String>) {
        self.push(Err(message.into()), None);
    }

    /// 回复在 `gate` 被通知之后才返回
    pub fn reply_after(&self, text: impl Into<String>, gate: Arc<Notify>) {
        self.push(Ok(text.into()), Some(gate));
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn push(&self, reply: Result<String, String>, gate: Option<Arc<Notify>>) {
        self.steps.lock().unwrap().push_back(Step { reply, gate });
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn complete(&self, request: LlmRequest) -> anyhow::Result<String> {
        self.requests.lock().unwrap().push(request);
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .expect("没有预设的回复");

        if let Some(gate) = step.gate {
            gate.notified().await;
        }
        step.reply.map_err(|e| anyhow::anyhow!(e))
    }
}

pub fn app_with(backend: Arc<ScriptedBackend>, storage: Arc<dyn SessionStorage>) -> App {
    App::new(Config::default(), backend, storage)
}

pub fn memory_app(backend: Arc<ScriptedBackend>) -> App {
    app_with(backend, Arc::new(MemorySessionStorage::new()))
}

/// 构造 question_list_schema 格式的回复，topics 用逗号分隔
pub fn questions_json(items: &[(&str, &str, &str)]) -> String {
    let questions: Vec<serde_json::Value> = items
        .iter()
        .map(|(topics, question, answer)| {
            let topics: Vec<&str> = topics.split(',').map(str::trim).collect();
            serde_json::json!({ "topics": topics, "question": question, "answer": answer })
        })
        .collect();
    serde_json::json!({ "questions": questions }).to_string()
}

/// 构造 question_grade_schema 格式的回复
pub fn grade_json(question: &str, user_answer: &str, feedback: &str, pass: bool) -> String {
    serde_json::json!({
        "question": question,
        "userAnswer": user_answer,
        "feedback": feedback,
        "grade": { "pass": pass }
    })
    .to_string()
}

/// 生成一道题并返回其版本 id
pub async fn single_question(app: &App, backend: &ScriptedBackend) -> String {
    backend.reply(questions_json(&[(
        "Rust",
        "What does the borrow checker enforce?",
        "Aliasing XOR mutability.",
    )]));
    app.generate_questions("Rust", 1, None).await.unwrap();
    app.snapshot().questions[0].versions[0].version_id.clone()
}
