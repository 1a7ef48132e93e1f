//! 答案自动保存
//!
//! 连续编辑在静默期结束后合并为一次保存；与上次提交相同的值不再保存。
//! 关闭句柄时，尚未保存的最后一次编辑会立即写入。

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::workflow::answer_flow::AnswerFlow;

pub struct AnswerAutosave {
    tx: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl AnswerAutosave {
    /// 为某个题目版本启动自动保存任务（需要在 tokio 运行时内调用）
    pub fn spawn(flow: AnswerFlow, version_id: impl Into<String>, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let version_id = version_id.into();
        // 已保存的文本视为上次提交，重复推送不会覆盖批改结果
        let last_emitted = flow.saved_text(&version_id);
        let task = tokio::spawn(run(flow, version_id, debounce, last_emitted, rx));
        Self { tx, task }
    }

    /// 提交一次编辑；任务已结束时返回 false
    pub fn push(&self, text: impl Into<String>) -> bool {
        self.tx.send(text.into()).is_ok()
    }

    /// 停止接收编辑，等待最后一次保存完成
    pub async fn close(self) {
        drop(self.tx);
        if let Err(e) = self.task.await {
            warn!("⚠️ 自动保存任务异常结束: {}", e);
        }
    }
}

async fn run(
    flow: AnswerFlow,
    version_id: String,
    debounce: Duration,
    mut last_emitted: Option<String>,
    mut rx: mpsc::UnboundedReceiver<String>,
) {
    let mut pending: Option<String> = None;

    loop {
        match pending.take() {
            None => match rx.recv().await {
                Some(text) => pending = Some(text),
                None => break,
            },
            Some(current) => {
                tokio::select! {
                    next = rx.recv() => match next {
                        Some(text) => pending = Some(text),
                        None => {
                            emit(&flow, &version_id, current, &mut last_emitted);
                            break;
                        }
                    },
                    _ = tokio::time::sleep(debounce) => {
                        emit(&flow, &version_id, current, &mut last_emitted);
                    }
                }
            }
        }
    }

    debug!("版本 {} 的自动保存任务结束", version_id);
}

fn emit(flow: &AnswerFlow, version_id: &str, text: String, last_emitted: &mut Option<String>) {
    if last_emitted.as_deref() == Some(text.as_str()) {
        debug!("版本 {} 的答案未变化，跳过保存", version_id);
        return;
    }

    match flow.save(version_id, &text) {
        Ok(_) => *last_emitted = Some(text),
        // 失败的值不记为已提交，之后推送相同文本会重试
        Err(e) => warn!("⚠️ 自动保存版本 {} 的答案失败: {}", version_id, e),
    }
}
