//! 会话存储 - 键值对形式，值为 JSON 文本

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::debug;

/// 题目列表的存储键
pub const QUESTIONS_STORAGE_KEY: &str = "promptr.questions.v1";
/// 答案列表的存储键
pub const ANSWERS_STORAGE_KEY: &str = "promptr.answers.v1";

/// 会话级键值存储
pub trait SessionStorage: Send + Sync {
    /// 读取键，不存在时返回 `Ok(None)`
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> Result<()>;
}

/// 内存存储，进程退出即丢失
#[derive(Default)]
pub struct MemorySessionStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let items = self
            .items
            .lock()
            .map_err(|_| anyhow::anyhow!("会话存储锁已损坏"))?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| anyhow::anyhow!("会话存储锁已损坏"))?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// 文件存储：每个键对应目录下的一个 `<key>.json`
pub struct FileSessionStorage {
    dir: PathBuf,
}

impl FileSessionStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl SessionStorage for FileSessionStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("无法读取文件: {}", path.display()))?;
        Ok(Some(content))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("无法创建目录: {}", self.dir.display()))?;
        let path = self.path_for(key);
        fs::write(&path, value).with_context(|| format!("无法写入文件: {}", path.display()))?;
        debug!("已写入 {} ({} 字节)", path.display(), value.len());
        Ok(())
    }
}
