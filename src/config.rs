use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// 追问对话的采样温度
    pub chat_temperature: f32,
    /// 会话存储目录，未设置时只保存在内存中
    pub session_dir: Option<String>,
    /// 答案自动保存的静默时间（毫秒）
    pub autosave_debounce_ms: u64,
    /// 单次最多生成的题目数量
    pub max_questions: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            chat_temperature: 0.7,
            session_dir: None,
            autosave_debounce_ms: 1000,
            max_questions: 20,
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default().merge_env()
    }

    /// 从 TOML 文件加载，缺失的键取默认值，然后用环境变量覆盖
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&content).map_err(|source| {
            ConfigError::TomlParseFailed {
                path: path.display().to_string(),
                source,
            }
        })?;
        Ok(config.merge_env())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn merge_env(self) -> Self {
        let default = self;
        Self {
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            chat_temperature: std::env::var("CHAT_TEMPERATURE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.chat_temperature),
            session_dir: std::env::var("SESSION_DIR").ok().or(default.session_dir),
            autosave_debounce_ms: std::env::var("AUTOSAVE_DEBOUNCE_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.autosave_debounce_ms),
            max_questions: std::env::var("MAX_QUESTIONS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_questions),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
        }
    }

    pub fn autosave_debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.autosave_debounce_ms)
    }
}
