use std::fmt;

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 调用方引用了不存在的题目 / 版本 / 答案 / 讨论，或输入不合法
    #[error("前置条件错误: {0}")]
    Precondition(#[from] PreconditionError),
    /// AI 网关调用失败（传输或校验）
    #[error("{0}")]
    Gateway(#[from] GatewayError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

impl AppError {
    /// 如果错误源自响应校验失败，返回字段级诊断
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            AppError::Gateway(GatewayError {
                cause: GatewayCause::Validation(e),
                ..
            }) => Some(e),
            _ => None,
        }
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self, AppError::Precondition(_))
    }
}

// ========== 校验错误 ==========

/// 单个字段的不匹配信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    /// 字段路径，例如 `$.questions[0].answer`
    pub path: String,
    pub expected: String,
    pub found: String,
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: expected {}, found {}", self.path, self.expected, self.found)
    }
}

/// 外部响应不符合约定的结构
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("response did not match {contract}:{}", list_issues(.issues))]
pub struct ValidationError {
    /// 约定名称，例如 `question_list_schema`
    pub contract: String,
    pub issues: Vec<FieldIssue>,
}

fn list_issues(issues: &[FieldIssue]) -> String {
    issues.iter().map(|i| format!("\n  - {}", i)).collect()
}

impl ValidationError {
    pub fn new(contract: impl Into<String>, issues: Vec<FieldIssue>) -> Self {
        Self {
            contract: contract.into(),
            issues,
        }
    }

    pub fn single(
        contract: impl Into<String>,
        path: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::new(
            contract,
            vec![FieldIssue {
                path: path.into(),
                expected: expected.into(),
                found: found.into(),
            }],
        )
    }

    /// 是否有某个字段路径出现在诊断中
    pub fn mentions(&self, path: &str) -> bool {
        self.issues.iter().any(|i| i.path == path)
    }
}

// ========== 前置条件错误 ==========

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("找不到题目: {0}")]
    QuestionNotFound(String),
    #[error("找不到题目版本: {0}")]
    VersionNotFound(String),
    #[error("找不到答案: {0}")]
    AnswerNotFound(String),
    #[error("找不到答案 {0} 的讨论")]
    DiscussionNotFound(String),
    #[error("主题不能为空")]
    EmptyTopic,
    #[error("题目数量 {requested} 超出范围 [{min}, {max}]")]
    InvalidQuestionCount {
        requested: usize,
        min: usize,
        max: usize,
    },
}

// ========== 网关错误 ==========

/// 网关操作名
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayOperation {
    Generate,
    Grade,
    Chat,
}

impl fmt::Display for GatewayOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GatewayOperation::Generate => "generate",
            GatewayOperation::Grade => "grade",
            GatewayOperation::Chat => "chat",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum GatewayCause {
    /// 调用外部模型失败
    #[error("{0}")]
    Transport(anyhow::Error),
    #[error(transparent)]
    Validation(ValidationError),
}

/// AI 网关错误，携带操作名和原因
#[derive(Debug, Error)]
#[error("AI 网关 {operation} 失败: {cause}")]
pub struct GatewayError {
    pub operation: GatewayOperation,
    #[source]
    pub cause: GatewayCause,
}

impl GatewayError {
    pub fn transport(operation: GatewayOperation, source: anyhow::Error) -> Self {
        Self {
            operation,
            cause: GatewayCause::Transport(source),
        }
    }

    pub fn validation(operation: GatewayOperation, source: ValidationError) -> Self {
        Self {
            operation,
            cause: GatewayCause::Validation(source),
        }
    }
}

// ========== 持久化警告 ==========

/// 会话存储读写失败；只记录日志，不中断内存中的操作
#[derive(Debug, Error)]
pub enum PersistenceWarning {
    #[error("读取会话存储 {key} 失败: {source}")]
    ReadFailed { key: String, source: anyhow::Error },
    #[error("写入会话存储 {key} 失败: {source}")]
    WriteFailed { key: String, source: anyhow::Error },
    #[error("会话存储 {key} 的内容无法解析: {source}")]
    Corrupt {
        key: String,
        source: serde_json::Error,
    },
    #[error("序列化 {key} 失败: {source}")]
    SerializeFailed {
        key: String,
        source: serde_json::Error,
    },
}

impl PersistenceWarning {
    /// 记录警告后丢弃
    pub fn log(self) {
        tracing::warn!("⚠️ {}，继续使用内存状态", self);
    }
}

// ========== 配置错误 ==========

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        source: toml::de::Error,
    },
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
