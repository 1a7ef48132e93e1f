//! 结构校验 - 业务能力层
//!
//! 把模型返回的原始内容解码成约定类型，失败时给出字段级诊断
//! （字段路径 + 期望 + 实际），而不是笼统的"无效"。
//!
//! Schema 由 `schemars` 从约定类型派生，校验交给 `jsonschema`

use std::sync::LazyLock;

use jsonschema::error::{TypeKind, ValidationErrorKind};
use regex::Regex;
use schemars::schema_for;
use serde_json::Value;
use tracing::debug;

use crate::error::{FieldIssue, ValidationError};
use crate::models::Contract;

/// 模型有时会把 JSON 包在 Markdown 代码块里
static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\s*```\s*$").expect("valid regex")
});

/// 约定类型派生出的 JSON Schema
pub fn schema_of<T: Contract>() -> Value {
    schema_for!(T).to_value()
}

/// 请求结构化输出用的严格 schema：
/// 每个对象禁止额外字段且所有键必填（可选字段本身允许 null）
pub fn strict_schema<T: Contract>() -> Value {
    let mut schema = schema_of::<T>();
    if let Value::Object(root) = &mut schema {
        root.remove("$schema");
    }
    make_strict(&mut schema);
    schema
}

fn make_strict(schema: &mut Value) {
    let Value::Object(map) = schema else {
        return;
    };
    map.remove("default");

    let required = match map.get_mut("properties") {
        Some(Value::Object(properties)) => {
            properties.values_mut().for_each(make_strict);
            Some(
                properties
                    .keys()
                    .cloned()
                    .map(Value::String)
                    .collect::<Vec<_>>(),
            )
        }
        _ => None,
    };
    if let Some(required) = required {
        map.insert("required".to_string(), Value::Array(required));
        map.insert("additionalProperties".to_string(), Value::Bool(false));
    }

    if let Some(items) = map.get_mut("items") {
        make_strict(items);
    }
    for key in ["$defs", "definitions"] {
        if let Some(Value::Object(defs)) = map.get_mut(key) {
            defs.values_mut().for_each(make_strict);
        }
    }
    for key in ["anyOf", "oneOf", "allOf"] {
        if let Some(Value::Array(variants)) = map.get_mut(key) {
            variants.iter_mut().for_each(make_strict);
        }
    }
}

/// 校验已解析的 JSON 值并转换为约定类型
pub fn validate<T: Contract>(raw: &Value) -> Result<T, ValidationError> {
    let schema = schema_of::<T>();
    let validator = jsonschema::validator_for(&schema)
        .map_err(|e| ValidationError::single(T::NAME, "$", "usable schema", e.to_string()))?;

    let issues: Vec<FieldIssue> = validator.iter_errors(raw).map(|e| to_issue(&e)).collect();
    if !issues.is_empty() {
        debug!("{} 校验失败，共 {} 处不匹配", T::NAME, issues.len());
        return Err(ValidationError::new(T::NAME, issues));
    }

    serde_json::from_value(raw.clone())
        .map_err(|e| ValidationError::single(T::NAME, "$", "object", e.to_string()))
}

/// 解码模型返回的原始文本：去掉代码块包裹、解析 JSON、再做结构校验
pub fn decode<T: Contract>(text: &str) -> Result<T, ValidationError> {
    let body = strip_code_fence(text);
    let raw: Value = serde_json::from_str(body).map_err(|e| {
        ValidationError::single(T::NAME, "$", "JSON document", format!("invalid JSON ({})", e))
    })?;
    validate(&raw)
}

fn to_issue(error: &jsonschema::ValidationError<'_>) -> FieldIssue {
    let path = json_path(error.instance_path.as_str());
    match &error.kind {
        ValidationErrorKind::Required { property } => FieldIssue {
            path: format!("{}.{}", path, property.as_str().unwrap_or_default()),
            expected: "required field".to_string(),
            found: "missing".to_string(),
        },
        ValidationErrorKind::Type { kind } => FieldIssue {
            path,
            expected: match kind {
                TypeKind::Single(primitive) => primitive.to_string(),
                TypeKind::Multiple(_) => "one of the allowed types".to_string(),
            },
            found: describe(&error.instance).to_string(),
        },
        _ => FieldIssue {
            path,
            expected: "value accepted by the schema".to_string(),
            found: error.to_string(),
        },
    }
}

/// JSON Pointer（`/questions/0/answer`）转为诊断用路径（`$.questions[0].answer`）
fn json_path(pointer: &str) -> String {
    let mut path = String::from("$");
    for segment in pointer.split('/').skip(1) {
        let segment = segment.replace("~1", "/").replace("~0", "~");
        if segment.parse::<usize>().is_ok() {
            path.push_str(&format!("[{}]", segment));
        } else {
            path.push('.');
            path.push_str(&segment);
        }
    }
    path
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn strip_code_fence(text: &str) -> &str {
    match CODE_FENCE.captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => text.trim(),
    }
}
