//! 工作流状态：在各 Agent 之间传递的开放式键值表
//!
//! 值为封闭的和类型 Value；WorkflowState 只提供写入/覆盖，不提供删除，
//! 因此任何下游步骤都无法让已有的键消失。错误标记与跳过标记也以普通字段的形式写入。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 终态失败时包装器写入的错误字段：{message, agent, timestamp}
pub const ERROR_KEY: &str = "error";
/// 因必填字段缺失而被跳过的 Agent key 列表
pub const SKIPPED_STEPS_KEY: &str = "skipped_steps";

/// 状态中的值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Text(String),
    TextList(Vec<String>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// 文本列表；List 中的文本元素也会被收集
    pub fn to_text_list(&self) -> Vec<String> {
        match self {
            Value::TextList(items) => items.clone(),
            Value::List(items) => items
                .iter()
                .filter_map(|v| v.as_text().map(String::from))
                .collect(),
            Value::Text(s) => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    /// 空文本 / 空列表 / 空映射视为「没有值」
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Text(s) => s.trim().is_empty(),
            Value::TextList(items) => items.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Map(m) => m.is_empty(),
            Value::Bool(_) | Value::Number(_) | Value::Timestamp(_) => false,
        }
    }

    /// 从映射值中取文本字段，用于读取日历条目、内容条目等
    pub fn field_text(&self, key: &str) -> Option<&str> {
        self.as_map().and_then(|m| m.get(key)).and_then(Value::as_text)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::TextList(items)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(m: BTreeMap<String, Value>) -> Self {
        Value::Map(m)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Timestamp(t)
    }
}

/// 构造 Value::Map 的小工具：`map([("day", "1".into()), ...])`
pub fn map<K, I>(pairs: I) -> Value
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Value)>,
{
    Value::Map(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
}

/// 工作流状态：键只增不删，后写覆盖先写
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowState {
    fields: BTreeMap<String, Value>,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 链式写入，便于构造初始状态
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// 写入或覆盖一个字段
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_text)
    }

    pub fn get_number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_number)
    }

    pub fn get_list(&self, key: &str) -> Option<&[Value]> {
        self.get(key).and_then(Value::as_list)
    }

    pub fn get_map(&self, key: &str) -> Option<&BTreeMap<String, Value>> {
        self.get(key).and_then(Value::as_map)
    }

    pub fn get_text_list(&self, key: &str) -> Vec<String> {
        self.get(key).map(Value::to_text_list).unwrap_or_default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// 字段存在且非空（契约检查使用的「存在」语义）
    pub fn has_value(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| !v.is_blank())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 将 other 覆盖到自身（other 的同名字段胜出），不会移除任何已有键
    pub fn merge(&mut self, other: &WorkflowState) {
        for (k, v) in &other.fields {
            self.fields.insert(k.clone(), v.clone());
        }
    }

    /// 返回 self ∪ other 的新快照，self 不变
    pub fn merged(&self, other: &WorkflowState) -> WorkflowState {
        let mut next = self.clone();
        next.merge(other);
        next
    }

    pub fn has_error(&self) -> bool {
        self.contains(ERROR_KEY)
    }

    /// 错误字段中的 message（若有）
    pub fn error_message(&self) -> Option<&str> {
        self.get(ERROR_KEY).and_then(|v| v.field_text("message"))
    }

    /// 写入错误标记：`error` 映射与 `<agent_key>_error` 文本
    pub fn mark_error(&mut self, agent_key: &str, agent_name: &str, message: &str) {
        self.insert(
            ERROR_KEY,
            map([
                ("message", Value::from(message)),
                ("agent", Value::from(agent_name)),
                ("timestamp", Value::from(Utc::now())),
            ]),
        );
        self.insert(format!("{agent_key}_error"), message);
    }

    /// 写入跳过标记：`<agent_key>_skipped` 与 `skipped_steps` 列表
    pub fn mark_skipped(&mut self, agent_key: &str, reason: &str) {
        self.insert(format!("{agent_key}_skipped"), reason);
        let mut steps = self.get_text_list(SKIPPED_STEPS_KEY);
        if !steps.iter().any(|s| s == agent_key) {
            steps.push(agent_key.to_string());
        }
        self.insert(SKIPPED_STEPS_KEY, steps);
    }

    pub fn was_skipped(&self, agent_key: &str) -> bool {
        self.contains(&format!("{agent_key}_skipped"))
    }

    pub fn skipped_steps(&self) -> Vec<String> {
        self.get_text_list(SKIPPED_STEPS_KEY)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for WorkflowState {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_existing_keys() {
        let base = WorkflowState::new().with("topic", "Sustainable Fashion").with("budget", 1000.0);
        let update = WorkflowState::new().with("budget", 2000.0).with("ideas", vec!["a".to_string()]);

        let merged = base.merged(&update);
        assert_eq!(merged.get_text("topic"), Some("Sustainable Fashion"));
        assert_eq!(merged.get_number("budget"), Some(2000.0));
        assert_eq!(merged.get_text_list("ideas"), vec!["a".to_string()]);
        // 原快照不受影响
        assert_eq!(base.get_number("budget"), Some(1000.0));
        assert!(!base.contains("ideas"));
    }

    #[test]
    fn test_blank_values_are_not_present() {
        let state = WorkflowState::new()
            .with("topic", "   ")
            .with("content", Vec::<Value>::new())
            .with("count", 0usize);
        assert!(state.contains("topic"));
        assert!(!state.has_value("topic"));
        assert!(!state.has_value("content"));
        assert!(state.has_value("count"));
        assert!(!state.has_value("missing"));
    }

    #[test]
    fn test_error_marker_fields() {
        let mut state = WorkflowState::new().with("topic", "x");
        state.mark_error("trend_analysis", "Trend Analysis Agent", "boom");
        assert!(state.has_error());
        assert_eq!(state.error_message(), Some("boom"));
        assert_eq!(state.get_text("trend_analysis_error"), Some("boom"));
        assert_eq!(
            state.get(ERROR_KEY).and_then(|v| v.field_text("agent")),
            Some("Trend Analysis Agent")
        );
        assert_eq!(state.get_text("topic"), Some("x"));
    }

    #[test]
    fn test_skip_marker_is_idempotent_per_agent() {
        let mut state = WorkflowState::new();
        state.mark_skipped("trend_analysis", "missing required field(s): topic");
        state.mark_skipped("trend_analysis", "missing required field(s): topic");
        state.mark_skipped("content_writer", "missing required field(s): selected_idea");
        assert!(state.was_skipped("trend_analysis"));
        assert_eq!(
            state.skipped_steps(),
            vec!["trend_analysis".to_string(), "content_writer".to_string()]
        );
    }

    #[test]
    fn test_json_shape_is_flat() {
        let state = WorkflowState::new()
            .with("topic", "Sustainable Fashion")
            .with("ideas", vec!["idea1".to_string(), "idea2".to_string()]);
        let json = state.to_json();
        assert_eq!(
            json,
            serde_json::json!({"topic": "Sustainable Fashion", "ideas": ["idea1", "idea2"]})
        );
    }

    #[test]
    fn test_deserialize_initial_state() {
        let state: WorkflowState =
            serde_json::from_str(r#"{"topic": "AI", "duration": 30, "platforms": ["instagram"]}"#)
                .unwrap();
        assert_eq!(state.get_text("topic"), Some("AI"));
        assert_eq!(state.get_number("duration"), Some(30.0));
        assert_eq!(state.get_text_list("platforms"), vec!["instagram".to_string()]);
    }
}
