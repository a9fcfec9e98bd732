//! # 渲染上下文
//!
//! 每个组合构建一次的扁平键值表，渲染结束即丢弃。
//!
//! ## 依赖关系
//! - 被 `render/mod.rs`, `render/functions.rs`, `batch/driver.rs` 使用
//! - 使用 `render/value.rs`

use super::value::Value;

use std::collections::BTreeMap;

/// 渲染上下文
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderContext {
    values: BTreeMap<String, Value>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入一个键，已存在时覆盖
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// 链式写入
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// 批量写入，后写入者覆盖
    pub fn extend<I, K>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        for (k, v) in entries {
            self.values.insert(k.into(), v);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_override() {
        let mut ctx = RenderContext::new().with("a", 1i64).with("b", "x");
        ctx.extend(vec![("a", Value::from("override"))]);
        assert_eq!(ctx.get("a"), Some(&Value::from("override")));
        assert_eq!(ctx.len(), 2);
        assert!(ctx.get("b").is_some());
        assert!(ctx.get("c").is_none());
    }
}
