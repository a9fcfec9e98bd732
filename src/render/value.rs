//! # 模板值类型
//!
//! 渲染上下文中的动态值，可由 YAML 转换得到。
//!
//! ## 依赖关系
//! - 被 `render/` 各子模块和 `models/work.rs` 使用
//! - 使用 `serde_yml`

use std::collections::BTreeMap;
use std::fmt;

/// 模板值
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// 从 YAML 值转换，映射的非字符串键按其文本形式保存
    pub fn from_yaml(yaml: &serde_yml::Value) -> Value {
        match yaml {
            serde_yml::Value::Null => Value::None,
            serde_yml::Value::Bool(b) => Value::Bool(*b),
            serde_yml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_yml::Value::String(s) => Value::Str(s.clone()),
            serde_yml::Value::Sequence(seq) => {
                Value::List(seq.iter().map(Value::from_yaml).collect())
            }
            serde_yml::Value::Mapping(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (Value::from_yaml(k).to_string(), Value::from_yaml(v)))
                    .collect(),
            ),
            _ => Value::None,
        }
    }

    /// 真值判断
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Map(m) => !m.is_empty(),
        }
    }

    /// 类型名，用于错误信息
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "None",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "mapping",
        }
    }

    /// 映射取值
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(m) => m.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// 比较相等，整数与浮点按数值比较
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)) => {
                self.as_f64() == other.as_f64()
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            // 整数值的浮点数保留 `.0`，避免与整数混淆
            Value::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{:.1}", x),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u64> for Value {
    fn from(i: u64) -> Self {
        i64::try_from(i)
            .map(Value::Int)
            .unwrap_or(Value::Float(i as f64))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::List(items.into_iter().map(Value::Str).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_yaml_nested() {
        let yaml: serde_yml::Value =
            serde_yml::from_str("a: 1\nb: [x, 2.5]\nc: ~\nd: {e: true}\n").unwrap();
        let v = Value::from_yaml(&yaml);
        assert_eq!(v.get("a"), Some(&Value::Int(1)));
        assert_eq!(
            v.get("b"),
            Some(&Value::List(vec![Value::from("x"), Value::Float(2.5)]))
        );
        assert_eq!(v.get("c"), Some(&Value::None));
        assert_eq!(v.get("d").and_then(|d| d.get("e")), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Float(26.0).to_string(), "26.0");
        assert_eq!(Value::Float(1.0).to_string(), "1.0");
        assert_eq!(Value::Float(-3.0).to_string(), "-3.0");
        assert_eq!(Value::Int(26).to_string(), "26");
        assert_eq!(Value::Float(0.75).to_string(), "0.75");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::from("a")]).to_string(),
            "[1, a]"
        );
    }

    #[test]
    fn test_truthiness_and_equality() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::List(vec![Value::None]).is_truthy());
        assert!(Value::Int(3).loose_eq(&Value::Float(3.0)));
        assert!(!Value::from("3").loose_eq(&Value::Int(3)));
    }
}
