//! # 配置复用展开
//!
//! 在反序列化之前处理集群配置中的两种复用机制：
//! - YAML 合并键 `<<`：显式写出的键优先，多个来源时靠前的来源优先
//! - 档案继承 `extends: <profile>`：同一集群内，子档案的键覆盖父档案，
//!   两边都是映射的键按键合并一层
//!
//! 锚点与别名由 YAML 解析器展开，这里不再处理。
//!
//! ## 依赖关系
//! - 被 `registry/mod.rs` 使用
//! - 使用 `serde_yml`

use crate::error::{ChainsError, Result};

use serde_yml::{Mapping, Value};
use std::collections::HashMap;

const MERGE_KEY: &str = "<<";
const EXTENDS_KEY: &str = "extends";

/// 展开整份集群配置
pub fn preprocess(root: Value) -> Result<Value> {
    let mut root = resolve_merge_keys(root)?;

    let clusters = root
        .get_mut("clusters")
        .and_then(Value::as_mapping_mut)
        .ok_or_else(|| ChainsError::config("clusters file has no 'clusters' mapping"))?;

    for (name, cluster) in clusters.iter_mut() {
        let cluster_name = name.as_str().unwrap_or("?").to_string();
        if let Some(profiles) = cluster.get_mut("profiles").and_then(Value::as_mapping_mut) {
            *profiles = resolve_extends(profiles, &cluster_name)?;
        }
    }

    Ok(root)
}

fn is_merge_key(key: &Value) -> bool {
    matches!(key, Value::String(s) if s == MERGE_KEY)
}

/// 递归展开 `<<` 合并键
pub fn resolve_merge_keys(value: Value) -> Result<Value> {
    match value {
        Value::Mapping(map) => {
            let mut merged = Mapping::new();
            let mut sources = Vec::new();

            for (key, val) in map {
                if is_merge_key(&key) {
                    sources.push(val);
                } else {
                    merged.insert(key, resolve_merge_keys(val)?);
                }
            }

            for source in sources {
                match resolve_merge_keys(source)? {
                    Value::Mapping(m) => insert_missing(&mut merged, m),
                    Value::Sequence(seq) => {
                        for item in seq {
                            match item {
                                Value::Mapping(m) => insert_missing(&mut merged, m),
                                _ => return Err(merge_source_error()),
                            }
                        }
                    }
                    _ => return Err(merge_source_error()),
                }
            }

            Ok(Value::Mapping(merged))
        }
        Value::Sequence(seq) => Ok(Value::Sequence(
            seq.into_iter()
                .map(resolve_merge_keys)
                .collect::<Result<Vec<_>>>()?,
        )),
        other => Ok(other),
    }
}

fn merge_source_error() -> ChainsError {
    ChainsError::config("merge key '<<' expects a mapping or a list of mappings")
}

fn insert_missing(target: &mut Mapping, source: Mapping) {
    for (key, val) in source {
        if !target.contains_key(&key) {
            target.insert(key, val);
        }
    }
}

/// 展开一个集群内全部档案的 `extends`
pub fn resolve_extends(profiles: &Mapping, cluster: &str) -> Result<Mapping> {
    let mut resolved: HashMap<String, Mapping> = HashMap::new();
    let mut out = Mapping::new();

    for key in profiles.keys() {
        let name = key.as_str().ok_or_else(|| {
            ChainsError::config(format!("profile names of cluster '{}' must be strings", cluster))
        })?;
        let mut stack = Vec::new();
        let body = resolve_profile(name, profiles, cluster, &mut resolved, &mut stack)?;
        out.insert(key.clone(), Value::Mapping(body));
    }

    Ok(out)
}

fn resolve_profile(
    name: &str,
    profiles: &Mapping,
    cluster: &str,
    resolved: &mut HashMap<String, Mapping>,
    stack: &mut Vec<String>,
) -> Result<Mapping> {
    if let Some(done) = resolved.get(name) {
        return Ok(done.clone());
    }
    if stack.iter().any(|s| s == name) {
        stack.push(name.to_string());
        return Err(ChainsError::config(format!(
            "inheritance cycle in cluster '{}': {}",
            cluster,
            stack.join(" -> ")
        )));
    }

    let body = profiles
        .get(name)
        .and_then(Value::as_mapping)
        .ok_or_else(|| {
            ChainsError::config(format!(
                "profile '{}' of cluster '{}' must be a mapping",
                name, cluster
            ))
        })?;

    let mut result = match body.get(EXTENDS_KEY) {
        None => Mapping::new(),
        Some(Value::String(parent)) => {
            if profiles.get(parent.as_str()).is_none() {
                return Err(ChainsError::config(format!(
                    "profile '{}' of cluster '{}' extends unknown profile '{}'",
                    name, cluster, parent
                )));
            }
            stack.push(name.to_string());
            let base = resolve_profile(parent, profiles, cluster, resolved, stack)?;
            stack.pop();
            base
        }
        Some(_) => {
            return Err(ChainsError::config(format!(
                "'extends' of profile '{}' in cluster '{}' must be a profile name",
                name, cluster
            )))
        }
    };

    for (key, val) in body {
        if matches!(key, Value::String(s) if s == EXTENDS_KEY) {
            continue;
        }
        match (result.get_mut(key), val) {
            (Some(Value::Mapping(base)), Value::Mapping(child)) => {
                for (k, v) in child {
                    base.insert(k.clone(), v.clone());
                }
            }
            _ => {
                result.insert(key.clone(), val.clone());
            }
        }
    }

    resolved.insert(name.to_string(), result.clone());
    Ok(result)
}
