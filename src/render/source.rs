//! # 模板来源
//!
//! 渲染器通过 `TemplateSource` 按名称取得模板文本，目录与内存两种实现。
//!
//! ## 依赖关系
//! - 被 `render/mod.rs` 使用

use crate::error::{ChainsError, Result};

#[cfg(test)]
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// 按名称提供模板文本
pub trait TemplateSource {
    fn load(&self, name: &str) -> Result<String>;

    /// 模板是否存在
    fn contains(&self, name: &str) -> bool {
        self.load(name).is_ok()
    }
}

/// 从目录读取模板
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectorySource { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(ChainsError::Render(format!(
                "template name '{}' must be relative to the templates directory",
                name
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl TemplateSource for DirectorySource {
    fn load(&self, name: &str) -> Result<String> {
        let path = self.resolve(name)?;
        if !path.is_file() {
            return Err(ChainsError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        fs::read_to_string(&path).map_err(|e| ChainsError::read(&path, e))
    }

    fn contains(&self, name: &str) -> bool {
        self.resolve(name).map(|p| p.is_file()).unwrap_or(false)
    }
}

/// 内存中的模板集合，供测试使用
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    templates: HashMap<String, String>,
}

#[cfg(test)]
impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, text: &str) -> Self {
        self.insert(name, text);
        self
    }

    pub fn insert(&mut self, name: &str, text: &str) {
        self.templates.insert(name.to_string(), text.to_string());
    }
}

#[cfg(test)]
impl TemplateSource for MemorySource {
    fn load(&self, name: &str) -> Result<String> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| ChainsError::FileNotFound {
                path: format!("<memory>/{}", name),
            })
    }

    fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_directory_source() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("job.sh.tpl"), "#!/bin/bash\n").unwrap();
        let source = DirectorySource::new(dir.path());

        assert!(source.contains("job.sh.tpl"));
        assert_eq!(source.load("job.sh.tpl").unwrap(), "#!/bin/bash\n");
        assert!(!source.contains("missing.tpl"));
        assert!(source.load("missing.tpl").is_err());
        assert!(source.load("../job.sh.tpl").is_err());
    }

    #[test]
    fn test_memory_source() {
        let source = MemorySource::new().with("a", "hello");
        assert_eq!(source.load("a").unwrap(), "hello");
        assert!(source.load("b").is_err());
    }
}
