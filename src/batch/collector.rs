//! # 文件收集器
//!
//! 根据输入路径和模式收集待处理文件列表。
//!
//! ## 功能
//! - 支持单文件和目录输入
//! - glob 模式匹配（不区分大小写，逗号分隔多模式）
//! - 只扫描目录第一层，已归档的 `launched/` 子目录不会被再次收集
//! - 结果按路径排序，保证处理顺序可复现
//! - 检查同名不同扩展名的文件（作业目录按文件名主干命名，会互相冲突）
//!
//! ## 依赖关系
//! - 被 `commands/` 调用
//! - 使用 `walkdir` 遍历目录，`glob` 匹配文件名

use crate::error::{ChainsError, Result};
use crate::models::stem_name;

use glob::{MatchOptions, Pattern};
use std::collections::BTreeMap;
use std::path::PathBuf;
use walkdir::WalkDir;

/// 文件收集器
pub struct FileCollector {
    /// 输入路径
    input: PathBuf,
    /// 匹配模式列表
    patterns: Vec<String>,
}

impl FileCollector {
    /// 创建新的文件收集器
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            patterns: vec!["*".to_string()],
        }
    }

    /// 设置匹配模式（逗号分隔的多模式）
    pub fn with_pattern(mut self, pattern: &str) -> Self {
        self.patterns = pattern
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if self.patterns.is_empty() {
            self.patterns = vec!["*".to_string()];
        }
        self
    }

    /// 收集所有匹配的文件
    ///
    /// 单文件输入直接返回该文件，不做模式检查。
    pub fn collect(&self) -> Result<Vec<PathBuf>> {
        if self.input.is_file() {
            return Ok(vec![self.input.clone()]);
        }

        if !self.input.is_dir() {
            return Err(ChainsError::FileNotFound {
                path: self.input.display().to_string(),
            });
        }

        let patterns = self
            .patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| {
                    ChainsError::InvalidArgument(format!("Invalid pattern '{}': {}", p, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let options = MatchOptions {
            case_sensitive: false,
            require_literal_separator: false,
            require_literal_leading_dot: true,
        };

        let mut files: Vec<PathBuf> = WalkDir::new(&self.input)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.file_name()
                    .to_str()
                    .map(|name| patterns.iter().any(|p| p.matches_with(name, options)))
                    .unwrap_or(false)
            })
            .map(|e| e.path().to_path_buf())
            .collect();

        files.sort();
        Ok(files)
    }

    /// 收集文件，结果为空时报错
    pub fn collect_nonempty(&self) -> Result<Vec<PathBuf>> {
        let files = self.collect()?;
        if files.is_empty() {
            return Err(ChainsError::NoFilesFound {
                pattern: self.patterns.join(","),
                path: self.input.display().to_string(),
            });
        }
        Ok(files)
    }
}

/// 出现不止一次的文件名主干，按字母序
pub fn duplicate_stems(files: &[PathBuf]) -> Vec<String> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for file in files {
        *counts.entry(stem_name(file)).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(stem, _)| stem)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_collect_sorted_case_insensitive() {
        let dir = TempDir::new().unwrap();
        for name in ["b.xyz", "A.XYZ", "c.yml", "notes.txt"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("launched")).unwrap();
        fs::write(dir.path().join("launched").join("old.xyz"), "").unwrap();

        let files = FileCollector::new(dir.path()).with_pattern("*.xyz").collect().unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["A.XYZ", "b.xyz"]);

        let configs = FileCollector::new(dir.path())
            .with_pattern("*.yml, *.yaml")
            .collect()
            .unwrap();
        assert_eq!(configs.len(), 1);
    }

    #[test]
    fn test_single_file_and_missing() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("h2o.xyz");
        fs::write(&file, "").unwrap();
        assert_eq!(FileCollector::new(&file).collect().unwrap(), vec![file.clone()]);

        assert!(FileCollector::new(dir.path().join("nope")).collect().is_err());

        let err = FileCollector::new(dir.path())
            .with_pattern("*.states")
            .collect_nonempty()
            .unwrap_err();
        assert!(matches!(err, ChainsError::NoFilesFound { .. }));
    }

    #[test]
    fn test_duplicate_stems() {
        let dir = TempDir::new().unwrap();
        for name in ["a.yml", "a.yaml", "b.yml"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        let configs = FileCollector::new(dir.path())
            .with_pattern("*.yml,*.yaml")
            .collect()
            .unwrap();
        assert_eq!(configs.len(), 3);
        assert_eq!(duplicate_stems(&configs), vec!["a".to_string()]);
        assert!(duplicate_stems(&configs[2..]).is_empty());
    }
}
