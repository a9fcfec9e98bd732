//! # 工作项与配置变体数据模型
//!
//! 批处理的两类输入：工作项（几何结构、态列表）与配置变体（YAML 参数集），
//! 以及渲染产物。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `scaling/`, `batch/`, `render/functions.rs` 使用
//! - 使用 `render/value.rs` 保存配置内容

use crate::error::{ChainsError, Result};
use crate::render::Value;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// 工作负载类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    Molecule,
    States,
}

impl std::fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkloadKind::Molecule => write!(f, "molecule"),
            WorkloadKind::States => write!(f, "states"),
        }
    }
}

/// 分子几何信息
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Molecule {
    /// 元素 -> 原子数
    pub element_counts: BTreeMap<String, u64>,
    /// 原样保留的坐标行
    pub coordinates: Vec<String>,
}

impl Molecule {
    pub fn atom_count(&self) -> u64 {
        self.element_counts.values().sum()
    }
}

/// 量子态
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub number: u32,
    pub label: String,
    /// 能量 (Ha)
    pub energy: f64,
}

/// 扫描得到的结构化数据
#[derive(Debug, Clone, PartialEq)]
pub enum Workload {
    Molecule(Molecule),
    States(Vec<State>),
}

impl Workload {
    pub fn kind(&self) -> WorkloadKind {
        match self {
            Workload::Molecule(_) => WorkloadKind::Molecule,
            Workload::States(_) => WorkloadKind::States,
        }
    }

    /// 写入渲染上下文所需的字段
    pub fn context_entries(&self) -> Vec<(&'static str, Value)> {
        match self {
            Workload::Molecule(mol) => {
                let formula: BTreeMap<String, Value> = mol
                    .element_counts
                    .iter()
                    .map(|(el, n)| (el.clone(), Value::from(*n)))
                    .collect();
                vec![
                    ("coordinates", Value::from(mol.coordinates.clone())),
                    ("chemical_formula", Value::Map(formula)),
                    ("nb_atoms", Value::from(mol.atom_count())),
                ]
            }
            Workload::States(states) => {
                let list = states
                    .iter()
                    .map(|s| {
                        let mut m = BTreeMap::new();
                        m.insert("number".to_string(), Value::from(u64::from(s.number)));
                        m.insert("label".to_string(), Value::from(s.label.as_str()));
                        m.insert("energy".to_string(), Value::Float(s.energy));
                        Value::Map(m)
                    })
                    .collect();
                vec![
                    ("states", Value::List(list)),
                    ("nb_states", Value::from(states.len() as u64)),
                ]
            }
        }
    }
}

/// 从文件名去掉扩展名得到名称
pub fn stem_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// 工作项：一个几何文件或一个态列表文件
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub name: String,
    pub path: PathBuf,
    pub lines: Vec<String>,
    pub data: Workload,
}

impl WorkItem {
    /// 读取文件并用给定的扫描函数提取结构化数据
    pub fn load(path: &Path, scan: crate::parsers::ScanFn) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| ChainsError::read(path, e))?;
        let lines: Vec<String> = content.lines().map(str::to_string).collect();
        let data = scan(path, &lines)?;
        Ok(WorkItem {
            name: stem_name(path),
            path: path.to_path_buf(),
            lines,
            data,
        })
    }
}

/// 配置变体：一个 YAML 参数集
#[derive(Debug, Clone)]
pub struct ConfigVariant {
    pub name: String,
    pub path: PathBuf,
    pub values: BTreeMap<String, Value>,
}

impl ConfigVariant {
    /// 读取并解析 YAML 配置文件，顶层必须是映射
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| ChainsError::read(path, e))?;
        Self::from_yaml_str(path, &content)
    }

    pub fn from_yaml_str(path: &Path, content: &str) -> Result<Self> {
        let parse_error = |reason: String| ChainsError::ParseError {
            format: "YAML".to_string(),
            path: path.display().to_string(),
            reason,
        };

        let yaml: serde_yml::Value =
            serde_yml::from_str(content).map_err(|e| parse_error(e.to_string()))?;

        match Value::from_yaml(&yaml) {
            Value::Map(values) => Ok(ConfigVariant {
                name: stem_name(path),
                path: path.to_path_buf(),
                values,
            }),
            Value::None => Err(parse_error("configuration file is empty".to_string())),
            _ => Err(parse_error(
                "top level of a configuration file must be a mapping".to_string(),
            )),
        }
    }

    /// 取顶层块
    pub fn block(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

/// 渲染产物
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    pub filename: String,
    pub content: String,
}

impl RenderedArtifact {
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        RenderedArtifact {
            filename: filename.into(),
            content: content.into(),
        }
    }
}
