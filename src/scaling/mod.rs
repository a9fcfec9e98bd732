//! # 规模指数函数
//!
//! 把工作负载映射为一个非负标量，用于挑选资源档位。
//! 每个函数都是纯函数：输入周期表与工作负载，输出规模指数。
//!
//! 集群配置通过名称 (`scaling_function`) 选用，加载时校验名称存在且
//! 接受当前前端的工作负载类型。
//!
//! ## 依赖关系
//! - 被 `registry/`, `batch/driver.rs` 使用
//! - 使用 `models/work.rs`
//! - 使用 `periodic_table_on_an_enum` 提供内置原子序数

use crate::error::{ChainsError, Result};
use crate::models::{Workload, WorkloadKind};

use periodic_table_on_an_enum::Element;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// 周期表参考数据
#[derive(Debug, Clone)]
pub enum PeriodicTable {
    /// 内置元素表
    Builtin,
    /// 从文件加载的 符号 -> 原子序数
    Custom(HashMap<String, u32>),
}

/// 元素表文件中的一条记录，其余字段忽略
#[derive(Debug, Deserialize)]
struct ElementRecord {
    symbol: String,
    number: u32,
}

impl PeriodicTable {
    /// 读取 `[{symbol, number}, ...]` 格式的 YAML 元素表
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| ChainsError::read(path, e))?;
        Self::from_yaml_str(&content).map_err(|reason| ChainsError::ParseError {
            format: "elements YAML".to_string(),
            path: path.display().to_string(),
            reason,
        })
    }

    fn from_yaml_str(content: &str) -> std::result::Result<Self, String> {
        let records: Vec<ElementRecord> = serde_yml::from_str(content).map_err(|e| e.to_string())?;
        if records.is_empty() {
            return Err("no element records found".to_string());
        }
        let table = records
            .into_iter()
            .map(|r| (r.symbol.trim().to_string(), r.number))
            .collect();
        Ok(PeriodicTable::Custom(table))
    }

    /// 查询原子序数
    pub fn atomic_number(&self, symbol: &str) -> Option<u32> {
        match self {
            PeriodicTable::Builtin => {
                Element::from_symbol(symbol).map(|el| el.get_atomic_number() as u32)
            }
            PeriodicTable::Custom(table) => table.get(symbol).copied(),
        }
    }
}

impl Default for PeriodicTable {
    fn default() -> Self {
        PeriodicTable::Builtin
    }
}

type ScaleFn = fn(&PeriodicTable, &Workload) -> Result<f64>;

/// 已注册的规模指数函数
#[derive(Debug)]
pub struct ScalingFunction {
    pub name: &'static str,
    pub kind: WorkloadKind,
    compute: ScaleFn,
}

impl ScalingFunction {
    pub fn compute(&self, table: &PeriodicTable, workload: &Workload) -> Result<f64> {
        (self.compute)(table, workload)
    }
}

static SCALING_FUNCTIONS: &[ScalingFunction] = &[
    ScalingFunction {
        name: "total_nb_elec",
        kind: WorkloadKind::Molecule,
        compute: total_nb_elec,
    },
    ScalingFunction {
        name: "total_nb_atoms",
        kind: WorkloadKind::Molecule,
        compute: total_nb_atoms,
    },
    ScalingFunction {
        name: "nb_states",
        kind: WorkloadKind::States,
        compute: nb_states,
    },
];

/// 按名称查找
pub fn lookup(name: &str) -> Option<&'static ScalingFunction> {
    SCALING_FUNCTIONS.iter().find(|f| f.name == name)
}

/// 全部已注册名称
pub fn names() -> Vec<&'static str> {
    SCALING_FUNCTIONS.iter().map(|f| f.name).collect()
}

fn wrong_kind(name: &str, workload: &Workload) -> ChainsError {
    ChainsError::Lookup(format!(
        "scaling function '{}' cannot handle a {} workload",
        name,
        workload.kind()
    ))
}

/// 总电子数：Σ 原子数 × 原子序数
pub fn total_nb_elec(table: &PeriodicTable, workload: &Workload) -> Result<f64> {
    let Workload::Molecule(mol) = workload else {
        return Err(wrong_kind("total_nb_elec", workload));
    };

    let mut total = 0u64;
    for (symbol, count) in &mol.element_counts {
        let z = table
            .atomic_number(symbol)
            .ok_or_else(|| ChainsError::UnknownElement {
                symbol: symbol.clone(),
            })?;
        total += count * u64::from(z);
    }
    Ok(total as f64)
}

/// 总原子数，不使用周期表
pub fn total_nb_atoms(_table: &PeriodicTable, workload: &Workload) -> Result<f64> {
    match workload {
        Workload::Molecule(mol) => Ok(mol.atom_count() as f64),
        other => Err(wrong_kind("total_nb_atoms", other)),
    }
}

/// 态的数目
pub fn nb_states(_table: &PeriodicTable, workload: &Workload) -> Result<f64> {
    match workload {
        Workload::States(states) => Ok(states.len() as f64),
        other => Err(wrong_kind("nb_states", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Molecule;

    fn molecule(counts: &[(&str, u64)]) -> Workload {
        let mut mol = Molecule::default();
        for (el, n) in counts {
            mol.element_counts.insert(el.to_string(), *n);
        }
        Workload::Molecule(mol)
    }

    fn table(entries: &[(&str, u32)]) -> PeriodicTable {
        PeriodicTable::Custom(entries.iter().map(|(s, z)| (s.to_string(), *z)).collect())
    }

    #[test]
    fn test_total_nb_elec_example() {
        let t = table(&[("H", 1), ("C", 6)]);
        let index = total_nb_elec(&t, &molecule(&[("H", 8), ("C", 3)])).unwrap();
        assert_eq!(index, 26.0);

        let index = total_nb_elec(&PeriodicTable::Builtin, &molecule(&[("C", 3), ("H", 8)])).unwrap();
        assert_eq!(index, 26.0);
    }

    #[test]
    fn test_total_nb_elec_additive() {
        let t = PeriodicTable::Builtin;
        let a = molecule(&[("H", 2), ("O", 1)]);
        let b = molecule(&[("Fe", 1), ("C", 4)]);
        let union = molecule(&[("H", 2), ("O", 1), ("Fe", 1), ("C", 4)]);
        assert_eq!(
            total_nb_elec(&t, &union).unwrap(),
            total_nb_elec(&t, &a).unwrap() + total_nb_elec(&t, &b).unwrap()
        );
    }

    #[test]
    fn test_unknown_element() {
        let t = table(&[("H", 1)]);
        let err = total_nb_elec(&t, &molecule(&[("H", 2), ("Xx", 1)])).unwrap_err();
        match err {
            ChainsError::UnknownElement { symbol } => assert_eq!(symbol, "Xx"),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(total_nb_elec(&PeriodicTable::Builtin, &molecule(&[("Qq", 1)])).is_err());
    }

    #[test]
    fn test_empty_workload_is_zero() {
        let empty = molecule(&[]);
        assert_eq!(total_nb_elec(&PeriodicTable::Builtin, &empty).unwrap(), 0.0);
        assert_eq!(total_nb_atoms(&PeriodicTable::Builtin, &empty).unwrap(), 0.0);
        assert_eq!(nb_states(&PeriodicTable::Builtin, &Workload::States(vec![])).unwrap(), 0.0);
    }

    #[test]
    fn test_total_nb_atoms_ignores_table() {
        let w = molecule(&[("H", 8), ("C", 3), ("Zz", 2)]);
        let garbage = table(&[("H", 999)]);
        assert_eq!(total_nb_atoms(&garbage, &w).unwrap(), 13.0);
        assert_eq!(total_nb_atoms(&PeriodicTable::Custom(HashMap::new()), &w).unwrap(), 13.0);
    }

    #[test]
    fn test_registry() {
        assert_eq!(lookup("nb_states").map(|f| f.kind), Some(WorkloadKind::States));
        assert!(lookup("total_nb_orbitals").is_none());
        assert_eq!(names(), vec!["total_nb_elec", "total_nb_atoms", "nb_states"]);
        assert!(nb_states(&PeriodicTable::Builtin, &molecule(&[("H", 1)])).is_err());
    }

    #[test]
    fn test_periodic_table_from_yaml() {
        let t = PeriodicTable::from_yaml_str(
            "- symbol: H\n  number: 1\n  name: Hydrogen\n- symbol: C\n  number: 6\n",
        )
        .unwrap();
        assert_eq!(t.atomic_number("C"), Some(6));
        assert_eq!(t.atomic_number("O"), None);
        assert!(PeriodicTable::from_yaml_str("[]").is_err());
        assert!(PeriodicTable::from_yaml_str("symbol: H").is_err());
    }
}
