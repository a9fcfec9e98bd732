//! # XYZ 几何文件扫描
//!
//! ## 格式说明
//! ```text
//! 3                      # 原子数
//! water                  # 注释行
//! O   0.000000  0.000000  0.117300
//! H   0.000000  0.757200 -0.469200
//! H   0.000000 -0.757200 -0.469200
//! ```
//!
//! 从第三行起匹配坐标行，统计各元素原子数并原样保留坐标行。
//! 找到的坐标行数必须等于首行声明的原子数。
//!
//! ## 依赖关系
//! - 被 `commands/abin.rs` 使用
//! - 使用 `models/work.rs`

use crate::error::{ChainsError, Result};
use crate::models::{Molecule, Workload};

use regex::Regex;
use std::path::Path;

/// 扫描 XYZ 文件内容
pub fn scan_xyz(path: &Path, lines: &[String]) -> Result<Workload> {
    let parse_error = |reason: String| ChainsError::ParseError {
        format: "XYZ".to_string(),
        path: path.display().to_string(),
        reason,
    };

    let first = lines
        .first()
        .ok_or_else(|| parse_error("file is empty".to_string()))?;
    let declared: u64 = first.trim().parse().map_err(|_| {
        parse_error(format!(
            "first line must be the number of atoms, found '{}'",
            first.trim()
        ))
    })?;

    let pattern = Regex::new(r"^\s*([A-Za-z]{1,3})(?:\s+-?\d+\.\d+){3}\s*$")
        .map_err(|e| ChainsError::Lookup(e.to_string()))?;

    let mut mol = Molecule::default();
    for line in lines.iter().skip(2) {
        if let Some(caps) = pattern.captures(line) {
            let symbol = normalize_symbol(&caps[1]);
            *mol.element_counts.entry(symbol).or_insert(0) += 1;
            mol.coordinates.push(line.clone());
        }
    }

    let found = mol.coordinates.len() as u64;
    if found != declared {
        return Err(parse_error(format!(
            "number of atomic coordinates lines ({}) doesn't match the number of atoms in the first line ({})",
            found, declared
        )));
    }

    Ok(Workload::Molecule(mol))
}

/// 元素符号首字母大写，其余小写
fn normalize_symbol(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(c) => c.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_scan_propane() {
        let content = "11\npropane\n\
            C  -1.2700  0.2500  0.0000\n\
            C   0.0000 -0.5800  0.0000\n\
            C   1.2700  0.2500  0.0000\n\
            H  -1.2900  0.9000  0.8800\n\
            H  -1.2900  0.9000 -0.8800\n\
            H  -2.1600 -0.3900  0.0000\n\
            H   0.0000 -1.2300  0.8800\n\
            H   0.0000 -1.2300 -0.8800\n\
            h   1.2900  0.9000  0.8800\n\
            H   1.2900  0.9000 -0.8800\n\
            H   2.1600 -0.3900  0.0000\n";
        let Workload::Molecule(mol) = scan_xyz(Path::new("propane.xyz"), &lines(content)).unwrap()
        else {
            panic!("expected a molecule");
        };
        assert_eq!(mol.element_counts.get("C"), Some(&3));
        assert_eq!(mol.element_counts.get("H"), Some(&8));
        assert_eq!(mol.coordinates.len(), 11);
        assert_eq!(mol.coordinates[0], "C  -1.2700  0.2500  0.0000");
    }

    #[test]
    fn test_count_mismatch() {
        let content = "3\nwater\nO 0.0 0.0 0.1173\nH 0.0 0.7572 -0.4692\n";
        let err = scan_xyz(Path::new("w.xyz"), &lines(content)).unwrap_err();
        assert!(err.to_string().contains("(2)"));
    }

    #[test]
    fn test_bad_header() {
        assert!(scan_xyz(Path::new("a.xyz"), &lines("water\n\nO 0.0 0.0 0.0\n")).is_err());
        assert!(scan_xyz(Path::new("a.xyz"), &[]).is_err());
    }

    #[test]
    fn test_non_coordinate_lines_skipped() {
        let content = "1\ncomment O 1.0 2.0 3.0\nHe 0 0 0\nHe 0.0 0.0 0.0\n";
        let Workload::Molecule(mol) = scan_xyz(Path::new("he.xyz"), &lines(content)).unwrap()
        else {
            panic!("expected a molecule");
        };
        assert_eq!(mol.atom_count(), 1);
    }
}
