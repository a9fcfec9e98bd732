//! # 态列表文件扫描
//!
//! ## 格式说明
//! ```text
//! # number  label  energy (Ha)
//! 0   S0   0.000000
//! 1   S1   0.152300
//! 2   T1   0.121800
//! ```
//!
//! 空行与 `#` 开头的行忽略。编号须从首个值起连续递增，至少一个态。
//!
//! ## 依赖关系
//! - 被 `commands/control.rs` 使用
//! - 使用 `models/work.rs`

use crate::error::{ChainsError, Result};
use crate::models::{State, Workload};

use std::path::Path;

/// 扫描态列表文件内容
pub fn scan_states(path: &Path, lines: &[String]) -> Result<Workload> {
    let parse_error = |line_no: usize, reason: String| ChainsError::ParseError {
        format: "states".to_string(),
        path: path.display().to_string(),
        reason: if line_no > 0 {
            format!("line {}: {}", line_no, reason)
        } else {
            reason
        },
    };

    let mut states: Vec<State> = Vec::new();

    for (i, raw) in lines.iter().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 3 {
            return Err(parse_error(
                i + 1,
                format!("expected '<number> <label> <energy>', found '{}'", line),
            ));
        }

        let number: u32 = fields[0]
            .parse()
            .map_err(|_| parse_error(i + 1, format!("invalid state number '{}'", fields[0])))?;
        let energy: f64 = fields[2]
            .replace(['d', 'D'], "e")
            .parse()
            .map_err(|_| parse_error(i + 1, format!("invalid energy '{}'", fields[2])))?;

        if let Some(prev) = states.last() {
            if prev.number.checked_add(1) != Some(number) {
                return Err(parse_error(
                    i + 1,
                    format!(
                        "state numbers must be consecutive, {} follows {}",
                        number, prev.number
                    ),
                ));
            }
        }

        states.push(State {
            number,
            label: fields[1].to_string(),
            energy,
        });
    }

    if states.is_empty() {
        return Err(parse_error(0, "no states found".to_string()));
    }

    Ok(Workload::States(states))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_scan_states() {
        let content = "# number label energy\n0 S0 0.0\n\n1 S1 0.1523\n2 T1 1.218d-1\n";
        let Workload::States(states) = scan_states(Path::new("c2h4.states"), &lines(content)).unwrap()
        else {
            panic!("expected states");
        };
        assert_eq!(states.len(), 3);
        assert_eq!(states[1].label, "S1");
        assert!((states[2].energy - 0.1218).abs() < 1e-12);
    }

    #[test]
    fn test_non_consecutive() {
        let err = scan_states(Path::new("a.states"), &lines("0 S0 0.0\n2 S1 0.1\n")).unwrap_err();
        assert!(err.to_string().contains("line 2"));

        // 最大编号之后不能再有状态
        let err = scan_states(Path::new("a.states"), &lines("4294967295 S0 0.0\n0 S1 0.1\n")).unwrap_err();
        assert!(matches!(err, ChainsError::ParseError { .. }));
        assert!(err.to_string().contains("follows 4294967295"));
    }

    #[test]
    fn test_malformed_and_empty() {
        assert!(scan_states(Path::new("a.states"), &lines("0 S0\n")).is_err());
        assert!(scan_states(Path::new("a.states"), &lines("x S0 0.0\n")).is_err());
        assert!(scan_states(Path::new("a.states"), &lines("0 S0 abc\n")).is_err());
        assert!(scan_states(Path::new("a.states"), &lines("# nothing\n\n")).is_err());
    }
}
