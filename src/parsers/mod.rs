//! # 工作项扫描器
//!
//! 从工作项文件中提取结构化数据。
//!
//! ## 依赖关系
//! - 被 `commands/`, `batch/driver.rs` 使用
//! - 使用 `models/` 数据模型
//! - 子模块: xyz, states

pub mod states;
pub mod xyz;

use crate::error::Result;
use crate::models::{Workload, WorkloadKind};
use std::path::Path;

pub use states::scan_states;
pub use xyz::scan_xyz;

/// 扫描函数签名
pub type ScanFn = fn(&Path, &[String]) -> Result<Workload>;

/// 各工作负载类型对应的扫描函数
pub fn scanner_for(kind: WorkloadKind) -> ScanFn {
    match kind {
        WorkloadKind::Molecule => scan_xyz,
        WorkloadKind::States => scan_states,
    }
}
