//! # abin 命令实现
//!
//! 工作项是 XYZ 几何文件，规模函数按分子计算（电子数或原子数）。
//!
//! ## 依赖关系
//! - 使用 `cli/launch.rs` 定义的参数
//! - 使用 `commands/launch.rs`

use super::launch;
use crate::cli::launch::LaunchArgs;
use crate::error::Result;
use crate::models::WorkloadKind;

/// 几何文件匹配模式
pub const ITEM_PATTERN: &str = "*.xyz";

/// 执行 abin 命令
pub fn execute(args: LaunchArgs) -> Result<()> {
    launch::execute(args, WorkloadKind::Molecule, ITEM_PATTERN)
}
