//! # control 命令实现
//!
//! 工作项是能级列表文件（每行 `<编号> <标签> <能量>`），规模函数按能级数计算。
//!
//! ## 依赖关系
//! - 使用 `cli/launch.rs` 定义的参数
//! - 使用 `commands/launch.rs`

use super::launch;
use crate::cli::launch::LaunchArgs;
use crate::error::Result;
use crate::models::WorkloadKind;

/// 能级列表匹配模式
pub const ITEM_PATTERN: &str = "*.states";

/// 执行 control 命令
pub fn execute(args: LaunchArgs) -> Result<()> {
    launch::execute(args, WorkloadKind::States, ITEM_PATTERN)
}
