//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `batch/`, `registry/`, `utils/`
//! - 子模块: abin, control, launch

pub mod abin;
pub mod control;
pub mod launch;

use crate::cli::Commands;
use crate::error::Result;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Abin(args) => abin::execute(args),
        Commands::Control(args) => control::execute(args),
    }
}
