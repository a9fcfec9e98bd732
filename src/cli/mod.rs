//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `abin`: 从 XYZ 几何文件生成并提交从头算作业
//! - `control`: 从能级列表生成并提交量子控制作业
//!
//! 两个子命令共用 `launch::LaunchArgs`。
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: launch

pub mod launch;

use clap::{ArgAction, Parser, Subcommand};

/// CHAINS - 计算化学作业批量投递工具
#[derive(Parser)]
#[command(name = "chains")]
#[command(version)]
#[command(about = "Batch builder and launcher for computational chemistry jobs", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Build and submit ab initio jobs from XYZ geometry files
    Abin(launch::LaunchArgs),

    /// Build and submit quantum control jobs from states listings
    Control(launch::LaunchArgs),
}
