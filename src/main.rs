//! # CHAINS - 计算化学作业批量投递工具
//!
//! 把一组工作项（分子几何或能级列表）与一组配置变体两两组合，
//! 为每个组合选择资源档位、渲染输入文件与作业脚本，并提交到集群调度器。
//!
//! ## 子命令
//! - `abin`    - 从头算作业（ORCA / Q-CHEM）
//! - `control` - 量子控制作业（QOCT-RA）
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── registry/  (集群与档案配置)
//!   │     ├── batch/     (组合遍历、提交、归档)
//!   │     ├── scaling/   (规模函数)
//!   │     ├── render/    (模板引擎与渲染函数)
//!   │     ├── parsers/   (工作项扫描器)
//!   │     └── models/    (数据模型)
//!   ├── utils/      (输出、进度条、日志)
//!   └── error.rs    (错误处理)
//! ```

mod batch;
mod cli;
mod commands;
mod error;
mod models;
mod parsers;
mod registry;
mod render;
mod scaling;
mod utils;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();
    utils::logging::init(cli.verbose);

    if let Err(e) = commands::run(cli.command) {
        tracing::error!(kind = %e.kind(), "launch aborted");
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
