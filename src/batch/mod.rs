//! # 批量处理模块
//!
//! 对 工作项 × 配置变体 的全部组合执行一次批量投递。
//!
//! ## 功能
//! - 收集输入文件列表
//! - 逐个组合计算规模、渲染、写作业目录、提交
//! - 失败隔离与输入归档
//! - 进度反馈与统计
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `indicatif` 显示进度，`csv` 导出汇总

pub mod collector;
pub mod driver;
pub mod report;
pub mod submit;

pub use collector::{duplicate_stems, FileCollector};
pub use driver::{Driver, DriverOptions};
pub use report::{BatchReport, Disposition, InputStatus};
pub use submit::ShellSubmitter;
