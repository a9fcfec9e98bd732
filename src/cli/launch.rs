//! # 投递参数
//!
//! `abin` 与 `control` 子命令共用的参数块。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/launch.rs`

use clap::Args;
use std::path::PathBuf;

/// 投递参数
#[derive(Args, Debug, Clone)]
pub struct LaunchArgs {
    /// Work item file, or directory containing work item files
    #[arg(short, long)]
    pub items: PathBuf,

    /// Configuration file, or directory containing *.yml / *.yaml files
    #[arg(short, long)]
    pub config: PathBuf,

    /// Profile name within the cluster (e.g. 'orca')
    #[arg(short, long)]
    pub profile: String,

    /// Cluster name as defined in the clusters file
    #[arg(long, env = "CLUSTER_NAME")]
    pub cluster: String,

    /// Output directory where one job directory per combination is created
    #[arg(short, long)]
    pub out_dir: PathBuf,

    // ─────────────────────────────────────────────────────────────
    // Configuration sources
    // ─────────────────────────────────────────────────────────────
    /// YAML file describing clusters and profiles
    #[arg(long, env = "CHAINS_CLUSTERS_FILE", default_value = "configs/clusters.yml")]
    pub clusters_file: PathBuf,

    /// Directory containing the template files
    #[arg(long, env = "CHAINS_TEMPLATES_DIR", default_value = "templates")]
    pub templates_dir: PathBuf,

    /// Periodic table YAML ([{symbol, number}]); built-in table if omitted
    #[arg(long)]
    pub elements: Option<PathBuf>,

    // ─────────────────────────────────────────────────────────────
    // Execution control
    // ─────────────────────────────────────────────────────────────
    /// Do not archive work item files after launching
    #[arg(long, default_value_t = false)]
    pub keep_items: bool,

    /// Do not archive configuration files after launching
    #[arg(long, default_value_t = false)]
    pub keep_configs: bool,

    /// Replace existing job directories
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,

    /// Write a log file inside each job directory
    #[arg(long, default_value_t = false)]
    pub log: bool,

    /// Render and write job directories without submitting or archiving
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Write a CSV summary with one row per combination
    #[arg(long)]
    pub summary_csv: Option<PathBuf>,
}
