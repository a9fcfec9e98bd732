//! # 批处理结果
//!
//! 记录每个 (工作项, 配置变体) 组合的最终状态、失败原因与归责对象，
//! 以及每个输入文件是否已归档。
//!
//! ## 依赖关系
//! - 被 `batch/driver.rs`, `commands/` 使用
//! - 使用 `csv` + `serde` 导出汇总表

use crate::error::{ChainsError, ErrorKind, Result};
use crate::models::stem_name;

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// 组合的处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Pending,
    Scaled,
    Rendered,
    Submitted,
    Archived,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Pending => "pending",
            Stage::Scaled => "scaled",
            Stage::Rendered => "rendered",
            Stage::Submitted => "submitted",
            Stage::Archived => "archived",
        };
        write!(f, "{}", name)
    }
}

/// 失败归咎于哪个输入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blame {
    Item,
    Config,
    Both,
}

impl Blame {
    pub fn item(self) -> bool {
        matches!(self, Blame::Item | Blame::Both)
    }

    pub fn config(self) -> bool {
        matches!(self, Blame::Config | Blame::Both)
    }
}

/// 组合失败信息
#[derive(Debug, Clone)]
pub struct Failure {
    /// 失败前到达的阶段
    pub stage: Stage,
    pub kind: ErrorKind,
    pub message: String,
    pub blame: Blame,
}

/// 单个组合的结果
#[derive(Debug, Clone)]
pub struct CombinationOutcome {
    pub item: String,
    pub config: String,
    /// 归档按路径判断，不同扩展名的同名文件互不影响
    pub item_path: PathBuf,
    pub config_path: PathBuf,
    /// 到达的最后阶段
    pub stage: Stage,
    pub scale_index: Option<f64>,
    pub tier: Option<String>,
    pub job_dir: Option<PathBuf>,
    pub failure: Option<Failure>,
    /// 不影响组合结果的问题，如日志写入失败
    pub warning: Option<String>,
}

impl CombinationOutcome {
    pub fn new(item_path: &Path, config_path: &Path) -> Self {
        CombinationOutcome {
            item: stem_name(item_path),
            config: stem_name(config_path),
            item_path: item_path.to_path_buf(),
            config_path: config_path.to_path_buf(),
            stage: Stage::Pending,
            scale_index: None,
            tier: None,
            job_dir: None,
            failure: None,
            warning: None,
        }
    }

    /// 失败是否归咎于该工作项文件
    pub fn blames_item(&self, path: &Path) -> bool {
        self.item_path == path && self.failure.as_ref().is_some_and(|f| f.blame.item())
    }

    /// 失败是否归咎于该配置文件
    pub fn blames_config(&self, path: &Path) -> bool {
        self.config_path == path && self.failure.as_ref().is_some_and(|f| f.blame.config())
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// 记录失败
    pub fn fail(mut self, err: ChainsError, blame: Blame) -> Self {
        self.failure = Some(Failure {
            stage: self.stage,
            kind: err.kind(),
            message: err.to_string(),
            blame,
        });
        self
    }
}

/// 输入文件的去向
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// 已移动到归档目录
    Archived(PathBuf),
    /// 按参数保留
    Kept,
    /// 有失败的组合，留在原处待检查
    Retained,
    /// 试运行，不归档
    DryRun,
    /// 归档时出错
    ArchiveFailed(String),
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disposition::Archived(path) => write!(f, "archived to {}", path.display()),
            Disposition::Kept => write!(f, "kept (requested)"),
            Disposition::Retained => write!(f, "left in place (failed combinations)"),
            Disposition::DryRun => write!(f, "left in place (dry run)"),
            Disposition::ArchiveFailed(reason) => write!(f, "archiving failed: {}", reason),
        }
    }
}

/// 输入文件状态
#[derive(Debug, Clone)]
pub struct InputStatus {
    pub name: String,
    pub path: PathBuf,
    pub disposition: Disposition,
}

/// 批处理结果统计
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<CombinationOutcome>,
    pub items: Vec<InputStatus>,
    pub configs: Vec<InputStatus>,
}

/// 汇总 CSV 的一行
#[derive(Debug, Serialize)]
struct SummaryRow<'a> {
    item: &'a str,
    config: &'a str,
    status: &'a str,
    stage: String,
    scale_index: String,
    tier: &'a str,
    job_dir: String,
    error_kind: String,
    message: &'a str,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &CombinationOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// 写出每个组合一行的汇总表
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;

        for o in &self.outcomes {
            let failure = o.failure.as_ref();
            wtr.serialize(SummaryRow {
                item: &o.item,
                config: &o.config,
                status: if failure.is_some() { "failed" } else { "ok" },
                stage: o.stage.to_string(),
                scale_index: o.scale_index.map(|i| i.to_string()).unwrap_or_default(),
                tier: o.tier.as_deref().unwrap_or(""),
                job_dir: o
                    .job_dir
                    .as_ref()
                    .map(|d| d.display().to_string())
                    .unwrap_or_default(),
                error_kind: failure.map(|f| f.kind.to_string()).unwrap_or_default(),
                message: failure.map(|f| f.message.as_str()).unwrap_or(""),
            })?;
        }

        wtr.flush().map_err(|e| ChainsError::write(path, e))?;
        Ok(())
    }
}
