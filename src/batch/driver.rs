//! # 批处理驱动器
//!
//! 遍历 工作项 × 配置变体 的全部组合，按工作项为主序、配置为次序处理。
//!
//! ## 组合状态机
//! ```text
//! Pending -> Scaled -> Rendered -> Submitted -> Archived
//!    \_________\__________\___________\______-> Failed
//! ```
//! - Pending→Scaled：读取并扫描工作项，计算规模指数，选择资源档位
//! - Scaled→Rendered：组装渲染上下文，调用档案的渲染函数
//! - Rendered→Submitted：创建作业目录，写入输入副本与渲染产物，调用提交命令
//!
//! 任何一步失败只放弃当前组合，继续处理下一个组合。
//!
//! ## 归档规则
//! 每次失败按出错位置归咎于工作项、配置或两者：
//! - 读取/扫描工作项、计算规模、选择档位失败：归咎工作项
//! - 解析配置失败：归咎配置
//! - 渲染、写目录、提交失败：两者都归咎
//! - 日志写入失败只记为警告，不归咎任何输入
//!
//! 归咎按完整路径匹配。全部组合处理完后，没有被归咎过的输入文件移动到同目录下的 `launched/`。
//!
//! ## 依赖关系
//! - 被 `commands/` 调用
//! - 使用 `registry/`, `scaling/`, `render/`, `parsers/`, `models/`
//! - 使用 `utils/progress.rs` 显示进度，`utils/output.rs` 输出每个组合的结果

use super::report::{
    BatchReport, Blame, CombinationOutcome, Disposition, InputStatus, Stage,
};
use super::submit::{Submission, Submitter};
use crate::error::{ChainsError, Result};
use crate::models::{stem_name, ConfigVariant, ResourceTier, WorkItem};
use crate::parsers::ScanFn;
use crate::registry::ProfileEntry;
use crate::render::functions::{RenderInput, RenderedSet};
use crate::render::{RenderContext, Renderer, Value};
use crate::scaling::PeriodicTable;
use crate::utils::{output, progress};

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// 归档子目录名
pub const ARCHIVE_DIR: &str = "launched";

/// 驱动器选项
#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub out_dir: PathBuf,
    pub keep_items: bool,
    pub keep_configs: bool,
    pub overwrite: bool,
    pub write_log: bool,
    pub dry_run: bool,
}

/// 批处理驱动器
pub struct Driver<'a> {
    pub profile: &'a ProfileEntry,
    pub renderer: &'a Renderer,
    pub table: &'a PeriodicTable,
    pub submitter: &'a dyn Submitter,
    pub scan: ScanFn,
    pub options: DriverOptions,
}

impl<'a> Driver<'a> {
    /// 处理全部组合并归档输入
    pub fn run(&self, items: &[PathBuf], configs: &[PathBuf]) -> BatchReport {
        let total = (items.len() * configs.len()) as u64;
        let pb = progress::create_progress_bar(total, "Launching");
        let mut report = BatchReport::default();

        for item_path in items {
            for config_path in configs {
                pb.set_message(format!("{} x {}", stem_name(item_path), stem_name(config_path)));
                let outcome = self.process(item_path, config_path);
                pb.suspend(|| print_outcome(self.profile, &outcome));
                report.outcomes.push(outcome);
                pb.inc(1);
            }
        }
        pb.finish_and_clear();

        report.items = items
            .iter()
            .map(|path| {
                let blamed = report.outcomes.iter().any(|o| o.blames_item(path));
                self.dispose(path, blamed, self.options.keep_items)
            })
            .collect();

        report.configs = configs
            .iter()
            .map(|path| {
                let blamed = report.outcomes.iter().any(|o| o.blames_config(path));
                self.dispose(path, blamed, self.options.keep_configs)
            })
            .collect();

        // 工作项与配置都已归档的组合进入 Archived
        for outcome in report
            .outcomes
            .iter_mut()
            .filter(|o| o.is_success() && o.stage == Stage::Submitted)
        {
            let item_done = report
                .items
                .iter()
                .any(|s| s.path == outcome.item_path && is_archived(s));
            let config_done = report
                .configs
                .iter()
                .any(|s| s.path == outcome.config_path && is_archived(s));
            if item_done && config_done {
                outcome.stage = Stage::Archived;
            }
        }

        report
    }

    /// 处理单个组合
    pub fn process(&self, item_path: &Path, config_path: &Path) -> CombinationOutcome {
        let mut outcome = CombinationOutcome::new(item_path, config_path);

        // Pending -> Scaled
        let item = match WorkItem::load(item_path, self.scan) {
            Ok(item) => item,
            Err(e) => return outcome.fail(e, Blame::Item),
        };
        let config = match ConfigVariant::load(config_path) {
            Ok(config) => config,
            Err(e) => return outcome.fail(e, Blame::Config),
        };

        let scale_index = match self.profile.scaling.compute(self.table, &item.data) {
            Ok(index) => index,
            Err(e) => return outcome.fail(e, Blame::Item),
        };
        outcome.scale_index = Some(scale_index);

        let tier = match self.profile.resources.select(scale_index) {
            Ok(tier) => tier,
            Err(e) => return outcome.fail(e, Blame::Item),
        };
        outcome.tier = Some(tier.label.clone());
        outcome.stage = Stage::Scaled;
        tracing::debug!(
            item = %item.name,
            config = %config.name,
            scale_index,
            tier = %tier.label,
            "combination scaled"
        );

        // Scaled -> Rendered
        let job_dir = self
            .options
            .out_dir
            .join(format!("{}_{}", item.name, config.name));
        let ctx = self.build_context(&item, &config, scale_index, tier, &job_dir);
        let rendered = match self.profile.rendering.render(&RenderInput {
            renderer: self.renderer,
            templates: &self.profile.templates,
            item: &item,
            config: &config,
            context: &ctx,
        }) {
            Ok(set) => set,
            Err(e) => return outcome.fail(e, Blame::Both),
        };
        outcome.stage = Stage::Rendered;

        // Rendered -> Submitted
        if let Err(e) = self.write_job_dir(&job_dir, &item, &config, &rendered) {
            return outcome.fail(e, Blame::Both);
        }
        outcome.job_dir = Some(job_dir.clone());

        let submission = Submission {
            submit_command: &self.profile.submit_command,
            delay_command: tier.delay_command.as_deref(),
            job_script: &rendered.job_script,
            job_dir: &job_dir,
        };

        let submit_result = if self.options.dry_run {
            Ok(None)
        } else {
            self.submitter.submit(&submission).map(Some)
        };

        // 先记录提交结果，日志写入失败不能掩盖已经发生的提交
        let log = self.options.write_log.then(|| {
            self.combination_log(&item, &config, scale_index, tier, &rendered, &submission, &submit_result)
        });
        let submit_error = match submit_result {
            Ok(Some(_)) => {
                outcome.stage = Stage::Submitted;
                None
            }
            Ok(None) => None,
            Err(e) => Some(e),
        };

        if let Some(log) = log {
            let log_path = job_dir.join(format!("{}_{}.log", item.name, config.name));
            if let Err(e) = fs::write(&log_path, log) {
                let err = ChainsError::write(&log_path, e);
                tracing::warn!(item = %item.name, config = %config.name, "{}", err);
                outcome.warning = Some(err.to_string());
            }
        }

        if let Some(e) = submit_error {
            return outcome.fail(e, Blame::Both);
        }

        outcome
    }

    /// 组装渲染上下文，后写入的键覆盖先写入的键
    fn build_context(
        &self,
        item: &WorkItem,
        config: &ConfigVariant,
        scale_index: f64,
        tier: &ResourceTier,
        job_dir: &Path,
    ) -> RenderContext {
        let profile = self.profile;
        let mut ctx = RenderContext::new();

        ctx.extend(profile.variables.iter().map(|(k, v)| (k.clone(), v.clone())));
        ctx.extend(config.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        ctx.extend(item.data.context_entries());

        let item_file = file_name(&item.path);
        let config_file = file_name(&config.path);
        ctx.insert("item_name", item.name.as_str());
        ctx.insert("mol_name", item.name.as_str());
        ctx.insert("source_name", item.name.as_str());
        ctx.insert("item_file", item_file);
        ctx.insert("config_name", config.name.as_str());
        ctx.insert("config_file", config_file);

        ctx.insert("scale_label", tier.label.as_str());
        ctx.insert("jobscale_label", tier.label.as_str());
        ctx.insert("scale_limit", tier.scale_limit);
        ctx.insert("job_walltime", tier.walltime.to_string());
        ctx.insert("job_cores", tier.cores);
        ctx.insert("job_mem_per_cpu", tier.mem_per_cpu);
        ctx.insert("job_memory", tier.total_memory());
        ctx.insert("partition", tier.partition.clone());
        ctx.insert("delay_command", tier.delay_command.clone());

        ctx.insert("cluster_name", profile.cluster.as_str());
        ctx.insert("profile", profile.profile.as_str());
        ctx.insert("prog", profile.profile.as_str());
        ctx.insert("prefix", format!("{}_{}", profile.profile, profile.cluster));
        ctx.insert("scaling_function", profile.scaling.name);
        ctx.insert("rendering_function", profile.rendering.name);
        ctx.insert("scale_index", scale_index);
        ctx.insert("set_env", Value::from(profile.set_env.clone()));
        ctx.insert("command", profile.command.as_str());
        ctx.insert("submit_command", profile.submit_command.as_str());
        ctx.insert("job_dir", job_dir.display().to_string());
        ctx.insert("out_dir", self.options.out_dir.display().to_string());

        tracing::trace!(keys = ctx.len(), "render context built");
        ctx
    }

    /// 新建作业目录并写入输入副本与渲染产物
    fn write_job_dir(
        &self,
        job_dir: &Path,
        item: &WorkItem,
        config: &ConfigVariant,
        rendered: &RenderedSet,
    ) -> Result<()> {
        if job_dir.exists() {
            if !self.options.overwrite {
                return Err(ChainsError::DirectoryExists {
                    path: job_dir.display().to_string(),
                });
            }
            fs::remove_dir_all(job_dir).map_err(|e| ChainsError::write(job_dir, e))?;
        }
        fs::create_dir_all(job_dir).map_err(|e| ChainsError::write(job_dir, e))?;

        for source in [&item.path, &config.path] {
            let target = job_dir.join(file_name(source));
            fs::copy(source, &target).map_err(|e| ChainsError::write(&target, e))?;
        }

        for artifact in &rendered.artifacts {
            let target = job_dir.join(&artifact.filename);
            fs::write(&target, &artifact.content).map_err(|e| ChainsError::write(&target, e))?;
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn combination_log(
        &self,
        item: &WorkItem,
        config: &ConfigVariant,
        scale_index: f64,
        tier: &ResourceTier,
        rendered: &RenderedSet,
        submission: &Submission<'_>,
        submit_result: &Result<Option<String>>,
    ) -> String {
        let profile = self.profile;
        let mut log = String::new();
        let _ = writeln!(log, "item:               {}", item.path.display());
        let _ = writeln!(log, "config:             {}", config.path.display());
        let _ = writeln!(log, "cluster:            {}", profile.cluster);
        let _ = writeln!(log, "profile:            {}", profile.profile);
        let _ = writeln!(log, "scaling function:   {}", profile.scaling.name);
        let _ = writeln!(log, "scale index:        {}", scale_index);
        let _ = writeln!(log, "tier:               {} (limit {})", tier.label, tier.scale_limit);
        let _ = writeln!(
            log,
            "  walltime:         {} ({} s)",
            tier.walltime,
            tier.walltime.as_seconds()
        );
        let _ = writeln!(
            log,
            "  cores:            {}",
            tier.cores.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string())
        );
        let _ = writeln!(log, "  mem per cpu (MB): {}", tier.mem_per_cpu);
        let _ = writeln!(
            log,
            "  partition:        {}",
            tier.partition.as_deref().unwrap_or("-")
        );
        let _ = writeln!(
            log,
            "  delay:            {}",
            tier.delay_command.as_deref().unwrap_or("-")
        );
        let _ = writeln!(log, "rendered files:");
        for artifact in &rendered.artifacts {
            let _ = writeln!(log, "  {}", artifact.filename);
        }
        let _ = writeln!(log, "job script:         {}", rendered.job_script);
        let _ = writeln!(log, "submit command:     {}", submission.command_line());
        let status = match submit_result {
            Ok(Some(msg)) if msg.is_empty() => "submitted".to_string(),
            Ok(Some(msg)) => format!("submitted ({})", msg),
            Ok(None) => "not submitted (dry run)".to_string(),
            Err(e) => format!("FAILED: {}", e),
        };
        let _ = writeln!(log, "submission:         {}", status);
        log
    }

    /// 决定输入文件的去向，需要时移动到归档目录
    fn dispose(&self, path: &Path, blamed: bool, keep: bool) -> InputStatus {
        let disposition = if blamed {
            Disposition::Retained
        } else if self.options.dry_run {
            Disposition::DryRun
        } else if keep {
            Disposition::Kept
        } else {
            match archive(path) {
                Ok(target) => Disposition::Archived(target),
                Err(e) => Disposition::ArchiveFailed(e.to_string()),
            }
        };

        InputStatus {
            name: stem_name(path),
            path: path.to_path_buf(),
            disposition,
        }
    }
}

fn is_archived(status: &InputStatus) -> bool {
    matches!(status.disposition, Disposition::Archived(_))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// 把文件移动到同目录下的 `launched/`，已存在的同名文件被替换
pub fn archive(path: &Path) -> Result<PathBuf> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let archive_dir = parent.join(ARCHIVE_DIR);
    fs::create_dir_all(&archive_dir).map_err(|e| ChainsError::write(&archive_dir, e))?;

    let target = archive_dir.join(file_name(path));
    if fs::rename(path, &target).is_err() {
        // 跨文件系统时退回到复制后删除
        fs::copy(path, &target).map_err(|e| ChainsError::write(&target, e))?;
        fs::remove_file(path).map_err(|e| ChainsError::write(path, e))?;
    }
    Ok(target)
}

fn print_outcome(profile: &ProfileEntry, outcome: &CombinationOutcome) {
    let label = format!("{} x {}", outcome.item, outcome.config);
    match &outcome.failure {
        None => {
            let tier = outcome.tier.as_deref().unwrap_or("-");
            let index = outcome.scale_index.map(|i| i.to_string()).unwrap_or_default();
            output::print_success(&format!(
                "{}: scale index {} -> tier '{}', {}",
                label, index, tier, outcome.stage
            ));
            if let Some(warning) = &outcome.warning {
                output::print_warning(&format!("{}: {}", label, warning));
            }
        }
        Some(f) => {
            tracing::warn!(
                cluster = %profile.cluster,
                profile = %profile.profile,
                item = %outcome.item,
                config = %outcome.config,
                stage = %f.stage,
                kind = %f.kind,
                "combination failed"
            );
            output::print_error(&format!(
                "{}: {} error after stage '{}': {}",
                label, f.kind, f.stage, f.message
            ));
        }
    }
}
