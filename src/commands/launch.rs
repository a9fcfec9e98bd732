//! # 投递流程
//!
//! `abin` 与 `control` 共用的投递实现。
//!
//! ## 流程
//! 1. 读取集群文件，定位 (集群, 档案)，校验工作负载类型与模板
//! 2. 收集工作项与配置变体
//! 3. 打印资源档位表
//! 4. 交给 `batch::Driver` 处理全部组合
//! 5. 打印每个输入文件的去向与统计，可选写出 CSV 汇总
//!
//! 这里的错误都是全局错误，直接返回给 `main.rs`；单个组合的失败由驱动器记录。
//!
//! ## 依赖关系
//! - 被 `commands/abin.rs`, `commands/control.rs` 调用
//! - 使用 `registry/`, `render/`, `scaling/`, `parsers/`, `batch/`, `utils/output.rs`
//! - 使用 `tabled` 打印档位表

use crate::batch::{
    duplicate_stems, BatchReport, Disposition, Driver, DriverOptions, FileCollector, InputStatus,
    ShellSubmitter,
};
use crate::cli::launch::LaunchArgs;
use crate::error::{ChainsError, Result};
use crate::models::{ResourceTable, WorkloadKind};
use crate::parsers;
use crate::registry::ProfileRegistry;
use crate::render::Renderer;
use crate::scaling::PeriodicTable;
use crate::utils::output;

use tabled::{Table, Tabled};

/// 配置变体文件的匹配模式
pub const CONFIG_PATTERN: &str = "*.yml,*.yaml";

/// 档位表的一行
#[derive(Debug, Clone, Tabled)]
struct TierRow {
    #[tabled(rename = "Scale limit")]
    scale_limit: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Partition")]
    partition: String,
    #[tabled(rename = "Walltime")]
    walltime: String,
    #[tabled(rename = "Cores")]
    cores: String,
    #[tabled(rename = "Mem/CPU (MB)")]
    mem_per_cpu: u64,
    #[tabled(rename = "Delay")]
    delay: String,
}

fn tier_rows(table: &ResourceTable) -> Vec<TierRow> {
    table
        .tiers()
        .iter()
        .map(|t| TierRow {
            scale_limit: t.scale_limit.to_string(),
            label: t.label.clone(),
            partition: t.partition.clone().unwrap_or_else(|| "-".to_string()),
            walltime: t.walltime.to_string(),
            cores: t.cores.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
            mem_per_cpu: t.mem_per_cpu,
            delay: t.delay_command.clone().unwrap_or_else(|| "-".to_string()),
        })
        .collect()
}

/// 执行一次投递
pub fn execute(args: LaunchArgs, kind: WorkloadKind, item_pattern: &str) -> Result<()> {
    output::print_header(&format!("CHAINS {} launch", kind));

    // 配置与档案
    let registry = ProfileRegistry::load(&args.clusters_file)?;
    let profile = registry.lookup(&args.cluster, &args.profile)?;
    profile.check_kind(kind)?;

    if !args.templates_dir.is_dir() {
        return Err(ChainsError::DirectoryNotFound {
            path: args.templates_dir.display().to_string(),
        });
    }
    let renderer = Renderer::from_dir(&args.templates_dir);
    profile.check_templates(&renderer)?;

    let table = match &args.elements {
        Some(path) => PeriodicTable::from_yaml_file(path)?,
        None => PeriodicTable::default(),
    };

    // 输入
    let items = FileCollector::new(&args.items)
        .with_pattern(item_pattern)
        .collect_nonempty()?;
    let configs = FileCollector::new(&args.config)
        .with_pattern(CONFIG_PATTERN)
        .collect_nonempty()?;
    for stem in duplicate_stems(&items).iter().chain(&duplicate_stems(&configs)) {
        output::print_warning(&format!(
            "Several input files share the name '{}'; their job directories will collide",
            stem
        ));
    }

    if !args.out_dir.is_dir() {
        return Err(ChainsError::DirectoryNotFound {
            path: args.out_dir.display().to_string(),
        });
    }

    output::print_info(&format!(
        "Cluster '{}', profile '{}' ({} -> {})",
        profile.cluster, profile.profile, profile.scaling.name, profile.rendering.name
    ));
    output::print_info(&format!(
        "{} work item(s) x {} configuration(s) = {} combination(s)",
        items.len(),
        configs.len(),
        items.len() * configs.len()
    ));
    if args.dry_run {
        output::print_warning("Dry run: nothing will be submitted or archived");
    }
    println!("{}", Table::new(tier_rows(&profile.resources)));
    output::print_separator();

    tracing::info!(
        cluster = %profile.cluster,
        profile = %profile.profile,
        items = items.len(),
        configs = configs.len(),
        "launch started"
    );

    let submitter = ShellSubmitter;
    let driver = Driver {
        profile,
        renderer: &renderer,
        table: &table,
        submitter: &submitter,
        scan: parsers::scanner_for(kind),
        options: DriverOptions {
            out_dir: args.out_dir.clone(),
            keep_items: args.keep_items,
            keep_configs: args.keep_configs,
            overwrite: args.overwrite,
            write_log: args.log,
            dry_run: args.dry_run,
        },
    };
    let report = driver.run(&items, &configs);

    print_dispositions("Work items", &report.items);
    print_dispositions("Configurations", &report.configs);

    if let Some(path) = &args.summary_csv {
        report.write_csv(path)?;
        output::print_success(&format!("Summary saved to '{}'", path.display()));
    }

    print_totals(&report);
    Ok(())
}

fn print_dispositions(title: &str, inputs: &[InputStatus]) {
    output::print_header(title);
    for input in inputs {
        let line = format!("{}: {}", input.path.display(), input.disposition);
        match input.disposition {
            Disposition::Archived(_) => output::print_success(&line),
            Disposition::Kept | Disposition::DryRun => output::print_skip(&line),
            Disposition::Retained => output::print_warning(&line),
            Disposition::ArchiveFailed(_) => output::print_error(&line),
        }
    }
}

fn print_totals(report: &BatchReport) {
    output::print_separator();
    if report.failed() > 0 {
        output::print_warning(&format!(
            "{} combination(s) failed, see messages above",
            report.failed()
        ));
    }
    output::print_done(&format!(
        "{} combination(s): {} succeeded, {} failed",
        report.total(),
        report.succeeded(),
        report.failed()
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResourceTier, Walltime};
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn project_root() -> &'static Path {
        Path::new(env!("CARGO_MANIFEST_DIR"))
    }

    /// 把演示输入复制到临时目录
    fn copy_inputs(from: &Path, to: &Path) {
        fs::create_dir_all(to).unwrap();
        for entry in fs::read_dir(from).unwrap() {
            let path = entry.unwrap().path();
            fs::copy(&path, to.join(path.file_name().unwrap())).unwrap();
        }
    }

    fn dry_run_args(items: PathBuf, config: PathBuf, cluster: &str, profile: &str, out: PathBuf) -> LaunchArgs {
        LaunchArgs {
            items,
            config,
            profile: profile.to_string(),
            cluster: cluster.to_string(),
            out_dir: out,
            clusters_file: project_root().join("configs/clusters.yml"),
            templates_dir: project_root().join("templates"),
            elements: None,
            keep_items: false,
            keep_configs: false,
            overwrite: false,
            log: true,
            dry_run: true,
            summary_csv: None,
        }
    }

    #[test]
    fn test_tier_rows() {
        let table = ResourceTable::new(vec![
            ResourceTier::new("large", 1000.0, Walltime::parse("2-00:00:00").unwrap(), None, 4000)
                .unwrap()
                .with_partition("batch"),
            ResourceTier::new("tiny", 50.0, Walltime::parse("00:10:00").unwrap(), Some(1), 1000)
                .unwrap(),
        ])
        .unwrap();

        let rows = tier_rows(&table);
        assert_eq!(rows[0].label, "tiny");
        assert_eq!(rows[0].partition, "-");
        assert_eq!(rows[0].cores, "1");
        assert_eq!(rows[1].walltime, "2-00:00:00");
        assert_eq!(rows[1].cores, "-");

        let rendered = Table::new(rows).to_string();
        assert!(rendered.contains("Mem/CPU (MB)"));
        assert!(rendered.contains("batch"));
    }

    #[test]
    fn test_abin_dry_run_with_shipped_profiles() {
        let dir = TempDir::new().unwrap();
        let geoms = dir.path().join("geoms");
        let configs = dir.path().join("configs");
        let out = dir.path().join("out");
        copy_inputs(&project_root().join("demos/abin/geoms"), &geoms);
        copy_inputs(&project_root().join("demos/abin/configs"), &configs);
        fs::create_dir_all(&out).unwrap();

        let mut args = dry_run_args(geoms.clone(), configs, "lemaitre3", "orca", out.clone());
        args.summary_csv = Some(dir.path().join("summary.csv"));
        execute(args, WorkloadKind::Molecule, "*.xyz").unwrap();

        let inp = fs::read_to_string(out.join("h2o_b3lyp").join("h2o.inp")).unwrap();
        assert!(inp.starts_with("! B3LYP def2-SVP TightSCF\n%maxcore 375\n%pal\n  nprocs 4\nend\n"));
        assert!(inp.contains("* xyz 0 1\nO    0.000000"));

        let script = fs::read_to_string(out.join("ch4_pbe0_tddft").join("orca_job.sh")).unwrap();
        assert!(script.contains("#SBATCH --time=0-00:10:00\n"));
        assert!(script.contains("module load ORCA/4.2.1-gompi-2019b\n"));
        assert!(script.contains("orca ch4.inp > ch4.out\n"));
        assert!(!script.contains("--partition"));

        // 试运行不归档
        assert!(geoms.join("h2o.xyz").is_file());
        let summary = fs::read_to_string(dir.path().join("summary.csv")).unwrap();
        assert_eq!(summary.lines().count(), 5);
    }

    #[test]
    fn test_control_dry_run_with_shipped_profiles() {
        let dir = TempDir::new().unwrap();
        let states = dir.path().join("states");
        let out = dir.path().join("out");
        copy_inputs(&project_root().join("demos/control/states"), &states);
        fs::create_dir_all(&out).unwrap();

        let args = dry_run_args(
            states,
            project_root().join("demos/control/configs"),
            "dragon2",
            "qoctra",
            out.clone(),
        );
        execute(args, WorkloadKind::States, "*.states").unwrap();

        let job_dir = out.join("h2o_qoctra_scan");
        let names = fs::read_to_string(job_dir.join("input_filenames.txt")).unwrap();
        assert_eq!(names.lines().count(), 4);
        assert!(job_dir.join("param_alpha0.001_dur5.nml").is_file());
        let script = fs::read_to_string(job_dir.join("qoctra_job.sh")).unwrap();
        assert!(script.contains("#SBATCH --array=0-3\n"));
        let energies = fs::read_to_string(job_dir.join("energies")).unwrap();
        assert_eq!(energies.lines().count(), 4);
    }

    #[test]
    fn test_wrong_workload_kind_is_global_error() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();
        let args = dry_run_args(
            project_root().join("demos/control/states"),
            project_root().join("demos/control/configs"),
            "dragon2",
            "orca",
            out,
        );
        let err = execute(args, WorkloadKind::States, "*.states").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }
}
