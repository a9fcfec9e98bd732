//! # 渲染函数注册表
//!
//! 每个程序一个渲染函数，决定要渲染哪些模板、产物文件名以及额外的上下文字段。
//! 集群配置里通过名称 (`rendering_function`) 选用，加载时校验名称与模板角色。
//!
//! ## 依赖关系
//! - 被 `registry/`, `batch/driver.rs` 使用
//! - 使用 `render/mod.rs`, `models/work.rs`

use super::{RenderContext, Renderer, Value};
use crate::error::{ChainsError, Result};
use crate::models::{ConfigVariant, RenderedArtifact, WorkItem, Workload, WorkloadKind};

use std::collections::BTreeMap;

/// 原子时间单位 (s)
const ATOMIC_UNIT_OF_TIME: f64 = 2.418_884_326_585_7e-17;

/// 渲染函数的输入
pub struct RenderInput<'a> {
    pub renderer: &'a Renderer,
    /// 模板角色 -> 模板名
    pub templates: &'a BTreeMap<String, String>,
    pub item: &'a WorkItem,
    pub config: &'a ConfigVariant,
    /// 由驱动器组装的基础上下文
    pub context: &'a RenderContext,
}

impl<'a> RenderInput<'a> {
    fn render_role(&self, role: &str, ctx: &RenderContext) -> Result<String> {
        let name = self.templates.get(role).ok_or_else(|| {
            ChainsError::Render(format!("no template declared for role '{}'", role))
        })?;
        self.renderer.render(name, ctx)
    }

    /// 配置变体中的程序块，缺失即渲染错误
    fn program_block(&self, key: &str) -> Result<&'a BTreeMap<String, Value>> {
        match self.config.block(key) {
            Some(Value::Map(block)) => Ok(block),
            Some(other) => Err(ChainsError::Render(format!(
                "'{}' block of configuration '{}' must be a mapping, found {}",
                key,
                self.config.name,
                other.type_name()
            ))),
            None => Err(ChainsError::Render(format!(
                "configuration '{}' has no '{}' block",
                self.config.name, key
            ))),
        }
    }
}

/// 渲染结果：全部产物及其中作为作业脚本的文件名
#[derive(Debug, Clone)]
pub struct RenderedSet {
    pub artifacts: Vec<RenderedArtifact>,
    pub job_script: String,
}

type RenderFn = fn(&RenderInput<'_>) -> Result<RenderedSet>;

/// 已注册的渲染函数
#[derive(Debug)]
pub struct RenderingFunction {
    pub name: &'static str,
    /// 接受的工作负载类型
    pub kind: WorkloadKind,
    /// 必需的模板角色
    pub roles: &'static [&'static str],
    render: RenderFn,
}

impl RenderingFunction {
    pub fn render(&self, input: &RenderInput<'_>) -> Result<RenderedSet> {
        (self.render)(input)
    }
}

static RENDERING_FUNCTIONS: &[RenderingFunction] = &[
    RenderingFunction {
        name: "orca_render",
        kind: WorkloadKind::Molecule,
        roles: &["input", "job_script"],
        render: orca_render,
    },
    RenderingFunction {
        name: "qchem_render",
        kind: WorkloadKind::Molecule,
        roles: &["input", "job_script"],
        render: qchem_render,
    },
    RenderingFunction {
        name: "qoctra_render",
        kind: WorkloadKind::States,
        roles: &["param", "job_script"],
        render: qoctra_render,
    },
];

/// 按名称查找
pub fn lookup(name: &str) -> Option<&'static RenderingFunction> {
    RENDERING_FUNCTIONS.iter().find(|f| f.name == name)
}

/// 全部已注册名称
pub fn names() -> Vec<&'static str> {
    RENDERING_FUNCTIONS.iter().map(|f| f.name).collect()
}

fn orca_render(input: &RenderInput<'_>) -> Result<RenderedSet> {
    input.program_block("orca")?;

    let job_script = "orca_job.sh".to_string();
    let mem_per_cpu = input
        .context
        .get("job_mem_per_cpu")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    let mut ctx = input.context.clone();
    // ORCA 建议 %maxcore 取物理内存的 75 %
    ctx.insert("orca_mem_per_cpu", (0.75 * mem_per_cpu).floor() as i64);
    ctx.insert("job_manifest", job_script.as_str());

    let input_file = format!("{}.inp", input.item.name);
    let artifacts = vec![
        RenderedArtifact::new(input_file, input.render_role("input", &ctx)?),
        RenderedArtifact::new(job_script.as_str(), input.render_role("job_script", &ctx)?),
    ];

    Ok(RenderedSet {
        artifacts,
        job_script,
    })
}

fn qchem_render(input: &RenderInput<'_>) -> Result<RenderedSet> {
    input.program_block("qchem")?;

    let job_script = "qchem_job.sh".to_string();
    let mut ctx = input.context.clone();
    ctx.insert("job_manifest", job_script.as_str());

    let input_file = format!("{}.in", input.item.name);
    let artifacts = vec![
        RenderedArtifact::new(input_file, input.render_role("input", &ctx)?),
        RenderedArtifact::new(job_script.as_str(), input.render_role("job_script", &ctx)?),
    ];

    Ok(RenderedSet {
        artifacts,
        job_script,
    })
}

fn qoctra_render(input: &RenderInput<'_>) -> Result<RenderedSet> {
    let qoctra = input.program_block("qoctra")?;

    let Workload::States(states) = &input.item.data else {
        return Err(ChainsError::Render(format!(
            "qoctra_render needs a states listing, '{}' is a {}",
            input.item.name,
            input.item.data.kind()
        )));
    };

    let job_script = "qoctra_job.sh".to_string();
    let energies_file = "energies";
    let input_names = "input_filenames.txt";
    let prefix_param = "param_";

    let time_step = qoctra
        .get("control")
        .and_then(|c| c.get("time_step"))
        .and_then(Value::as_f64);

    let mut ctx = input.context.clone();
    ctx.insert("energies_file_path", energies_file);
    ctx.insert("input_names", input_names);
    ctx.insert("prefix_param", prefix_param);
    ctx.insert("job_manifest", job_script.as_str());
    if let Some(step) = time_step {
        ctx.insert("time_step", fortran_float(step));
    }

    let mut artifacts = Vec::new();
    let mut filenames = Vec::new();

    match input.config.block("parameters") {
        Some(params) => {
            let alphas = number_list(params, "alpha", &input.config.name)?;
            let durations = number_list(params, "duration", &input.config.name)?;

            for alpha in &alphas {
                for duration in &durations {
                    let mut param_ctx = ctx.clone();
                    param_ctx.insert("alpha", fortran_float(alpha.as_f64().unwrap_or(0.0)));
                    param_ctx.insert("duration", duration.clone());
                    if let (Some(step), Some(dur)) = (time_step, duration.as_f64()) {
                        let nb_steps = (dur * 1e-12 / ATOMIC_UNIT_OF_TIME / step).round();
                        param_ctx.insert("nb_steps", nb_steps as i64);
                    }

                    let filename = format!("{}alpha{}_dur{}.nml", prefix_param, alpha, duration);
                    let content = input.render_role("param", &param_ctx)?;
                    artifacts.push(RenderedArtifact::new(filename.as_str(), content));
                    filenames.push(filename);
                }
            }
        }
        None => {
            let filename = "param.nml".to_string();
            artifacts.push(RenderedArtifact::new(
                filename.as_str(),
                input.render_role("param", &ctx)?,
            ));
            filenames.push(filename);
        }
    }

    // 作业数组从 0 开始编号
    ctx.insert("array_size", filenames.len() as i64 - 1);
    ctx.insert("param_files", Value::from(filenames.clone()));

    artifacts.push(RenderedArtifact::new(input_names, filenames.join("\n")));

    let energies: String = states
        .iter()
        .map(|s| format!("{}\n", sci(s.energy, 10)))
        .collect();
    artifacts.push(RenderedArtifact::new(energies_file, energies));

    artifacts.push(RenderedArtifact::new(
        job_script.as_str(),
        input.render_role("job_script", &ctx)?,
    ));

    Ok(RenderedSet {
        artifacts,
        job_script,
    })
}

/// 读取参数块中的数值列表
fn number_list(params: &Value, key: &str, config_name: &str) -> Result<Vec<Value>> {
    let list = match params.get(key) {
        Some(Value::List(list)) if !list.is_empty() => list,
        Some(Value::List(_)) | None => {
            return Err(ChainsError::Render(format!(
                "no '{}' values in the 'parameters' block of configuration '{}'",
                key, config_name
            )))
        }
        Some(other) => {
            return Err(ChainsError::Render(format!(
                "'parameters.{}' of configuration '{}' must be a list, found {}",
                key,
                config_name,
                other.type_name()
            )))
        }
    };

    if let Some(bad) = list.iter().find(|v| v.as_f64().is_none()) {
        return Err(ChainsError::Render(format!(
            "'parameters.{}' of configuration '{}' contains a non-numeric value '{}'",
            key, config_name, bad
        )));
    }

    Ok(list.clone())
}

/// 科学计数法，指数至少两位并带符号，如 `1.50000e-03`
pub fn sci(x: f64, precision: usize) -> String {
    let formatted = format!("{:.*e}", precision, x);
    match formatted.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => formatted,
    }
}

/// Fortran 双精度字面量，如 `1.50000d-03`
pub fn fortran_float(x: f64) -> String {
    sci(x, 5).replacen('e', "d", 1)
}
