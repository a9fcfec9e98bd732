//! # 集群档案注册表
//!
//! 以 (集群名, 档案名) 为键保存完全展开、不可变的 `ProfileEntry`。
//!
//! ## 加载流程
//! 1. 解析 YAML（锚点与别名由解析器展开）
//! 2. `merge::preprocess` 展开 `<<` 合并键和 `extends` 继承
//! 3. 反序列化为 `Raw*` 结构体
//! 4. 校验：函数名已注册、两者工作负载类型一致、模板角色齐全、
//!    资源档位满足不变量且档位表非空
//!
//! 模板文件存在性与语法在 `ProfileEntry::check_templates` 中针对实际选用的
//! 档案检查。
//!
//! ## 依赖关系
//! - 被 `commands/`, `batch/driver.rs` 使用
//! - 使用 `models/resource.rs`, `scaling/`, `render/`
//! - 使用 `serde`, `serde_yml`

pub mod merge;

use crate::error::{ChainsError, Result};
use crate::models::{ResourceTable, ResourceTier, Walltime, WorkloadKind};
use crate::render::functions::{self as rendering, RenderingFunction};
use crate::render::{Renderer, Value};
use crate::scaling::{self, ScalingFunction};

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

// ─────────────────────────────────────────────────────────────
// 原始配置结构
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawClustersFile {
    clusters: BTreeMap<String, RawCluster>,
}

#[derive(Debug, Deserialize)]
struct RawCluster {
    submit_command: String,
    #[serde(default)]
    variables: BTreeMap<String, serde_yml::Value>,
    #[serde(default)]
    profiles: BTreeMap<String, RawProfile>,
}

#[derive(Debug, Deserialize)]
struct RawProfile {
    scaling_function: String,
    rendering_function: String,
    #[serde(default)]
    set_env: Vec<String>,
    #[serde(default)]
    command: String,
    templates: BTreeMap<String, String>,
    #[serde(default)]
    variables: BTreeMap<String, serde_yml::Value>,
    #[serde(default)]
    job_scales: Vec<RawJobScale>,
}

#[derive(Debug, Deserialize)]
struct RawJobScale {
    label: String,
    scale_limit: f64,
    time: String,
    cores: Option<u32>,
    mem_per_cpu: u64,
    partition_name: Option<String>,
    delay_command: Option<String>,
}

impl RawJobScale {
    fn into_tier(self) -> Result<ResourceTier> {
        let walltime = Walltime::parse(&self.time)?;
        let mut tier = ResourceTier::new(
            self.label,
            self.scale_limit,
            walltime,
            self.cores,
            self.mem_per_cpu,
        )?;
        if let Some(partition) = self.partition_name {
            tier = tier.with_partition(partition);
        }
        if let Some(delay) = self.delay_command {
            tier = tier.with_delay_command(delay);
        }
        Ok(tier)
    }
}

// ─────────────────────────────────────────────────────────────
// 档案
// ─────────────────────────────────────────────────────────────

/// 一个 (集群, 档案) 的完整设定
#[derive(Debug, Clone)]
pub struct ProfileEntry {
    pub cluster: String,
    pub profile: String,
    pub submit_command: String,
    pub scaling: &'static ScalingFunction,
    pub rendering: &'static RenderingFunction,
    pub set_env: Vec<String>,
    pub command: String,
    /// 模板角色 -> 模板名
    pub templates: BTreeMap<String, String>,
    /// 集群变量，被档案变量覆盖
    pub variables: BTreeMap<String, Value>,
    pub resources: ResourceTable,
}

impl ProfileEntry {
    fn from_raw(
        cluster: &str,
        profile: &str,
        submit_command: &str,
        cluster_vars: &BTreeMap<String, serde_yml::Value>,
        raw: RawProfile,
    ) -> Result<Self> {
        let context = format!("profile '{}' of cluster '{}'", profile, cluster);

        let scaling = scaling::lookup(&raw.scaling_function).ok_or_else(|| {
            ChainsError::config(format!(
                "{}: unknown scaling function '{}' (registered: {})",
                context,
                raw.scaling_function,
                scaling::names().join(", ")
            ))
        })?;
        let rendering = rendering::lookup(&raw.rendering_function).ok_or_else(|| {
            ChainsError::config(format!(
                "{}: unknown rendering function '{}' (registered: {})",
                context,
                raw.rendering_function,
                rendering::names().join(", ")
            ))
        })?;

        if scaling.kind != rendering.kind {
            return Err(ChainsError::config(format!(
                "{}: scaling function '{}' works on {} inputs but rendering function '{}' expects {} inputs",
                context, scaling.name, scaling.kind, rendering.name, rendering.kind
            )));
        }

        let missing: Vec<&str> = rendering
            .roles
            .iter()
            .copied()
            .filter(|role| !raw.templates.contains_key(*role))
            .collect();
        if !missing.is_empty() {
            return Err(ChainsError::config(format!(
                "{}: '{}' needs templates for: {}",
                context,
                rendering.name,
                missing.join(", ")
            )));
        }

        let tiers = raw
            .job_scales
            .into_iter()
            .map(RawJobScale::into_tier)
            .collect::<Result<Vec<_>>>()
            .map_err(|e| ChainsError::config(format!("{}: {}", context, e)))?;
        let resources =
            ResourceTable::new(tiers).map_err(|e| ChainsError::config(format!("{}: {}", context, e)))?;
        if resources.is_empty() {
            return Err(ChainsError::config(format!("{}: job_scales is empty", context)));
        }

        let mut variables: BTreeMap<String, Value> = cluster_vars
            .iter()
            .map(|(k, v)| (k.clone(), Value::from_yaml(v)))
            .collect();
        for (k, v) in &raw.variables {
            variables.insert(k.clone(), Value::from_yaml(v));
        }

        Ok(ProfileEntry {
            cluster: cluster.to_string(),
            profile: profile.to_string(),
            submit_command: submit_command.to_string(),
            scaling,
            rendering,
            set_env: raw.set_env,
            command: raw.command,
            templates: raw.templates,
            variables,
            resources,
        })
    }

    /// 检查档案能否处理该类工作项
    pub fn check_kind(&self, kind: WorkloadKind) -> Result<()> {
        if self.scaling.kind != kind {
            return Err(ChainsError::config(format!(
                "profile '{}' of cluster '{}' handles {} inputs, this launcher works on {} inputs",
                self.profile, self.cluster, self.scaling.kind, kind
            )));
        }
        Ok(())
    }

    /// 检查全部模板存在且语法正确
    pub fn check_templates(&self, renderer: &Renderer) -> Result<()> {
        for (role, name) in &self.templates {
            if !renderer.has_template(name) {
                return Err(ChainsError::config(format!(
                    "template '{}' ({} of profile '{}') not found in the templates directory",
                    name, role, self.profile
                )));
            }
            renderer
                .check(name)
                .map_err(|e| ChainsError::config(format!("template '{}': {}", name, e)))?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────
// 注册表
// ─────────────────────────────────────────────────────────────

/// 集群档案注册表
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    clusters: BTreeMap<String, BTreeMap<String, ProfileEntry>>,
}

impl ProfileRegistry {
    /// 从集群配置文件加载
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ChainsError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let content = fs::read_to_string(path).map_err(|e| ChainsError::read(path, e))?;
        Self::from_yaml_str(&content)
            .map_err(|e| ChainsError::config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let root: serde_yml::Value = serde_yml::from_str(content)
            .map_err(|e| ChainsError::config(format!("invalid YAML: {}", e)))?;
        let root = merge::preprocess(root)?;
        let raw: RawClustersFile = serde_yml::from_value(root)
            .map_err(|e| ChainsError::config(format!("invalid clusters layout: {}", e)))?;

        let mut clusters = BTreeMap::new();
        for (cluster_name, cluster) in raw.clusters {
            let mut profiles = BTreeMap::new();
            for (profile_name, profile) in cluster.profiles {
                let entry = ProfileEntry::from_raw(
                    &cluster_name,
                    &profile_name,
                    &cluster.submit_command,
                    &cluster.variables,
                    profile,
                )?;
                profiles.insert(profile_name, entry);
            }
            clusters.insert(cluster_name, profiles);
        }

        Ok(ProfileRegistry { clusters })
    }

    /// 查找档案
    pub fn lookup(&self, cluster: &str, profile: &str) -> Result<&ProfileEntry> {
        let profiles = self.clusters.get(cluster).ok_or_else(|| ChainsError::ProfileNotFound {
            cluster: cluster.to_string(),
            profile: profile.to_string(),
            available: format!(
                "cluster is not defined, available clusters: {}",
                self.cluster_names().join(", ")
            ),
        })?;

        profiles.get(profile).ok_or_else(|| ChainsError::ProfileNotFound {
            cluster: cluster.to_string(),
            profile: profile.to_string(),
            available: format!(
                "available: {}",
                profiles.keys().cloned().collect::<Vec<_>>().join(", ")
            ),
        })
    }

    pub fn cluster_names(&self) -> Vec<String> {
        self.clusters.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::render::MemorySource;

    const CLUSTERS: &str = r#"
definitions:
  small_scales: &small_scales
    - { label: tiny, scale_limit: 50, time: "00:10:00", cores: 1, mem_per_cpu: 500 }
    - { label: big, scale_limit: 1500, time: "2-00:00:00", cores: 16, mem_per_cpu: 4000, partition_name: long }
    - { label: small, scale_limit: 500, time: "01:00:00", cores: 4, mem_per_cpu: 1000, delay_command: "--begin=now+60" }
  orca_base: &orca_base
    scaling_function: total_nb_elec
    rendering_function: orca_render
    command: orca
    templates: { input: orca.inp, job_script: orca_job.sh }
    job_scales: *small_scales

clusters:
  lemaitre3:
    submit_command: sbatch
    variables: { benchmark_path: "/scratch/bench", mail: none }
    profiles:
      orca:
        <<: *orca_base
        set_env: ["module load ORCA/4.2.1"]
        variables: { mail: user@example.org }
      orca_atoms:
        extends: orca
        scaling_function: total_nb_atoms
  nic5:
    submit_command: sbatch
    profiles:
      qoctra:
        scaling_function: nb_states
        rendering_function: qoctra_render
        command: qoctra
        templates: { param: param.nml, job_script: qoctra_job.sh }
        job_scales:
          - { label: only, scale_limit: 100, time: "00:30:00", mem_per_cpu: 2000 }
"#;

    #[test]
    fn test_load_and_lookup() {
        let reg = ProfileRegistry::from_yaml_str(CLUSTERS).unwrap();
        assert_eq!(reg.cluster_names(), vec!["lemaitre3", "nic5"]);

        let orca = reg.lookup("lemaitre3", "orca").unwrap();
        assert_eq!(orca.scaling.name, "total_nb_elec");
        assert_eq!(orca.rendering.name, "orca_render");
        assert_eq!(orca.set_env, vec!["module load ORCA/4.2.1"]);
        let labels: Vec<_> = orca.resources.tiers().iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["tiny", "small", "big"]);
        assert_eq!(orca.resources.select(26.0).unwrap().label, "tiny");
        assert_eq!(orca.variables.get("mail"), Some(&Value::from("user@example.org")));
        assert_eq!(
            orca.variables.get("benchmark_path"),
            Some(&Value::from("/scratch/bench"))
        );

        let atoms = reg.lookup("lemaitre3", "orca_atoms").unwrap();
        assert_eq!(atoms.scaling.name, "total_nb_atoms");
        assert_eq!(atoms.command, "orca");
        assert_eq!(atoms.resources.tiers().len(), 3);

        let qoctra = reg.lookup("nic5", "qoctra").unwrap();
        assert!(qoctra.check_kind(WorkloadKind::States).is_ok());
        assert!(qoctra.check_kind(WorkloadKind::Molecule).is_err());
        assert_eq!(qoctra.resources.tiers()[0].cores, None);
    }

    #[test]
    fn test_lookup_missing() {
        let reg = ProfileRegistry::from_yaml_str(CLUSTERS).unwrap();
        let err = reg.lookup("lemaitre3", "gaussian").unwrap_err();
        assert!(matches!(err, ChainsError::ProfileNotFound { .. }));
        assert!(err.to_string().contains("orca_atoms"));

        let err = reg.lookup("hercules", "orca").unwrap_err();
        assert!(matches!(err, ChainsError::ProfileNotFound { .. }));
        assert_eq!(err.kind(), ErrorKind::Configuration);
        let msg = err.to_string();
        assert!(msg.contains("'hercules'"));
        assert!(msg.contains("available clusters: "));
        assert!(msg.contains("lemaitre3"));
    }

    fn single_profile(body: &str) -> Result<ProfileRegistry> {
        ProfileRegistry::from_yaml_str(&format!(
            "clusters:\n  c:\n    submit_command: sbatch\n    profiles:\n      p:\n{}",
            body
        ))
    }

    #[test]
    fn test_validation_errors() {
        let tiers = "        job_scales:\n          - { label: a, scale_limit: 10, time: \"01:00:00\", mem_per_cpu: 1 }\n";
        let tpl = "        templates: { input: i, job_script: j }\n";

        let unknown_fn = format!(
            "        scaling_function: nope\n        rendering_function: orca_render\n{}{}",
            tpl, tiers
        );
        assert!(single_profile(&unknown_fn).is_err());

        let mismatch = format!(
            "        scaling_function: nb_states\n        rendering_function: orca_render\n{}{}",
            tpl, tiers
        );
        assert!(single_profile(&mismatch).is_err());

        let missing_role = format!(
            "        scaling_function: total_nb_elec\n        rendering_function: orca_render\n        templates: {{ input: i }}\n{}",
            tiers
        );
        assert!(single_profile(&missing_role).is_err());

        let empty_table = format!(
            "        scaling_function: total_nb_elec\n        rendering_function: orca_render\n{}        job_scales: []\n",
            tpl
        );
        let err = single_profile(&empty_table).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let dup = format!(
            "        scaling_function: total_nb_elec\n        rendering_function: orca_render\n{}        job_scales:\n          - {{ label: a, scale_limit: 10, time: \"01:00:00\", mem_per_cpu: 1 }}\n          - {{ label: b, scale_limit: 10, time: \"02:00:00\", mem_per_cpu: 1 }}\n",
            tpl
        );
        assert!(single_profile(&dup).is_err());

        let bad_time = format!(
            "        scaling_function: total_nb_elec\n        rendering_function: orca_render\n{}        job_scales:\n          - {{ label: a, scale_limit: 10, time: \"1 hour\", mem_per_cpu: 1 }}\n",
            tpl
        );
        assert!(single_profile(&bad_time).is_err());

        let ok = format!(
            "        scaling_function: total_nb_elec\n        rendering_function: orca_render\n{}{}",
            tpl, tiers
        );
        assert!(single_profile(&ok).is_ok());
    }

    #[test]
    fn test_check_templates() {
        let reg = ProfileRegistry::from_yaml_str(CLUSTERS).unwrap();
        let orca = reg.lookup("lemaitre3", "orca").unwrap();

        let good = Renderer::new(
            MemorySource::new()
                .with("orca.inp", "! {{ method }}\n")
                .with("orca_job.sh", "#!/bin/bash\n"),
        );
        assert!(orca.check_templates(&good).is_ok());

        let broken = Renderer::new(
            MemorySource::new()
                .with("orca.inp", "{% if a %}never closed")
                .with("orca_job.sh", "#!/bin/bash\n"),
        );
        let err = orca.check_templates(&broken).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let missing = Renderer::new(MemorySource::new().with("orca.inp", ""));
        assert!(orca.check_templates(&missing).is_err());
    }

    #[test]
    fn test_shipped_clusters_file() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR"));
        let registry = ProfileRegistry::load(&root.join("configs/clusters.yml")).unwrap();
        assert_eq!(registry.cluster_names(), vec!["dragon2", "lemaitre3"]);

        let renderer = Renderer::from_dir(root.join("templates"));
        for (cluster, profile) in registry
            .clusters
            .iter()
            .flat_map(|(c, ps)| ps.keys().map(move |p| (c, p)))
        {
            let entry = registry.lookup(cluster, profile).unwrap();
            entry.check_templates(&renderer).unwrap();
        }

        let quick = registry.lookup("lemaitre3", "orca_quick").unwrap();
        assert_eq!(quick.rendering.name, "orca_render");
        assert_eq!(quick.resources.tiers().len(), 1);
        assert_eq!(
            quick.resources.tiers()[0].delay_command.as_deref(),
            Some("--begin=now+60")
        );
    }
}
