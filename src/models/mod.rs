//! # 数据模型模块
//!
//! 定义资源档位、工作项、配置变体和渲染产物。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `scaling/`, `registry/`, `render/`, `batch/` 使用
//! - 子模块: resource, work

pub mod resource;
pub mod work;

pub use resource::{ResourceTable, ResourceTier, Walltime};
pub use work::{
    stem_name, ConfigVariant, Molecule, RenderedArtifact, State, WorkItem, Workload, WorkloadKind,
};
