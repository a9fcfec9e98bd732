//! # 统一错误处理模块
//!
//! 定义 chains 的所有错误类型，使用 `thiserror` 派生。
//!
//! 每个错误可以通过 [`ChainsError::kind`] 归入六类之一，批处理驱动器据此
//! 决定是终止整次运行还是只放弃当前组合。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 配置缺失或格式错误，整次运行无法继续
    Configuration,
    /// 规模指数超过所有资源档位
    ScaleExceeded,
    /// 工作项数据无法识别（未知元素、格式不符）
    Lookup,
    /// 模板渲染失败
    Render,
    /// 提交命令失败
    Submission,
    /// 文件系统错误
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::ScaleExceeded => "scale exceeded",
            ErrorKind::Lookup => "lookup",
            ErrorKind::Render => "render",
            ErrorKind::Submission => "submission",
            ErrorKind::Io => "io",
        };
        write!(f, "{}", name)
    }
}

/// chains 统一错误类型
#[derive(Error, Debug)]
pub enum ChainsError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Job directory already exists: {path} (use --overwrite to replace it)")]
    DirectoryExists { path: String },

    // ─────────────────────────────────────────────────────────────
    // 配置错误
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// `available` 已含说明文字：已定义的档案或集群列表
    #[error("Profile '{profile}' is not defined for cluster '{cluster}' ({available})")]
    ProfileNotFound {
        cluster: String,
        profile: String,
        available: String,
    },

    // ─────────────────────────────────────────────────────────────
    // 规模与数据错误
    // ─────────────────────────────────────────────────────────────
    #[error("Scale index {index} exceeds the largest scale limit ({max_limit}) of this profile")]
    ScaleExceeded { index: f64, max_limit: f64 },

    #[error("No atomic number defined for element '{symbol}'")]
    UnknownElement { symbol: String },

    #[error("Lookup error: {0}")]
    Lookup(String),

    #[error("Failed to parse {format} file: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    // ─────────────────────────────────────────────────────────────
    // 渲染错误
    // ─────────────────────────────────────────────────────────────
    #[error("Template syntax error in '{template}' line {line}: {reason}")]
    TemplateSyntax {
        template: String,
        line: usize,
        reason: String,
    },

    #[error("Undefined variable '{name}' in template '{template}' line {line}")]
    UndefinedVariable {
        template: String,
        name: String,
        line: usize,
    },

    #[error("Render error: {0}")]
    Render(String),

    // ─────────────────────────────────────────────────────────────
    // 外部命令错误
    // ─────────────────────────────────────────────────────────────
    #[error("External command '{command}' not found in PATH")]
    CommandNotFound { command: String },

    #[error("Submit command failed: {command}\n{stderr}")]
    Submission { command: String, stderr: String },

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No matching files found with pattern '{pattern}' in {path}")]
    NoFilesFound { pattern: String, path: String },

    // ─────────────────────────────────────────────────────────────
    // CSV 错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

impl ChainsError {
    /// 错误所属类别
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChainsError::FileReadError { .. }
            | ChainsError::FileWriteError { .. }
            | ChainsError::DirectoryNotFound { .. }
            | ChainsError::FileNotFound { .. }
            | ChainsError::DirectoryExists { .. }
            | ChainsError::CsvError(_) => ErrorKind::Io,
            ChainsError::Configuration(_)
            | ChainsError::ProfileNotFound { .. }
            | ChainsError::InvalidArgument(_)
            | ChainsError::NoFilesFound { .. } => ErrorKind::Configuration,
            ChainsError::ScaleExceeded { .. } => ErrorKind::ScaleExceeded,
            ChainsError::UnknownElement { .. }
            | ChainsError::Lookup(_)
            | ChainsError::ParseError { .. } => ErrorKind::Lookup,
            ChainsError::TemplateSyntax { .. }
            | ChainsError::UndefinedVariable { .. }
            | ChainsError::Render(_) => ErrorKind::Render,
            ChainsError::CommandNotFound { .. } | ChainsError::Submission { .. } => {
                ErrorKind::Submission
            }
        }
    }

    /// 构造配置错误
    pub fn config(msg: impl Into<String>) -> Self {
        ChainsError::Configuration(msg.into())
    }

    /// 构造读取错误
    pub fn read(path: &std::path::Path, source: std::io::Error) -> Self {
        ChainsError::FileReadError {
            path: path.display().to_string(),
            source,
        }
    }

    /// 构造写入错误
    pub fn write(path: &std::path::Path, source: std::io::Error) -> Self {
        ChainsError::FileWriteError {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, ChainsError>;
