//! # 作业提交
//!
//! 提交命令形如 `<submit_command> [delay_command] <job_script>`，
//! 在作业目录中执行。提交后不等待作业完成。
//!
//! ## 依赖关系
//! - 被 `batch/driver.rs` 使用
//! - 使用 `std::process::Command` 调用调度器

use crate::error::{ChainsError, Result};

use std::io::ErrorKind as IoErrorKind;
use std::path::Path;
use std::process::Command;

/// 一次提交请求
#[derive(Debug, Clone)]
pub struct Submission<'a> {
    pub submit_command: &'a str,
    pub delay_command: Option<&'a str>,
    pub job_script: &'a str,
    pub job_dir: &'a Path,
}

impl<'a> Submission<'a> {
    /// 拆分后的完整命令行
    pub fn argv(&self) -> Vec<String> {
        let mut argv: Vec<String> = self
            .submit_command
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if let Some(delay) = self.delay_command {
            argv.extend(delay.split_whitespace().map(str::to_string));
        }
        argv.push(self.job_script.to_string());
        argv
    }

    pub fn command_line(&self) -> String {
        self.argv().join(" ")
    }
}

/// 调度器提交接口
pub trait Submitter {
    /// 提交作业，返回调度器的输出
    fn submit(&self, job: &Submission<'_>) -> Result<String>;
}

/// 调用外部命令提交
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellSubmitter;

impl Submitter for ShellSubmitter {
    fn submit(&self, job: &Submission<'_>) -> Result<String> {
        let argv = job.argv();
        let Some((program, args)) = argv.split_first() else {
            return Err(ChainsError::config("submit_command is empty"));
        };

        let out = Command::new(program)
            .args(args)
            .current_dir(job.job_dir)
            .output()
            .map_err(|e| match e.kind() {
                IoErrorKind::NotFound => ChainsError::CommandNotFound {
                    command: program.clone(),
                },
                _ => ChainsError::Submission {
                    command: job.command_line(),
                    stderr: e.to_string(),
                },
            })?;

        if !out.status.success() {
            return Err(ChainsError::Submission {
                command: job.command_line(),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }
}
