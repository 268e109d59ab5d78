//! 命令行模块

pub mod commands;
pub mod report;

use crate::core::errors::OwnerError;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "codeowner")]
#[command(about = "检查代码库中的每个文件是否都有所属团队")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 输出调试日志
    #[arg(long, global = true)]
    pub debug: bool,

    /// 只输出警告和错误
    #[arg(long, global = true)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// 检查文件归属
    Check {
        #[command(flatten)]
        scan: ScanArgs,

        /// 用本次结果重写基线文件
        #[arg(long)]
        update_baseline: bool,

        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// 严格检查：文件归属、基线过期记录、配置健康度
    Audit {
        #[command(flatten)]
        scan: ScanArgs,
    },
    /// 不扫描目录树，直接查询给定路径的所有者
    Owner {
        /// 要查询的文件路径
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<String>,

        /// 配置文件路径
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// 基线文件路径
        #[arg(long, value_name = "FILE")]
        path_baseline: Option<PathBuf>,

        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// 生成默认配置
    Init {
        /// 配置文件路径
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// 补全已有配置中缺失的选项
        #[arg(long)]
        update: bool,
    },
}

/// check 与 audit 共用的参数
#[derive(Debug, Clone, Args)]
pub struct ScanArgs {
    /// 要检查的文件或目录，覆盖配置中的 paths
    #[arg(value_name = "PATH")]
    pub paths: Vec<String>,

    /// 配置文件路径
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// 基线文件路径
    #[arg(long, value_name = "FILE")]
    pub path_baseline: Option<PathBuf>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl Cli {
    /// 根据 --debug / --quiet 得到默认日志级别
    pub fn log_level(&self) -> Result<&'static str, OwnerError> {
        match (self.debug, self.quiet) {
            (true, true) => Err(OwnerError::ConflictingVerbosityFlags),
            (true, false) => Ok("debug"),
            (false, true) => Ok("warn"),
            (false, false) => Ok("info"),
        }
    }
}
