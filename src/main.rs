//! codeowner - 代码归属检查工具
//!
//! 核心设计原则：
//! - 每个文件都应有所属团队
//! - 先声明的功能优先
//! - 历史遗留文件进基线，不阻塞检查

pub mod cli;
pub mod core;
pub mod storage;

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::Cli::parse();

    let level = match cli.log_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("错误: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // 初始化日志，RUST_LOG 优先于命令行开关
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    tracing::debug!("启动 codeowner");

    match cli::commands::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("错误: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
