//! 存储模块 - 配置文件与基线文件

pub mod config;
pub mod baseline_file;
