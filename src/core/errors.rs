//! 调用层错误
//!
//! 扫描本身不会失败：无主文件是数据（见 `OwnershipError`）。
//! 这里是扫描开始前后由命令层抛出的错误。

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OwnerError {
    #[error("没有可扫描的内容")]
    NothingToScan,

    #[error("找不到配置文件 {0}，请先运行 `init` 生成")]
    NoConfigFile(PathBuf),

    #[error("必须提供至少一个扫描路径")]
    NoPathsProvided,

    #[error("--debug 和 --quiet 不能同时开启")]
    ConflictingVerbosityFlags,

    #[error("配置文件 {path} 解析失败: {source}")]
    InvalidConfig {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("基线文件 {path} 解析失败: {source}")]
    InvalidBaseline {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("读写 {path} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
