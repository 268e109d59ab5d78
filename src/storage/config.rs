//! 配置文件管理模块
//!
//! 配置为 YAML 格式，命令行参数可以覆盖其中的扫描路径和基线路径。

use crate::core::errors::OwnerError;
use crate::core::models::{Feature, Features, Ownership};
use crate::core::rule_engine::RuleSet;
use crate::core::scanner::{FileScanner, DEFAULT_CONCURRENCY};
use crate::storage::baseline_file::load_baseline;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// 默认基线文件名
pub const DEFAULT_BASELINE_FILE: &str = ".owner-baseline.yaml";

/// 应用配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// 扫描根路径
    #[serde(default)]
    pub paths: Vec<String>,
    /// 排除模式
    #[serde(default)]
    pub exclude: Vec<String>,
    /// 基线文件路径
    #[serde(default = "default_baseline_path")]
    pub path_baseline: PathBuf,
    /// 最大并发文件系统操作数
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// 功能定义，按声明顺序
    #[serde(default, deserialize_with = "nullable_features")]
    pub features: Features,
}

fn default_baseline_path() -> PathBuf {
    PathBuf::from(DEFAULT_BASELINE_FILE)
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn nullable_features<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Features, D::Error> {
    Ok(Option::<Features>::deserialize(deserializer)?.unwrap_or_default())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            exclude: Vec::new(),
            path_baseline: default_baseline_path(),
            concurrency: DEFAULT_CONCURRENCY,
            features: Features::new(),
        }
    }
}

impl Config {
    /// `init` 生成的初始配置
    pub fn default_template() -> Self {
        let mut features = Features::new();
        features.insert(
            "example",
            Feature {
                owner: "my-team".to_string(),
                description: Some("示例功能，请替换为真实的功能和团队".to_string()),
                files: vec!["docs/**".to_string(), "**/*.md".to_string()],
            },
        );

        Self {
            paths: vec![".".to_string()],
            exclude: vec![
                ".git".to_string(),
                "node_modules".to_string(),
                "target".to_string(),
            ],
            features,
            ..Default::default()
        }
    }

    /// 应用命令行覆盖项，非空时替换配置中的值
    pub fn with_overrides(mut self, paths: &[String], path_baseline: Option<PathBuf>) -> Self {
        if !paths.is_empty() {
            self.paths = paths.to_vec();
        }
        if let Some(path) = path_baseline {
            self.path_baseline = path;
        }
        self
    }

    /// 扫描前的校验
    pub fn validate(&self) -> Result<(), OwnerError> {
        if self.paths.iter().all(|p| p.trim().is_empty()) {
            return Err(OwnerError::NoPathsProvided);
        }
        Ok(())
    }

    /// 根据配置构建扫描器
    pub fn scanner(&self, base_dir: PathBuf) -> FileScanner {
        self.exclude
            .iter()
            .fold(FileScanner::new(base_dir), |scanner, pattern| scanner.exclude(pattern))
            .roots(self.paths.iter().filter(|p| !p.trim().is_empty()))
            .concurrency(self.concurrency)
    }

    /// 不遍历目录树，按配置判定一组路径的归属，结果顺序与输入一致
    pub fn find_owners(&self, paths: &[String]) -> Result<Vec<(String, Ownership)>, OwnerError> {
        let rules = RuleSet::new(&self.features);
        let mut baseline = load_baseline(&self.path_baseline)?;
        let scanner = self.scanner(PathBuf::from("."));

        Ok(paths
            .iter()
            .map(|path| (path.clone(), scanner.lookup(&rules, &mut baseline, path)))
            .collect())
    }
}

/// 配置管理器
pub struct ConfigManager {
    config_path: PathBuf,
}

/// `init` 的执行结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Created,
    Updated,
    AlreadyExists,
}

impl ConfigManager {
    /// 创建配置管理器
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// 获取默认配置路径
    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// 加载配置
    pub fn load(&self) -> Result<Config, OwnerError> {
        if !self.config_path.exists() {
            return Err(OwnerError::NoConfigFile(self.config_path.clone()));
        }

        let content = std::fs::read_to_string(&self.config_path).map_err(|source| OwnerError::Io {
            path: self.config_path.clone(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(Config::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|source| OwnerError::InvalidConfig {
                path: self.config_path.clone(),
                source,
            })?;
        tracing::debug!("已加载配置 {}: {:?}", self.config_path.display(), config);
        Ok(config)
    }

    /// 保存配置
    pub fn save(&self, config: &Config) -> Result<(), OwnerError> {
        let io_err = |source| OwnerError::Io {
            path: self.config_path.clone(),
            source,
        };

        // 确保目录存在
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let content = serde_yaml::to_string(config).map_err(|source| OwnerError::InvalidConfig {
            path: self.config_path.clone(),
            source,
        })?;
        std::fs::write(&self.config_path, content).map_err(io_err)?;
        Ok(())
    }

    /// 生成默认配置；`update` 为真时补全已有配置中缺失的选项
    pub fn init(&self, update: bool) -> Result<InitOutcome, OwnerError> {
        if !self.config_path.exists() {
            self.save(&Config::default_template())?;
            return Ok(InitOutcome::Created);
        }

        if !update {
            return Ok(InitOutcome::AlreadyExists);
        }

        // 反序列化时缺失字段会取默认值，写回即补全
        let config = self.load()?;
        self.save(&config)?;
        Ok(InitOutcome::Updated)
    }
}
