//! 核心数据模型定义
//!
//! 功能（Feature）、归属判定结果、扫描结果。

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// 功能定义
/// 一组 glob 模式归属于一个团队
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    /// 所属团队，为空表示未分配
    #[serde(default)]
    pub owner: String,
    /// 描述（仅用于展示）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// glob 模式列表，按声明顺序
    #[serde(default)]
    pub files: Vec<String>,
}

impl Feature {
    pub fn new(owner: &str, files: &[&str]) -> Self {
        Self {
            owner: owner.to_string(),
            description: None,
            files: files.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// 是否缺少所有者
    pub fn is_ownerless(&self) -> bool {
        self.owner.trim().is_empty()
    }
}

/// 按声明顺序保存的功能列表
///
/// 在配置文件中是一个映射（名称 -> 功能），但匹配优先级取决于声明顺序，
/// 所以这里保留文档中的顺序而不是使用 HashMap。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Features(Vec<(String, Feature)>);

impl Features {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// 追加一个功能；同名功能会被替换但保留原位置
    pub fn insert(&mut self, name: impl Into<String>, feature: Feature) {
        let name = name.into();
        if let Some(slot) = self.0.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = feature;
        } else {
            self.0.push((name, feature));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Feature)> {
        self.0.iter().map(|(n, f)| (n.as_str(), f))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<N: Into<String>> FromIterator<(N, Feature)> for Features {
    fn from_iter<I: IntoIterator<Item = (N, Feature)>>(iter: I) -> Self {
        let mut features = Features::new();
        for (name, feature) in iter {
            features.insert(name, feature);
        }
        features
    }
}

impl Serialize for Features {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, feature) in &self.0 {
            map.serialize_entry(name, feature)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Features {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FeaturesVisitor;

        impl<'de> Visitor<'de> for FeaturesVisitor {
            type Value = Features;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of feature name to feature")
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<Features, E> {
                Ok(Features::new())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Features, A::Error> {
                let mut features = Features::new();
                while let Some((name, feature)) = access.next_entry::<String, Option<Feature>>()? {
                    features.insert(name, feature.unwrap_or_default());
                }
                Ok(features)
            }
        }

        deserializer.deserialize_map(FeaturesVisitor)
    }
}

/// 单个文件的归属判定结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "owner", rename_all = "snake_case")]
pub enum Ownership {
    /// 命中规则
    Owned(String),
    /// 在基线中，视为豁免
    BaselineExempt,
    /// 命中排除列表
    Excluded,
    /// 无任何规则命中
    Unowned,
}

/// 扫描中收集到的归属错误（数据，而非异常）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OwnershipError {
    /// 文件没有任何所有者
    UnownedFile { path: String },
}

impl OwnershipError {
    pub fn path(&self) -> &str {
        match self {
            OwnershipError::UnownedFile { path } => path,
        }
    }
}

impl fmt::Display for OwnershipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnershipError::UnownedFile { path } => write!(f, "{} 没有所有者", path),
        }
    }
}

/// 扫描结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    /// 错误列表，顺序为完成顺序
    pub errors: Vec<OwnershipError>,
    /// 检查过的文件数
    pub files_tested: usize,
    /// 检查过的目录数
    pub dirs_tested: usize,
    /// 是否被取消（结果不完整）
    pub cancelled: bool,
}

impl ScanResult {
    /// 是否什么都没有扫描到
    pub fn is_empty_scan(&self) -> bool {
        self.files_tested == 0 && self.dirs_tested == 0
    }

    /// 按路径排序的错误路径，便于比较
    pub fn unowned_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.errors.iter().map(|e| e.path()).collect();
        paths.sort_unstable();
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_features_keep_declaration_order() {
        let yaml = "zeta:\n  owner: z\n  files: [a]\nalpha:\n  owner: a\n  files: [b]\n";
        let features: Features = serde_yaml::from_str(yaml).unwrap();
        let names: Vec<_> = features.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_feature_without_owner_deserializes() {
        let yaml = "orphan:\n  files: [\"docs/**\"]\nempty:\n";
        let features: Features = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(features.len(), 2);
        assert!(features.iter().all(|(_, f)| f.is_ownerless()));
    }

    #[test]
    fn test_ownership_json_shape() {
        let owned = serde_json::to_value(Ownership::Owned("donut".to_string())).unwrap();
        assert_eq!(owned, serde_json::json!({"status": "owned", "owner": "donut"}));
        let exempt = serde_json::to_value(Ownership::BaselineExempt).unwrap();
        assert_eq!(exempt, serde_json::json!({"status": "baseline_exempt"}));
    }

    #[test]
    fn test_unowned_error_message() {
        let err = OwnershipError::UnownedFile {
            path: "src/main.cpp".to_string(),
        };
        assert_eq!(err.to_string(), "src/main.cpp 没有所有者");
    }
}
