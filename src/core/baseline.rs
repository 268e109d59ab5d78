//! 基线模块
//!
//! 基线记录已被接受的无主文件，用于逐步推行归属检查。
//! 一次扫描期间记录哪些条目仍然需要（keep），哪些是新出现的（to_add）。
//! 同一个 Baseline 只能被一次扫描使用。
//!
//! 记录和查询都使用 `normalize_path` 后的形式，与规则、扫描路径一致。

use crate::core::pattern::normalize_path;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 当前基线文件版本
pub const BASELINE_VERSION: u32 = 1;

/// 持久化格式
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineRecord {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub files: Vec<String>,
}

fn default_version() -> u32 {
    BASELINE_VERSION
}

/// 基线
#[derive(Debug, Clone)]
pub struct Baseline {
    version: u32,
    /// 已有记录
    existing: BTreeSet<String>,
    /// 本次扫描仍然命中的记录
    keep: BTreeSet<String>,
    /// 本次扫描新发现的无主文件
    to_add: BTreeSet<String>,
}

impl Default for Baseline {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Baseline {
    /// 用已有记录创建基线，记录会被规范化（`./src/a.rs` 与 `src/a.rs` 等价）
    pub fn new(files: impl IntoIterator<Item = String>) -> Self {
        Self {
            version: BASELINE_VERSION,
            existing: files
                .into_iter()
                .filter(|f| !f.trim().is_empty())
                .map(|f| normalize_path(f.trim()))
                .collect(),
            keep: BTreeSet::new(),
            to_add: BTreeSet::new(),
        }
    }

    pub fn from_record(record: BaselineRecord) -> Self {
        let mut baseline = Self::new(record.files);
        baseline.version = record.version;
        baseline
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// 检查文件是否在基线中
    ///
    /// 命中则记为保留并返回 true，否则记为待添加并返回 false。
    pub fn check(&mut self, path: &str) -> bool {
        let path = normalize_path(path);
        if self.existing.contains(&path) {
            self.keep.insert(path);
            true
        } else {
            self.to_add.insert(path);
            false
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.existing.contains(&normalize_path(path))
    }

    /// 本次扫描未命中的过期记录（已排序）
    pub fn unneeded_records(&self) -> Vec<&str> {
        self.existing
            .difference(&self.keep)
            .map(String::as_str)
            .collect()
    }

    /// 新发现的无主文件（已排序）
    pub fn to_add(&self) -> Vec<&str> {
        self.to_add.iter().map(String::as_str).collect()
    }

    pub fn existing_len(&self) -> usize {
        self.existing.len()
    }

    /// 生成要写回的记录：keep ∪ to_add，排序后输出
    pub fn to_record(&self) -> BaselineRecord {
        BaselineRecord {
            version: self.version,
            files: self.keep.union(&self.to_add).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_tracks_keep_and_to_add() {
        let mut baseline = Baseline::new(vec!["a.txt".to_string(), "b.txt".to_string()]);

        assert!(baseline.check("a.txt"));
        assert!(!baseline.check("c.txt"));

        assert_eq!(baseline.unneeded_records(), vec!["b.txt"]);
        assert_eq!(baseline.to_add(), vec!["c.txt"]);
    }

    #[test]
    fn test_record_is_sorted_union() {
        let mut baseline = Baseline::new(vec!["z.txt".to_string(), "stale.txt".to_string()]);
        baseline.check("z.txt");
        baseline.check("m.txt");
        baseline.check("a.txt");

        let record = baseline.to_record();
        assert_eq!(record.version, 1);
        assert_eq!(record.files, vec!["a.txt", "m.txt", "z.txt"]);
    }

    #[test]
    fn test_repeated_check_is_stable() {
        let mut baseline = Baseline::new(vec!["a.txt".to_string()]);
        assert!(baseline.check("a.txt"));
        assert!(baseline.check("a.txt"));
        assert!(baseline.unneeded_records().is_empty());
        assert!(baseline.to_add().is_empty());
    }

    #[test]
    fn test_entries_are_normalized() {
        let mut baseline = Baseline::new(vec![
            "./src/main.cpp".to_string(),
            "lib\\util.rs".to_string(),
            "  ".to_string(),
        ]);
        assert_eq!(baseline.existing_len(), 2);
        assert!(baseline.contains("src/main.cpp"));
        assert!(baseline.check("src/main.cpp"));
        assert!(baseline.check("./lib/util.rs"));
        assert!(baseline.unneeded_records().is_empty());
        assert_eq!(baseline.to_record().files, vec!["lib/util.rs", "src/main.cpp"]);
    }

    #[test]
    fn test_record_keeps_version() {
        let baseline = Baseline::from_record(BaselineRecord {
            version: 3,
            files: vec!["x".to_string()],
        });
        assert_eq!(baseline.version(), 3);
        assert!(baseline.contains("x"));
        assert_eq!(baseline.to_record().files, Vec::<String>::new());
    }
}
