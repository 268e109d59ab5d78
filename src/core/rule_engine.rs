//! 规则引擎模块
//!
//! 由配置中的功能（功能 -> glob -> 团队）构建一次，之后只读。
//! 每个团队持有三类规则：精确文件集合、目录规则、通用规则。
//!
//! 匹配优先级：团队按首次声明的顺序遍历，先命中者胜出。

use crate::core::baseline::Baseline;
use crate::core::models::{Features, Ownership};
use crate::core::pattern::{classify, ClassifiedPattern, InvalidPattern, PatternKind};
use globset::GlobMatcher;
use std::collections::{HashMap, HashSet};

/// 单个团队的规则
#[derive(Debug, Default)]
struct OwnerRules {
    owner: String,
    /// 精确路径
    files: HashSet<String>,
    /// 目录规则（作用于目录）
    dirs: Vec<GlobMatcher>,
    /// 通用规则（作用于文件）
    others: Vec<GlobMatcher>,
}

/// 规则集
#[derive(Debug, Default)]
pub struct RuleSet {
    /// 按首次声明顺序排列
    owners: Vec<OwnerRules>,
    /// 团队名 -> owners 下标
    index: HashMap<String, usize>,
    /// 没有所有者的功能名称
    ownerless_features: Vec<String>,
    /// 编译失败被丢弃的模式
    invalid_patterns: Vec<InvalidPattern>,
}

impl RuleSet {
    /// 从功能列表构建规则集
    pub fn new(features: &Features) -> Self {
        let mut rules = Self::default();

        for (name, feature) in features.iter() {
            if feature.is_ownerless() {
                rules.ownerless_features.push(name.to_string());
                continue;
            }

            let owner = feature.owner.trim();
            for pattern in &feature.files {
                match classify(pattern) {
                    Ok(compiled) => rules.insert(owner, compiled),
                    Err(invalid) => {
                        tracing::warn!(
                            "无效的 glob 模式 (功能 {}): {} ({})",
                            name,
                            invalid.pattern,
                            invalid.reason
                        );
                        rules.invalid_patterns.push(invalid);
                    }
                }
            }
        }

        if !rules.ownerless_features.is_empty() {
            tracing::warn!(
                "配置无效，以下功能没有所有者: {}",
                rules.ownerless_features.join(", ")
            );
        }

        rules
    }

    fn insert(&mut self, owner: &str, pattern: ClassifiedPattern) {
        let idx = match self.index.get(owner) {
            Some(&idx) => idx,
            None => {
                self.owners.push(OwnerRules {
                    owner: owner.to_string(),
                    ..Default::default()
                });
                self.index.insert(owner.to_string(), self.owners.len() - 1);
                self.owners.len() - 1
            }
        };

        let bucket = &mut self.owners[idx];
        match pattern {
            ClassifiedPattern::Exact(path) => {
                bucket.files.insert(path);
            }
            ClassifiedPattern::DirectorySubtree(m) => bucket.dirs.push(m),
            ClassifiedPattern::General(m) => bucket.others.push(m),
        }
    }

    /// 查找文件的所有者
    ///
    /// 先查所有团队的精确集合，再查通用规则。目录规则不参与。
    pub fn owner_of_file(&self, path: &str) -> Option<&str> {
        if let Some(rules) = self.owners.iter().find(|r| r.files.contains(path)) {
            return Some(&rules.owner);
        }

        self.owners
            .iter()
            .find(|r| r.others.iter().any(|m| m.is_match(path)))
            .map(|r| r.owner.as_str())
    }

    /// 查找整棵目录子树的所有者，仅使用目录规则
    pub fn owner_of_directory(&self, path: &str) -> Option<&str> {
        self.owners
            .iter()
            .find(|r| r.dirs.iter().any(|m| m.is_match(path)))
            .map(|r| r.owner.as_str())
    }

    /// 判定文件归属
    ///
    /// 先查规则，未命中再查基线。这样基线里已被规则覆盖的文件
    /// 不会被标记为保留，后续会作为过期记录清理掉。
    pub fn resolve(&self, baseline: &mut Baseline, path: &str) -> Ownership {
        if let Some(owner) = self.owner_of_file(path) {
            return Ownership::Owned(owner.to_string());
        }
        if baseline.check(path) {
            return Ownership::BaselineExempt;
        }
        Ownership::Unowned
    }

    /// 没有所有者的功能
    pub fn ownerless_features(&self) -> &[String] {
        &self.ownerless_features
    }

    /// 被丢弃的无效模式
    pub fn invalid_patterns(&self) -> &[InvalidPattern] {
        &self.invalid_patterns
    }

    /// 按声明顺序列出团队
    pub fn owners(&self) -> impl Iterator<Item = &str> {
        self.owners.iter().map(|r| r.owner.as_str())
    }

    /// 某团队的精确文件集合
    pub fn file_rules_of(&self, owner: &str) -> Option<&HashSet<String>> {
        self.rules_of(owner).map(|r| &r.files)
    }

    pub fn dir_rule_count(&self, owner: &str) -> usize {
        self.rules_of(owner).map_or(0, |r| r.dirs.len())
    }

    pub fn other_rule_count(&self, owner: &str) -> usize {
        self.rules_of(owner).map_or(0, |r| r.others.len())
    }

    /// 规则总数（按类型）
    pub fn count_by_kind(&self, kind: PatternKind) -> usize {
        self.owners
            .iter()
            .map(|r| match kind {
                PatternKind::Exact => r.files.len(),
                PatternKind::DirectorySubtree => r.dirs.len(),
                PatternKind::General => r.others.len(),
            })
            .sum()
    }

    fn rules_of(&self, owner: &str) -> Option<&OwnerRules> {
        self.index.get(owner).map(|&idx| &self.owners[idx])
    }
}
