//! Glob 模式分类与编译
//!
//! 每个 glob 被归入三类之一，以便选择最便宜的匹配方式：
//! - 精确路径：集合查找
//! - 目录子树：在遍历目录时匹配，命中后整棵子树不再展开
//! - 通用模式：对每个文件路径做 glob 匹配

use globset::{GlobBuilder, GlobMatcher};

/// glob 元字符
const GLOB_META: &[char] = &['*', '?', '[', ']', '{', '}'];

/// 判断目录模式时不允许出现的字符（`*` 允许，例如 `**/bob/**`）
const DIR_FORBIDDEN: &[char] = &['?', '[', ']', '{', '}'];

/// 模式类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Exact,
    DirectorySubtree,
    General,
}

/// 编译后的模式
#[derive(Debug, Clone)]
pub enum ClassifiedPattern {
    /// 精确路径（已规范化）
    Exact(String),
    /// 目录匹配器，作用于目录路径
    DirectorySubtree(GlobMatcher),
    /// 通用匹配器，作用于文件路径
    General(GlobMatcher),
}

impl ClassifiedPattern {
    pub fn kind(&self) -> PatternKind {
        match self {
            ClassifiedPattern::Exact(_) => PatternKind::Exact,
            ClassifiedPattern::DirectorySubtree(_) => PatternKind::DirectorySubtree,
            ClassifiedPattern::General(_) => PatternKind::General,
        }
    }
}

/// 编译失败的模式
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPattern {
    pub pattern: String,
    pub reason: String,
}

/// 不含任何 glob 元字符的模式视为精确文件路径
pub fn is_exact_file_pattern(pattern: &str) -> bool {
    !pattern.contains(GLOB_META)
}

/// 判断模式是否描述一整个目录
///
/// 去掉末尾的 `/*`、`/**` 和 `/` 后，最后一段不能含 `.`（视为扩展名），
/// 任何一段都不能含 `? [ ] { }`。
///
/// 已知局限：`my.app/**` 和 `.git` 这类带点的目录名会被当成文件。
pub fn is_glob_for_folders(pattern: &str) -> bool {
    let base = strip_dir_suffix(pattern);
    let last = base.rsplit('/').next().unwrap_or(base);
    if last.contains('.') {
        return false;
    }
    !base.split('/').any(|part| part.contains(DIR_FORBIDDEN))
}

/// 分类并编译一个 glob
pub fn classify(pattern: &str) -> Result<ClassifiedPattern, InvalidPattern> {
    let trimmed = pattern.trim();
    if trimmed.is_empty() {
        return Err(InvalidPattern {
            pattern: pattern.to_string(),
            reason: "空模式".to_string(),
        });
    }

    if is_exact_file_pattern(trimmed) && !trimmed.ends_with('/') {
        return Ok(ClassifiedPattern::Exact(normalize_path(trimmed)));
    }

    if is_glob_for_folders(trimmed) {
        let base = strip_dir_suffix(trimmed);
        let base = base.trim_start_matches("./");
        if !base.is_empty() {
            return build_matcher(base, pattern).map(ClassifiedPattern::DirectorySubtree);
        }
    }

    build_matcher(trimmed.trim_start_matches("./"), pattern).map(ClassifiedPattern::General)
}

/// 编译排除模式
///
/// 不含 `/` 的模式在任意深度匹配（`utils` 等价于 `**/utils`），
/// 以 `/**` 或 `/` 结尾的模式匹配目录本身，从而阻止向下遍历。
pub fn compile_exclude(pattern: &str) -> Result<GlobMatcher, InvalidPattern> {
    let trimmed = pattern.trim().trim_start_matches("./");
    let anchored = trimmed.trim_end_matches('/').contains('/');
    let mut glob = trimmed.to_string();
    if glob.ends_with('/') || glob.ends_with("/**") {
        glob = strip_dir_suffix(&glob).to_string();
    }
    if glob.is_empty() {
        return Err(InvalidPattern {
            pattern: pattern.to_string(),
            reason: "空模式".to_string(),
        });
    }
    if !anchored && !glob.starts_with("**/") {
        glob = format!("**/{}", glob);
    }
    build_matcher(&glob, pattern)
}

/// 规范化路径：统一分隔符，去掉开头的 `./` 和末尾的 `/`
pub fn normalize_path(raw: &str) -> String {
    let mut path = raw.replace('\\', "/");
    while let Some(rest) = path.strip_prefix("./") {
        path = rest.trim_start_matches('/').to_string();
    }
    while path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    if path.is_empty() {
        ".".to_string()
    } else {
        path
    }
}

/// 拼接父路径和子项名称，保持规范化形式
pub fn join_path(parent: &str, name: &str) -> String {
    match parent {
        "." => name.to_string(),
        "/" => format!("/{}", name),
        _ => format!("{}/{}", parent, name),
    }
}

/// 去掉末尾的 `/*`、`/**`……以及 `/`
fn strip_dir_suffix(pattern: &str) -> &str {
    let mut base = pattern;
    let without_stars = base.trim_end_matches('*');
    if without_stars.len() != base.len() && without_stars.ends_with('/') {
        base = without_stars;
    }
    base.trim_end_matches('/')
}

fn build_matcher(glob: &str, original: &str) -> Result<GlobMatcher, InvalidPattern> {
    GlobBuilder::new(glob)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| InvalidPattern {
            pattern: original.to_string(),
            reason: e.to_string(),
        })
}
