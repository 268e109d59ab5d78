//! 文件扫描模块
//!
//! 从给定的根路径出发并发遍历目录树，为每个文件判定归属。
//!
//! 调度器是唯一持有遍历状态（待处理队列、进行中集合、计数器、错误列表、基线）的一方。
//! 文件系统操作在独立任务中执行，只做IO，完成后通过通道把事件发回调度器。
//! 每次有任务完成都会重新调度并检查是否结束，所以结束判定不会早于子目录入队。
//!
//! 这是尽力而为的扫描：读取目录失败只记录日志，该目录下的内容不再访问，其余部分继续。

use crate::core::baseline::Baseline;
use crate::core::cancel::CancellationToken;
use crate::core::models::{Ownership, OwnershipError, ScanResult};
use crate::core::pattern::{compile_exclude, join_path, normalize_path};
use crate::core::rule_engine::RuleSet;
use globset::GlobMatcher;
use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// 默认并发数
pub const DEFAULT_CONCURRENCY: usize = 10;

/// 单次文件系统调用的默认超时
pub const DEFAULT_FS_TIMEOUT: Duration = Duration::from_secs(30);

/// 永远不参与归属检查的文件名
const COMMON_IGNORED_FILES: &[&str] = &[".env", ".DS_Store"];

/// 文件扫描器
pub struct FileScanner {
    /// 相对路径的解析基准目录
    base_dir: PathBuf,
    /// 扫描根路径（已规范化）
    roots: Vec<String>,
    /// 排除模式
    exclude: Vec<GlobMatcher>,
    /// 最大并发文件系统操作数
    concurrency: usize,
    /// 单次文件系统调用超时
    fs_timeout: Duration,
    /// 取消令牌
    cancel: CancellationToken,
}

/// 交给IO任务的工作
enum Task {
    Stat(String),
    List(String),
}

/// IO任务完成后发回调度器的事件
enum ScanEvent {
    Stat {
        path: String,
        result: io::Result<bool>,
    },
    Listed {
        path: String,
        result: io::Result<Vec<String>>,
    },
}

/// 调度器独占的遍历状态
#[derive(Default)]
struct Walk {
    pending: VecDeque<String>,
    in_flight: HashSet<String>,
    visited: HashSet<String>,
    result: ScanResult,
}

impl Walk {
    fn push(&mut self, path: String) {
        if self.visited.insert(path.clone()) {
            self.pending.push_back(path);
        }
    }

    fn is_done(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }
}

impl FileScanner {
    /// 创建新的扫描器，相对路径基于 `base_dir` 解析
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            roots: Vec::new(),
            exclude: Vec::new(),
            concurrency: DEFAULT_CONCURRENCY,
            fs_timeout: DEFAULT_FS_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }

    /// 添加扫描根路径
    pub fn root(mut self, path: &str) -> Self {
        let path = normalize_path(path);
        if !self.roots.contains(&path) {
            self.roots.push(path);
        }
        self
    }

    /// 批量添加扫描根路径
    pub fn roots<I, S>(self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        paths
            .into_iter()
            .fold(self, |scanner, p| scanner.root(p.as_ref()))
    }

    /// 添加排除模式，无效模式只警告
    pub fn exclude(mut self, pattern: &str) -> Self {
        match compile_exclude(pattern) {
            Ok(m) => self.exclude.push(m),
            Err(invalid) => {
                tracing::warn!("无效的排除模式: {} ({})", invalid.pattern, invalid.reason);
            }
        }
        self
    }

    /// 设置最大并发数（至少为1）
    pub fn concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    /// 设置单次文件系统调用超时
    pub fn fs_timeout(mut self, timeout: Duration) -> Self {
        self.fs_timeout = timeout;
        self
    }

    /// 设置取消令牌
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// 执行扫描
    pub async fn scan(&self, rules: &RuleSet, baseline: &mut Baseline) -> ScanResult {
        let started = Instant::now();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut walk = Walk::default();
        for root in &self.roots {
            tracing::debug!("处理扫描路径: {}", root);
            walk.push(root.clone());
        }

        loop {
            self.schedule(&mut walk, &tx);

            if walk.is_done() {
                break;
            }

            // 调度器持有 tx，通道不会关闭
            let Some(event) = rx.recv().await else {
                break;
            };
            self.apply(event, &mut walk, rules, baseline, &tx);
        }

        tracing::debug!("扫描耗时 {}ms", started.elapsed().as_millis());
        tracing::info!(
            "扫描完成: {} 个目录, {} 个文件, {} 个无主文件",
            walk.result.dirs_tested,
            walk.result.files_tested,
            walk.result.errors.len()
        );
        walk.result
    }

    /// 不遍历目录树，直接判定单个路径的归属
    ///
    /// 与扫描保持一致：祖先目录命中排除列表或目录规则时，
    /// 路径随之被排除或归属于该目录的所有者。路径本身按文件处理。
    pub fn lookup(&self, rules: &RuleSet, baseline: &mut Baseline, path: &str) -> Ownership {
        let path = normalize_path(path);

        for dir in ancestors(&path) {
            if self.is_excluded(dir) {
                return Ownership::Excluded;
            }
            if let Some(owner) = rules.owner_of_directory(dir) {
                return Ownership::Owned(owner.to_string());
            }
        }

        if self.is_excluded(&path) {
            return Ownership::Excluded;
        }
        rules.resolve(baseline, &path)
    }

    /// 在并发上限内从待处理队列中取出路径并派发
    fn schedule(&self, walk: &mut Walk, tx: &mpsc::UnboundedSender<ScanEvent>) {
        while walk.in_flight.len() < self.concurrency {
            let Some(path) = walk.pending.pop_front() else {
                break;
            };

            if self.cancel.is_cancelled() {
                tracing::warn!("扫描已取消，丢弃 {} 个待处理路径", walk.pending.len() + 1);
                walk.pending.clear();
                walk.result.cancelled = true;
                break;
            }

            if self.is_excluded(&path) {
                self.record(walk, path, Ownership::Excluded);
                continue;
            }

            walk.in_flight.insert(path.clone());
            self.dispatch(Task::Stat(path), tx);
        }
    }

    /// 处理一个完成事件，所有状态修改都在这里进行
    fn apply(
        &self,
        event: ScanEvent,
        walk: &mut Walk,
        rules: &RuleSet,
        baseline: &mut Baseline,
        tx: &mpsc::UnboundedSender<ScanEvent>,
    ) {
        match event {
            ScanEvent::Stat {
                path,
                result: Ok(true),
            } => {
                walk.result.dirs_tested += 1;
                tracing::debug!("检查目录: {}", path);

                if let Some(owner) = rules.owner_of_directory(&path) {
                    tracing::debug!("[✓] 目录: {} 所有者: {}", path, owner);
                    walk.in_flight.remove(&path);
                    return;
                }

                // 继续占用并发槽直到目录列完
                self.dispatch(Task::List(path), tx);
            }
            ScanEvent::Stat {
                path,
                result: Ok(false),
            } => {
                walk.in_flight.remove(&path);

                if is_common_ignored_file(&path) {
                    tracing::debug!("跳过常见忽略文件: {}", path);
                    return;
                }

                walk.result.files_tested += 1;
                let outcome = rules.resolve(baseline, &path);
                self.record(walk, path, outcome);
            }
            ScanEvent::Stat {
                path,
                result: Err(e),
            } => {
                walk.in_flight.remove(&path);
                tracing::warn!("无法读取 {} 的元数据: {}", path, e);
            }
            ScanEvent::Listed {
                path,
                result: Ok(names),
            } => {
                walk.in_flight.remove(&path);
                for name in names {
                    walk.push(join_path(&path, &name));
                }
            }
            ScanEvent::Listed {
                path,
                result: Err(e),
            } => {
                walk.in_flight.remove(&path);
                tracing::error!("读取目录失败: {}: {}", path, e);
            }
        }
    }

    /// 记录单个路径的判定结果
    fn record(&self, walk: &mut Walk, path: String, outcome: Ownership) {
        match outcome {
            Ownership::Owned(owner) => {
                tracing::debug!("[✓] 文件: {} 所有者: {}", path, owner);
            }
            Ownership::BaselineExempt => {
                tracing::debug!("[✓] 文件: {} 在基线中", path);
            }
            Ownership::Excluded => {
                tracing::debug!("跳过: 命中排除列表 {}", path);
            }
            Ownership::Unowned => {
                tracing::debug!("[X] {} 没有所有者", path);
                walk.result.errors.push(OwnershipError::UnownedFile { path });
            }
        }
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.exclude.iter().any(|m| m.is_match(path))
    }

    /// 在独立任务中执行文件系统操作，结果通过通道返回
    fn dispatch(&self, task: Task, tx: &mpsc::UnboundedSender<ScanEvent>) {
        let tx = tx.clone();
        let base_dir = self.base_dir.clone();
        let limit = self.fs_timeout;

        tokio::spawn(async move {
            let event = match task {
                Task::Stat(path) => {
                    let full = base_dir.join(&path);
                    let result = with_timeout(limit, async {
                        tokio::fs::metadata(&full).await.map(|m| m.is_dir())
                    })
                    .await;
                    ScanEvent::Stat { path, result }
                }
                Task::List(path) => {
                    let full = base_dir.join(&path);
                    let result = with_timeout(limit, list_dir(&full)).await;
                    ScanEvent::Listed { path, result }
                }
            };
            // 接收端只会在扫描结束后释放
            let _ = tx.send(event);
        });
    }
}

/// 列出目录下的子项名称（排序后返回，保证派发顺序稳定）
async fn list_dir(dir: &Path) -> io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

async fn with_timeout<T>(limit: Duration, fut: impl Future<Output = io::Result<T>>) -> io::Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("文件系统操作超过 {}ms", limit.as_millis()),
        )),
    }
}

/// 由浅到深列出路径的祖先目录（不含路径本身）
fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/')
        .map(move |(i, _)| &path[..i])
        .filter(|dir| !dir.is_empty())
}

/// 判断是否为常见的忽略文件（如 `.env`、`.DS_Store`）
pub fn is_common_ignored_file(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    COMMON_IGNORED_FILES.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{Feature, Features};
    use std::fs;
    use tempfile::tempdir;

    fn write_file(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "file1").unwrap();
    }

    fn rules(owner: &str, patterns: &[&str]) -> RuleSet {
        let features: Features = [("billing", Feature::new(owner, patterns))]
            .into_iter()
            .collect();
        RuleSet::new(&features)
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        for file in ["src/main.cpp", "src/utils/str.cpp", "src/utils/tax.cpp", "readme.md"] {
            write_file(dir.path(), file);
        }
        dir
    }

    #[tokio::test]
    async fn test_scan_reports_unowned_files() {
        let dir = fixture();
        let scanner = FileScanner::new(dir.path().to_path_buf()).root("./src");
        let mut baseline = Baseline::default();

        let result = scanner.scan(&rules("donut", &["**/tax.cpp"]), &mut baseline).await;

        assert_eq!(result.unowned_paths(), vec!["src/main.cpp", "src/utils/str.cpp"]);
        assert_eq!(result.files_tested, 3);
        assert_eq!(result.dirs_tested, 2);
        assert!(!result.cancelled);
    }

    #[tokio::test]
    async fn test_baseline_files_are_exempt() {
        let dir = fixture();
        let scanner = FileScanner::new(dir.path().to_path_buf()).root("src/");
        let mut baseline = Baseline::new(vec!["src/main.cpp".to_string()]);

        let result = scanner.scan(&rules("donut", &["**/tax.cpp"]), &mut baseline).await;

        assert_eq!(result.unowned_paths(), vec!["src/utils/str.cpp"]);
        assert_eq!(result.files_tested, 3);
        assert!(baseline.unneeded_records().is_empty());
        assert_eq!(baseline.to_add(), vec!["src/utils/str.cpp"]);
    }

    #[tokio::test]
    async fn test_excluded_subtree_is_never_counted() {
        let dir = fixture();
        let scanner = FileScanner::new(dir.path().to_path_buf())
            .root("src")
            .exclude("utils");
        let mut baseline = Baseline::default();

        let result = scanner.scan(&rules("donut", &["**/tax.cpp"]), &mut baseline).await;

        assert_eq!(result.unowned_paths(), vec!["src/main.cpp"]);
        assert_eq!(result.files_tested, 1);
        assert_eq!(result.dirs_tested, 1);
    }

    #[tokio::test]
    async fn test_excluded_file_is_not_reported() {
        let dir = fixture();
        let scanner = FileScanner::new(dir.path().to_path_buf())
            .root("src")
            .exclude("*.cpp");
        let mut baseline = Baseline::default();

        let result = scanner.scan(&rules("donut", &[]), &mut baseline).await;

        assert!(result.errors.is_empty());
        assert_eq!(result.files_tested, 0);
        assert_eq!(result.dirs_tested, 2);
        assert!(baseline.to_add().is_empty());
    }

    #[tokio::test]
    async fn test_owned_directory_is_pruned() {
        let dir = tempdir().unwrap();
        for i in 0..50 {
            write_file(dir.path(), &format!("src/vendor/pkg{}/file{}.c", i % 5, i));
        }
        write_file(dir.path(), "src/app.c");

        let scanner = FileScanner::new(dir.path().to_path_buf()).root("src");
        let mut baseline = Baseline::default();
        let result = scanner
            .scan(&rules("vendor-team", &["src/vendor/**"]), &mut baseline)
            .await;

        assert_eq!(result.dirs_tested, 2);
        assert_eq!(result.files_tested, 1);
        assert_eq!(result.unowned_paths(), vec!["src/app.c"]);
    }

    #[tokio::test]
    async fn test_common_ignored_files_are_skipped() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), "app/.env");
        write_file(dir.path(), "app/.DS_Store");
        write_file(dir.path(), "app/main.rs");

        let scanner = FileScanner::new(dir.path().to_path_buf()).root("app");
        let mut baseline = Baseline::default();
        let result = scanner.scan(&rules("donut", &[]), &mut baseline).await;

        assert_eq!(result.unowned_paths(), vec!["app/main.rs"]);
        assert_eq!(result.files_tested, 1);
    }

    #[tokio::test]
    async fn test_single_file_root() {
        let dir = fixture();
        let scanner = FileScanner::new(dir.path().to_path_buf())
            .root("readme.md")
            .root("./readme.md");
        let mut baseline = Baseline::default();
        let result = scanner.scan(&rules("docs", &["readme.md"]), &mut baseline).await;

        assert!(result.errors.is_empty());
        assert_eq!(result.files_tested, 1);
        assert_eq!(result.dirs_tested, 0);
    }

    #[tokio::test]
    async fn test_overlapping_roots_visit_files_once() {
        let dir = fixture();
        let scanner = FileScanner::new(dir.path().to_path_buf())
            .root("src/utils")
            .root("src");
        let mut baseline = Baseline::default();
        let result = scanner.scan(&rules("donut", &["**/tax.cpp"]), &mut baseline).await;

        assert_eq!(result.files_tested, 3);
        assert_eq!(result.dirs_tested, 2);
        assert_eq!(result.errors.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_root_is_logged_and_skipped() {
        let dir = fixture();
        let scanner = FileScanner::new(dir.path().to_path_buf())
            .root("does-not-exist")
            .root("src");
        let mut baseline = Baseline::default();
        let result = scanner.scan(&rules("donut", &["**/*.cpp"]), &mut baseline).await;

        assert!(result.errors.is_empty());
        assert_eq!(result.files_tested, 3);
    }

    #[tokio::test]
    async fn test_no_roots_finishes_empty() {
        let dir = tempdir().unwrap();
        let scanner = FileScanner::new(dir.path().to_path_buf());
        let mut baseline = Baseline::default();
        let result = scanner.scan(&RuleSet::default(), &mut baseline).await;

        assert!(result.is_empty_scan());
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn test_counts_do_not_depend_on_concurrency() {
        let dir = tempdir().unwrap();
        for i in 0..120 {
            write_file(dir.path(), &format!("tree/d{}/e{}/f{}.txt", i % 7, i % 3, i));
        }

        let mut totals = Vec::new();
        for limit in [1, 2, 10, 64] {
            let scanner = FileScanner::new(dir.path().to_path_buf())
                .root("tree")
                .concurrency(limit);
            let mut baseline = Baseline::default();
            let result = scanner.scan(&RuleSet::default(), &mut baseline).await;
            totals.push((result.files_tested, result.dirs_tested, result.errors.len()));
        }

        // 1 + 7 + 7*3 个目录
        assert!(totals.iter().all(|t| *t == (120, 29, 120)), "{totals:?}");
    }

    #[tokio::test]
    async fn test_cancelled_scan_returns_partial_result() {
        let dir = fixture();
        let token = CancellationToken::new();
        token.cancel();

        let scanner = FileScanner::new(dir.path().to_path_buf())
            .root("src")
            .cancellation(token);
        let mut baseline = Baseline::default();
        let result = scanner.scan(&RuleSet::default(), &mut baseline).await;

        assert!(result.cancelled);
        assert!(result.is_empty_scan());
    }

    #[tokio::test]
    async fn test_slow_fs_call_times_out() {
        let result = with_timeout(
            Duration::from_millis(10),
            std::future::pending::<io::Result<()>>(),
        )
        .await;
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn test_generous_timeout_scans_normally() {
        let dir = fixture();
        let scanner = FileScanner::new(dir.path().to_path_buf())
            .root("src")
            .fs_timeout(Duration::from_secs(120));
        let mut baseline = Baseline::default();
        let result = scanner.scan(&rules("donut", &["**/*.cpp"]), &mut baseline).await;
        assert!(result.errors.is_empty());
        assert_eq!(result.files_tested, 3);
    }

    #[test]
    fn test_lookup_follows_scan_semantics() {
        let features: Features = [
            ("vendor", Feature::new("vendor-team", &["src/vendor/**"])),
            ("billing", Feature::new("donut", &["**/tax.cpp"])),
        ]
        .into_iter()
        .collect();
        let rules = RuleSet::new(&features);
        let scanner = FileScanner::new(PathBuf::from(".")).exclude("generated");
        let mut baseline = Baseline::new(vec!["./src/legacy.cpp".to_string()]);

        let lookup = |baseline: &mut Baseline, path: &str| scanner.lookup(&rules, baseline, path);

        assert_eq!(
            lookup(&mut baseline, "./src/utils/tax.cpp"),
            Ownership::Owned("donut".to_string())
        );
        assert_eq!(
            lookup(&mut baseline, "src/vendor/zlib/inflate.c"),
            Ownership::Owned("vendor-team".to_string())
        );
        assert_eq!(
            lookup(&mut baseline, "src/generated/tax.cpp"),
            Ownership::Excluded
        );
        assert_eq!(lookup(&mut baseline, "src/legacy.cpp"), Ownership::BaselineExempt);
        assert_eq!(lookup(&mut baseline, "src/main.cpp"), Ownership::Unowned);
    }

    #[test]
    fn test_ancestors() {
        assert_eq!(ancestors("a/b/c.txt").collect::<Vec<_>>(), vec!["a", "a/b"]);
        assert_eq!(ancestors("/a/b").collect::<Vec<_>>(), vec!["/a"]);
        assert_eq!(ancestors("c.txt").count(), 0);
    }

    #[test]
    fn test_is_common_ignored_file() {
        assert!(is_common_ignored_file(".env"));
        assert!(is_common_ignored_file("a/b/.DS_Store"));
        assert!(!is_common_ignored_file("a/b/.envrc"));
    }
}
