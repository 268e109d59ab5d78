//! 命令处理
//!
//! 扫描与判定分开：`run_scan` 产出 `ScanOutput`，`finish_check` / `audit`
//! 只根据它给出通过与否。配置层错误以 `OwnerError` 形式向上传递。

use crate::cli::report::Reporter;
use crate::cli::{Cli, Commands, OutputFormat, ScanArgs};
use crate::core::baseline::Baseline;
use crate::core::cancel::CancellationToken;
use crate::core::errors::OwnerError;
use crate::core::models::{Ownership, ScanResult};
use crate::core::rule_engine::RuleSet;
use crate::storage::baseline_file::{load_baseline, save_baseline};
use crate::storage::config::{Config, ConfigManager, InitOutcome};
use anyhow::Result;
use std::path::PathBuf;
use std::process::ExitCode;

/// 一次扫描的全部产物
pub struct ScanOutput {
    pub config: Config,
    pub rules: RuleSet,
    pub baseline: Baseline,
    pub result: ScanResult,
}

/// 执行命令
pub async fn run(cli: Cli) -> Result<ExitCode> {
    let reporter = Reporter::new(cli.quiet);

    let passed = match cli.command {
        Commands::Check {
            scan,
            update_baseline,
            format,
        } => {
            let output = run_scan(&scan, PathBuf::from("."), cancel_on_ctrl_c()).await?;
            match format {
                OutputFormat::Text => reporter.scan_text(&output.result),
                OutputFormat::Json => reporter.scan_json(&output.result, &output.baseline)?,
            }
            finish_check(&reporter, &output, update_baseline)?
        }
        Commands::Audit { scan } => {
            let output = run_scan(&scan, PathBuf::from("."), cancel_on_ctrl_c()).await?;
            audit(&reporter, &output)
        }
        Commands::Owner {
            paths,
            config,
            path_baseline,
            format,
        } => owner(&reporter, &paths, config, path_baseline, format)?,
        Commands::Init { config, update } => {
            init(&reporter, config, update)?;
            true
        }
    };

    Ok(if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn load_config(config: Option<PathBuf>) -> Result<Config, OwnerError> {
    ConfigManager::new(config.unwrap_or_else(ConfigManager::default_path)).load()
}

/// 加载配置、构建规则、执行扫描，相对路径基于 `base_dir`
pub async fn run_scan(
    args: &ScanArgs,
    base_dir: PathBuf,
    cancel: CancellationToken,
) -> Result<ScanOutput> {
    let config = load_config(args.config.clone())?
        .with_overrides(&args.paths, args.path_baseline.clone());
    config.validate()?;

    let rules = RuleSet::new(&config.features);
    let mut baseline = load_baseline(&config.path_baseline)?;
    let result = config
        .scanner(base_dir)
        .cancellation(cancel)
        .scan(&rules, &mut baseline)
        .await;

    if result.is_empty_scan() && !result.cancelled {
        return Err(OwnerError::NothingToScan.into());
    }

    Ok(ScanOutput {
        config,
        rules,
        baseline,
        result,
    })
}

/// Ctrl-C 时取消扫描，保留已完成部分
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let handle = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("收到中断信号，正在停止扫描");
            handle.cancel();
        }
    });
    token
}

/// check 的判定：有无主文件或扫描被取消则失败；
/// `update_baseline` 时改为写回基线并视为通过，但不接受不完整的扫描
pub fn finish_check(reporter: &Reporter, output: &ScanOutput, update_baseline: bool) -> Result<bool> {
    if update_baseline {
        if output.result.cancelled {
            anyhow::bail!("扫描未完成，拒绝更新基线");
        }
        save_baseline(&output.config.path_baseline, &output.baseline)?;
        reporter.info(&format!(
            "[✓] 基线已更新: {} (新增 {} 条, 移除 {} 条)",
            output.config.path_baseline.display(),
            output.baseline.to_add().len(),
            output.baseline.unneeded_records().len()
        ));
        return Ok(true);
    }

    Ok(output.result.errors.is_empty() && !output.result.cancelled)
}

/// 严格检查，返回是否通过
pub fn audit(reporter: &Reporter, output: &ScanOutput) -> bool {
    let checks: [fn(&Reporter, &ScanOutput) -> Option<String>; 4] = [
        ownership_errors,
        unneeded_baseline_files,
        ownerless_features,
        invalid_patterns,
    ];

    let mut summaries = Vec::new();
    for check in checks {
        reporter.line();
        if let Some(summary) = check(reporter, output) {
            summaries.push(summary);
        }
    }

    reporter.line();
    if summaries.is_empty() && !output.result.cancelled {
        reporter.info("[✓] 审计通过");
        reporter.line();
        return true;
    }

    reporter.error("[X] 审计失败");
    for summary in &summaries {
        reporter.error(&format!(" - [X] {}", summary));
    }
    reporter.line();
    false
}

fn ownership_errors(reporter: &Reporter, output: &ScanOutput) -> Option<String> {
    reporter.scan_text(&output.result);
    let count = output.result.errors.len();
    (count > 0).then(|| format!("归属错误: {} 个文件没有所有者", count))
}

fn unneeded_baseline_files(reporter: &Reporter, output: &ScanOutput) -> Option<String> {
    let unneeded = output.baseline.unneeded_records();
    if unneeded.is_empty() {
        reporter.info("[✓] 基线中没有过期记录");
        return None;
    }

    reporter.error("[X] 基线包含过期记录:");
    for file in &unneeded {
        reporter.error(&format!("  {}", file));
    }
    Some(format!("基线包含 {} 条过期记录", unneeded.len()))
}

fn ownerless_features(reporter: &Reporter, output: &ScanOutput) -> Option<String> {
    let features = output.rules.ownerless_features();
    if features.is_empty() {
        reporter.info("[✓] 所有功能都有所有者");
        return None;
    }

    reporter.error("[X] 没有所有者的功能:");
    for feature in features {
        reporter.error(&format!("  [X] {}", feature));
    }
    Some(format!("配置中有 {} 个功能没有所有者", features.len()))
}

fn invalid_patterns(reporter: &Reporter, output: &ScanOutput) -> Option<String> {
    let invalid = output.rules.invalid_patterns();
    if invalid.is_empty() {
        reporter.info("[✓] 所有 glob 模式均有效");
        return None;
    }

    reporter.error("[X] 无效的 glob 模式:");
    for pattern in invalid {
        reporter.error(&format!("  [X] {} ({})", pattern.pattern, pattern.reason));
    }
    Some(format!("配置中有 {} 个无效模式", invalid.len()))
}

/// 查询给定路径的所有者，有无主路径时失败
fn owner(
    reporter: &Reporter,
    paths: &[String],
    config: Option<PathBuf>,
    path_baseline: Option<PathBuf>,
    format: OutputFormat,
) -> Result<bool> {
    let config = load_config(config)?.with_overrides(&[], path_baseline);
    let owners = config.find_owners(paths)?;

    match format {
        OutputFormat::Text => reporter.owners_text(&owners),
        OutputFormat::Json => reporter.owners_json(&owners)?,
    }

    Ok(owners
        .iter()
        .all(|(_, ownership)| *ownership != Ownership::Unowned))
}

fn init(reporter: &Reporter, config: Option<PathBuf>, update: bool) -> Result<()> {
    let manager = ConfigManager::new(config.unwrap_or_else(ConfigManager::default_path));
    let outcome = manager.init(update)?;

    let message = match outcome {
        InitOutcome::Created => format!("[✓] 已生成默认配置: {}", manager.path().display()),
        InitOutcome::Updated => format!("[✓] 已补全配置: {}", manager.path().display()),
        InitOutcome::AlreadyExists => format!(
            "配置已存在: {}（使用 --update 补全缺失选项）",
            manager.path().display()
        ),
    };
    reporter.info(&message);
    Ok(())
}
