//! 控制台输出
//!
//! 报告写到标准输出，日志由 tracing 写到标准错误。

use crate::core::baseline::Baseline;
use crate::core::models::{Ownership, ScanResult};
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;

/// 报告输出器
pub struct Reporter {
    /// 安静模式下不输出成功信息
    quiet: bool,
}

/// check 的 JSON 输出
#[derive(Debug, Serialize)]
struct CheckReport<'a> {
    #[serde(flatten)]
    result: &'a ScanResult,
    unneeded_baseline: Vec<&'a str>,
}

impl Reporter {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    pub fn info(&self, message: &str) {
        if !self.quiet {
            println!("{}", message);
        }
    }

    /// 失败信息写到标准错误，便于与报告分离
    pub fn error(&self, message: &str) {
        eprintln!("{}", message);
    }

    pub fn line(&self) {
        self.info(&"-".repeat(70));
    }

    /// 输出扫描结果：每个无主文件一行，最后一行汇总
    pub fn scan_text(&self, result: &ScanResult) {
        let mut errors: Vec<_> = result.errors.iter().collect();
        errors.sort();

        if errors.is_empty() {
            self.info(&format!(
                "[✓] 未发现错误，检查了 {} 个目录, {} 个文件",
                result.dirs_tested, result.files_tested
            ));
        } else {
            for error in &errors {
                self.error(&format!("  [X] {}", error));
            }
            self.error(&format!(
                "[X] {} 个错误，检查了 {} 个目录, {} 个文件",
                errors.len(),
                result.dirs_tested,
                result.files_tested
            ));
        }

        if result.cancelled {
            self.error("[X] 扫描被取消，结果不完整");
        }
    }

    /// 每个路径一行：`路径: 判定结果`
    pub fn owners_text(&self, owners: &[(String, Ownership)]) {
        for (path, ownership) in owners {
            let verdict = match ownership {
                Ownership::Owned(owner) => owner.as_str(),
                Ownership::BaselineExempt => "(在基线中)",
                Ownership::Excluded => "(已排除)",
                Ownership::Unowned => "(没有所有者)",
            };
            println!("{}: {}", path, verdict);
        }
    }

    pub fn owners_json(&self, owners: &[(String, Ownership)]) -> Result<()> {
        let report: BTreeMap<&str, &Ownership> =
            owners.iter().map(|(p, o)| (p.as_str(), o)).collect();
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }

    pub fn scan_json(&self, result: &ScanResult, baseline: &Baseline) -> Result<()> {
        let report = CheckReport {
            result,
            unneeded_baseline: baseline.unneeded_records(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }
}
