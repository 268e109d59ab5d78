//! 基线文件读写
//!
//! 格式：`{ version: 1, files: [排序后的相对路径] }`

use crate::core::baseline::{Baseline, BaselineRecord};
use crate::core::errors::OwnerError;
use std::path::Path;

/// 加载基线，文件不存在时返回空基线
pub fn load_baseline(path: &Path) -> Result<Baseline, OwnerError> {
    if !path.exists() {
        tracing::debug!("基线文件不存在，使用空基线: {}", path.display());
        return Ok(Baseline::default());
    }

    let content = std::fs::read_to_string(path).map_err(|source| OwnerError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if content.trim().is_empty() {
        return Ok(Baseline::default());
    }

    let record: BaselineRecord =
        serde_yaml::from_str(&content).map_err(|source| OwnerError::InvalidBaseline {
            path: path.to_path_buf(),
            source,
        })?;
    tracing::debug!("已加载基线 {}: {} 条记录", path.display(), record.files.len());
    Ok(Baseline::from_record(record))
}

/// 写回基线：保留仍命中的记录加上新发现的无主文件
pub fn save_baseline(path: &Path, baseline: &Baseline) -> Result<(), OwnerError> {
    let record = baseline.to_record();
    let content = serde_yaml::to_string(&record).map_err(|source| OwnerError::InvalidBaseline {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, content).map_err(|source| OwnerError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!("已更新基线 {}: {} 条记录", path.display(), record.files.len());
    Ok(())
}
