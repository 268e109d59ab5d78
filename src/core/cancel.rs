//! 取消令牌
//!
//! 由命令层在收到中断信号时触发，扫描器据此停止派发新工作。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 扫描的协作式取消令牌
///
/// 克隆后共享同一状态。扫描器在每次处理路径前检查。
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}
