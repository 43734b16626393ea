//! 文件系统配置与操作结果

use crate::consts::{
    DEFAULT_BLOCK_COUNT, DEFAULT_BLOCK_SIZE, DEFAULT_CHECKPOINT_INTERVAL, DEFAULT_JOURNAL_CAPACITY,
};

/// 文件系统构造参数
#[derive(Debug, Clone)]
pub struct FsConfig {
    /// 磁盘总块数
    pub block_count: u32,
    /// 块大小（字节）
    pub block_size: usize,
    /// 是否启用日志（关闭后操作直接改磁盘）
    pub journal_enabled: bool,
    /// 每提交多少个事务做一次检查点（0 = 从不自动检查点）
    pub checkpoint_interval: u32,
    /// 日志记录条数上限
    pub journal_capacity: usize,
    /// 崩溃模拟器的随机种子
    pub crash_seed: u64,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            block_count: DEFAULT_BLOCK_COUNT,
            block_size: DEFAULT_BLOCK_SIZE,
            journal_enabled: true,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            journal_capacity: DEFAULT_JOURNAL_CAPACITY,
            crash_seed: 0,
        }
    }
}

/// 一次文件操作的结局
///
/// 崩溃不是错误：操作按预期被打断，返回 `Crashed`，
/// 调用方随后可以检查损伤并执行恢复。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpStatus {
    /// 操作完整结束（日志模式下含提交标记）
    Done,
    /// 操作被装填的崩溃点打断
    Crashed,
}

impl OpStatus {
    /// 是否完整结束
    pub fn is_done(self) -> bool {
        self == OpStatus::Done
    }
}
