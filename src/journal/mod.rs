//! 写前日志（WAL）实现
//!
//! 这个模块提供事务日志的全部功能，实现崩溃一致性的可恢复路径。
//!
//! # 架构概述
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            JournalingFileSystem              │
//! │      create_file / write_file / delete_file  │
//! └───────────────────────┬──────────────────────┘
//!                         │ 每个操作 = 一个事务
//!                         ▼
//! ┌──────────────────────────────────────────────┐
//! │                Journal Core                  │
//! │  ┌───────────┐  ┌────────────┐  ┌─────────┐  │
//! │  │  Journal  │  │ Transaction│  │ recovery│  │
//! │  │ (记录日志) │  │ (状态机)   │  │ (重放)  │  │
//! │  └───────────┘  └────────────┘  └─────────┘  │
//! └───────────────────────┬──────────────────────┘
//!                         │ redo 写回
//!                         ▼
//! ┌──────────────────────────────────────────────┐
//! │                 VirtualDisk                  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # 协议
//!
//! 1. 事务的全部条目先追加到日志并 flush，事务进入 Logged；
//! 2. 然后才允许对 VirtualDisk 产生副作用（写前日志不变式）；
//! 3. 磁盘副作用完成后写入提交标记，事务进入 Committed；
//! 4. 检查点定期清除已提交事务的记录，日志长度有界。
//!
//! 记录格式见 [`types`]：小端编码，magic + 尾部 CRC32C，
//! 事务内最后一个条目带 LAST 标志。恢复时没有 LAST 条目的
//! 事务视为 Open，直接丢弃。

pub mod types;

mod checkpoint;
mod log_buf;
mod recovery;

pub use checkpoint::checkpoint;
pub use log_buf::{Journal, JournalStats};
pub use recovery::{recover, RecoveryReport};
pub use types::{JournalEntry, JournalRecord, OpKind, RecordError, Transaction, TxState};

/// Journal 内部错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalError {
    /// 记录校验和或 magic 不匹配
    CorruptRecord,
    /// 记录长度不完整
    Truncated,
    /// 日志空间不足（需要检查点）
    NoSpace,
}

impl core::fmt::Display for JournalError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            JournalError::CorruptRecord => write!(f, "Journal record corrupted"),
            JournalError::Truncated => write!(f, "Journal record truncated"),
            JournalError::NoSpace => write!(f, "Journal has no space"),
        }
    }
}
