//! 检查点：回收已提交事务的日志空间
//!
//! 已提交的事务在恢复时只会被跳过，它们的记录纯属死重。
//! 检查点把这些记录（条目和提交标记一起）从日志里删除，
//! 让日志长度与"自上次检查点以来的未完结事务"成正比，
//! 而不是随历史操作数无界增长。

use alloc::collections::BTreeSet;

use super::log_buf::Journal;
use super::types::JournalRecord;
use crate::error::Result;

/// 删除所有已提交事务的记录，返回删掉的条数
///
/// 未提交事务的记录和无法解码的记录一律保留，
/// 它们仍是下一次恢复的输入。
pub fn checkpoint(journal: &mut Journal) -> Result<usize> {
    let mut committed: BTreeSet<u64> = BTreeSet::new();
    for record in journal.records() {
        if let Ok(JournalRecord::Commit { tx_id, .. }) = record {
            committed.insert(tx_id);
        }
    }

    if committed.is_empty() {
        return Ok(0);
    }

    let removed = journal.retain_decoded(|record| match record {
        Ok(JournalRecord::Entry(entry)) => !committed.contains(&entry.tx_id),
        Ok(JournalRecord::Commit { tx_id, .. }) => !committed.contains(tx_id),
        // 损坏的记录留给恢复逻辑处理
        Err(_) => true,
    });

    log::info!(
        "[JOURNAL] checkpoint: {} committed tx, {} records removed, {} remain",
        committed.len(),
        removed,
        journal.len()
    );
    Ok(removed)
}
