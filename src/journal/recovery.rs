//! 崩溃恢复（redo 重放）
//!
//! 从最老的记录开始扫描日志，把事务按三类处理：
//!
//! - **Logged 未 Committed**（有 LAST 条目、无提交标记）：
//!   幂等地重放到 VirtualDisk，然后补写提交标记；
//! - **Open**（没有 LAST 条目）：丢弃，等价于操作从未发生；
//! - **Committed**：跳过（重放必须是无操作或收敛到同一终态）。
//!
//! 校验和不匹配的记录连同同一事务的后续条目一起丢弃，
//! 不完整的事务永远不会被部分应用。记录是逐条存放的，
//! 所以连头部都不可读的记录只影响它自己：跳过并继续扫描，
//! 后面事务的重放不受牵连。

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use super::log_buf::Journal;
use super::types::{JournalEntry, JournalRecord, OpKind};
use crate::crc;
use crate::disk::{InodeState, VirtualDisk};
use crate::error::{ErrorKind, Result};

/// 一次恢复的结果统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecoveryReport {
    /// 重放（redo）的事务数
    pub replayed: u32,
    /// 已提交、直接跳过的事务数
    pub skipped_committed: u32,
    /// 未到 Logged、被丢弃的事务数
    pub discarded_open: u32,
    /// 校验和不匹配的记录数
    pub corrupted_entries: u32,
}

/// 扫描阶段收集的单个事务视图
#[derive(Debug)]
struct TxScan {
    tx_id: u64,
    entries: Vec<JournalEntry>,
    committed: bool,
    complete: bool,
    poisoned: bool,
}

/// 执行日志恢复
///
/// # 参数
///
/// * `journal` - 日志（重放成功后补写提交标记）
/// * `disk` - 虚拟磁盘
/// * `namespace` - 文件名 → inode 映射，随重放一起修复
pub fn recover(
    journal: &mut Journal,
    disk: &mut VirtualDisk,
    namespace: &mut BTreeMap<String, u32>,
) -> Result<RecoveryReport> {
    let mut report = RecoveryReport::default();

    // 阶段 1：扫描，按首次出现的顺序聚合事务
    let mut order: Vec<TxScan> = Vec::new();
    let mut index: BTreeMap<u64, usize> = BTreeMap::new();

    for record in journal.records() {
        match record {
            Ok(JournalRecord::Entry(entry)) => {
                let slot = tx_slot(&mut order, &mut index, entry.tx_id);
                if slot.poisoned {
                    // 损坏条目之后的同事务条目一并丢弃
                    continue;
                }
                slot.complete |= entry.last;
                slot.entries.push(entry);
            }
            Ok(JournalRecord::Commit { tx_id, .. }) => {
                tx_slot(&mut order, &mut index, tx_id).committed = true;
            }
            Err(err) => {
                report.corrupted_entries += 1;
                match err.tx_id {
                    Some(tx_id) => {
                        log::warn!("[RECOVER] corrupt record in tx={}, discarding tail", tx_id);
                        tx_slot(&mut order, &mut index, tx_id).poisoned = true;
                    }
                    None => {
                        // 头部不可读，无法归属到任何事务：只丢这一条
                        log::warn!("[RECOVER] unreadable record header, skipping");
                    }
                }
            }
        }
    }

    // 阶段 2：重放
    for tx in &order {
        if tx.poisoned {
            log::warn!("[RECOVER] tx={} discarded (corrupted)", tx.tx_id);
            continue;
        }
        if tx.committed {
            report.skipped_committed += 1;
            continue;
        }
        if !tx.complete {
            log::debug!("[RECOVER] tx={} discarded (never logged)", tx.tx_id);
            report.discarded_open += 1;
            continue;
        }

        for entry in &tx.entries {
            apply_entry(disk, namespace, entry)?;
        }
        journal.append_commit(tx.tx_id)?;
        journal.flush();
        report.replayed += 1;
        log::info!(
            "[RECOVER] tx={} replayed ({} entries)",
            tx.tx_id,
            tx.entries.len()
        );
    }

    log::info!(
        "[RECOVER] done: replayed={} committed={} open={} corrupted={}",
        report.replayed,
        report.skipped_committed,
        report.discarded_open,
        report.corrupted_entries
    );
    Ok(report)
}

fn tx_slot<'a>(
    order: &'a mut Vec<TxScan>,
    index: &mut BTreeMap<u64, usize>,
    tx_id: u64,
) -> &'a mut TxScan {
    let slot = *index.entry(tx_id).or_insert_with(|| {
        order.push(TxScan {
            tx_id,
            entries: Vec::new(),
            committed: false,
            complete: false,
            poisoned: false,
        });
        order.len() - 1
    });
    &mut order[slot]
}

/// 幂等地把一个条目重放到磁盘
///
/// payload 携带完整目标内容，所以重放要么是无操作
/// （磁盘已收敛），要么从头重做整个写入，覆盖半成品状态。
fn apply_entry(
    disk: &mut VirtualDisk,
    namespace: &mut BTreeMap<String, u32>,
    entry: &JournalEntry,
) -> Result<()> {
    match entry.op {
        OpKind::Create | OpKind::Write => {
            let want = crc::checksum32(&entry.payload);
            if let Some(inode) = disk.inode(entry.inode_id) {
                if inode.state == InodeState::Committed
                    && inode.checksum == want
                    && inode.size == entry.payload.len() as u64
                {
                    // 已收敛，重放为无操作
                    namespace.insert(entry.name.clone(), entry.inode_id);
                    return Ok(());
                }
            }

            if !disk.contains_live(entry.inode_id) {
                let needed = disk.blocks_needed(entry.payload.len());
                disk.allocate(entry.inode_id, needed)?;
            }
            disk.write(entry.inode_id, &entry.payload)?;
            namespace.insert(entry.name.clone(), entry.inode_id);
        }
        OpKind::Delete => {
            match disk.delete(entry.inode_id) {
                Ok(()) => {}
                // 从未应用过的删除：重放为无操作
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err),
            }
            namespace.remove(&entry.name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::DiskConfig;
    use alloc::string::ToString;

    fn setup() -> (Journal, VirtualDisk, BTreeMap<String, u32>) {
        (
            Journal::new(64),
            VirtualDisk::new(&DiskConfig::new(32, 64)).unwrap(),
            BTreeMap::new(),
        )
    }

    fn create_entry(tx_id: u64, inode_id: u32, name: &str, payload: &[u8]) -> JournalEntry {
        JournalEntry {
            tx_id,
            seq: 0,
            op: OpKind::Create,
            inode_id,
            name: name.to_string(),
            payload: payload.to_vec(),
            last: true,
        }
    }

    #[test]
    fn test_redo_logged_transaction() {
        let (mut journal, mut disk, mut ns) = setup();
        let data = [5u8; 100];

        // Logged 但从未应用
        journal.append_entry(create_entry(1, 1, "a", &data)).unwrap();
        journal.flush();

        let report = recover(&mut journal, &mut disk, &mut ns).unwrap();
        assert_eq!(report.replayed, 1);
        assert_eq!(disk.read(1).unwrap(), data);
        assert_eq!(ns.get("a"), Some(&1));
    }

    #[test]
    fn test_open_transaction_discarded() {
        let (mut journal, mut disk, mut ns) = setup();

        // 没有 LAST 标志：事务未到 Logged
        let mut entry = create_entry(1, 1, "a", &[1u8; 10]);
        entry.last = false;
        journal.append_entry(entry).unwrap();
        journal.flush();

        let report = recover(&mut journal, &mut disk, &mut ns).unwrap();
        assert_eq!(report.discarded_open, 1);
        assert_eq!(report.replayed, 0);
        assert!(disk.inode(1).is_none());
    }

    #[test]
    fn test_committed_transaction_skipped() {
        let (mut journal, mut disk, mut ns) = setup();
        let data = [9u8; 30];

        // 模拟已完整提交的事务：磁盘上有数据，日志里有提交标记
        disk.allocate(1, 1).unwrap();
        disk.write(1, &data).unwrap();
        ns.insert("a".to_string(), 1);
        journal.append_entry(create_entry(1, 1, "a", &data)).unwrap();
        journal.append_commit(1).unwrap();
        journal.flush();

        let before = disk.mutation_count();
        let report = recover(&mut journal, &mut disk, &mut ns).unwrap();
        assert_eq!(report.skipped_committed, 1);
        assert_eq!(disk.mutation_count(), before);
    }

    #[test]
    fn test_redo_is_idempotent() {
        let (mut journal, mut disk, mut ns) = setup();
        let data = [7u8; 150];

        journal.append_entry(create_entry(1, 1, "a", &data)).unwrap();
        journal.flush();

        recover(&mut journal, &mut disk, &mut ns).unwrap();
        let snapshot = disk.read(1).unwrap();
        let count = disk.mutation_count();

        // 第二次恢复：事务已带提交标记，必须无操作
        let report = recover(&mut journal, &mut disk, &mut ns).unwrap();
        assert_eq!(report.replayed, 0);
        assert_eq!(report.skipped_committed, 1);
        assert_eq!(disk.read(1).unwrap(), snapshot);
        assert_eq!(disk.mutation_count(), count);
    }

    #[test]
    fn test_redo_overwrites_partial_state() {
        let (mut journal, mut disk, mut ns) = setup();
        let data = [4u8; 128]; // 2 块

        journal.append_entry(create_entry(1, 1, "a", &data)).unwrap();
        journal.flush();

        // 模拟 mid-commit 崩溃留下的半成品：只写了第一块
        disk.allocate(1, 2).unwrap();
        disk.prepare_write(1, 128).unwrap();
        disk.write_block(1, 0, &[4u8; 64]).unwrap();

        let report = recover(&mut journal, &mut disk, &mut ns).unwrap();
        assert_eq!(report.replayed, 1);
        assert_eq!(disk.read(1).unwrap(), data);
        assert_eq!(disk.inode(1).unwrap().state, InodeState::Committed);
        disk.check_invariants().unwrap();
    }

    #[test]
    fn test_corrupt_entry_poisons_transaction() {
        let (mut journal, mut disk, mut ns) = setup();

        // 事务 1 正常，事务 2 的条目被破坏
        journal.append_entry(create_entry(1, 1, "a", &[1u8; 20])).unwrap();
        journal.flush();
        journal.append_entry(create_entry(2, 2, "b", &[2u8; 20])).unwrap();
        journal.flush();
        journal.corrupt_record(1, 45, 0x40).unwrap();

        let report = recover(&mut journal, &mut disk, &mut ns).unwrap();
        assert_eq!(report.corrupted_entries, 1);
        assert_eq!(report.replayed, 1);
        assert!(disk.contains_live(1));
        assert!(!disk.contains_live(2));
    }

    #[test]
    fn test_unreadable_header_skips_only_that_record() {
        let (mut journal, mut disk, mut ns) = setup();

        // 事务 1 的记录 magic 被整字节翻转，事务 2 完好且已 Logged
        journal.append_entry(create_entry(1, 1, "a", &[1u8; 20])).unwrap();
        journal.flush();
        journal.corrupt_record(0, 0, 0xFF).unwrap();
        journal.append_entry(create_entry(2, 2, "b", &[2u8; 20])).unwrap();
        journal.flush();

        // 无法归属的记录只丢自己，后面的事务照常重放
        let report = recover(&mut journal, &mut disk, &mut ns).unwrap();
        assert_eq!(report.corrupted_entries, 1);
        assert_eq!(report.replayed, 1);
        assert!(!disk.contains_live(1));
        assert!(disk.contains_live(2));
        assert_eq!(ns.get("b"), Some(&2));
    }

    #[test]
    fn test_delete_redo_is_idempotent() {
        let (mut journal, mut disk, mut ns) = setup();

        // 删除一个从未存在的 inode：重放为无操作
        let mut entry = create_entry(1, 5, "gone", &[]);
        entry.op = OpKind::Delete;
        journal.append_entry(entry).unwrap();
        journal.flush();

        let report = recover(&mut journal, &mut disk, &mut ns).unwrap();
        assert_eq!(report.replayed, 1);
        assert!(!disk.contains_live(5));
    }
}
