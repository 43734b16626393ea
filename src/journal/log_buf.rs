//! 有界追加日志
//!
//! [`Journal`] 维护两段记录：`pending`（已追加、未 flush）和
//! `records`（已持久化）。flush 把 pending 整体搬进 records，
//! pre-log 崩溃丢弃 pending——这就是"断电时日志里没有的事务
//! 等于从未发生"的模型。

use alloc::vec::Vec;

use super::types::{self, JournalEntry, JournalRecord, RecordError};
use crate::error::{Error, ErrorKind, Result};

/// Journal 状态快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalStats {
    /// 已持久化的记录数
    pub durable_records: usize,
    /// 未 flush 的记录数
    pub pending_records: usize,
    /// 记录条数上限
    pub capacity: usize,
    /// 下一个全局序列号
    pub next_seq: u32,
}

/// 有界追加日志
///
/// 只由 JournalingFileSystem 写入；完整性检查器从不直接读它。
#[derive(Debug)]
pub struct Journal {
    /// 已持久化的记录（编码后的字节）
    pub(super) records: Vec<Vec<u8>>,
    /// 已追加、未 flush 的记录
    pending: Vec<Vec<u8>>,
    /// 记录条数上限
    capacity: usize,
    /// 下一个全局序列号
    next_seq: u32,
}

impl Journal {
    /// 创建容量为 `capacity` 条记录的日志
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Vec::new(),
            pending: Vec::new(),
            capacity,
            next_seq: 1,
        }
    }

    /// 追加一个事务条目（分配序列号，进入 pending）
    ///
    /// # 错误
    ///
    /// - `ErrorKind::OutOfSpace` - 日志已满，需要先做检查点
    pub fn append_entry(&mut self, mut entry: JournalEntry) -> Result<u32> {
        self.reserve_one()?;
        let seq = self.alloc_seq();
        entry.seq = seq;
        self.pending.push(types::encode_entry(&entry));
        log::trace!(
            "[JOURNAL] append entry tx={} seq={} op={:?}",
            entry.tx_id,
            seq,
            entry.op
        );
        Ok(seq)
    }

    /// 追加一个提交标记（进入 pending）
    pub fn append_commit(&mut self, tx_id: u64) -> Result<u32> {
        self.reserve_one()?;
        let seq = self.alloc_seq();
        self.pending.push(types::encode_commit(tx_id, seq));
        log::trace!("[JOURNAL] append commit tx={} seq={}", tx_id, seq);
        Ok(seq)
    }

    /// flush：pending 记录整体变为持久化
    pub fn flush(&mut self) {
        if !self.pending.is_empty() {
            log::debug!("[JOURNAL] flush {} records", self.pending.len());
            self.records.append(&mut self.pending);
        }
    }

    /// 丢弃尚未 flush 的记录（pre-log 崩溃）
    pub fn discard_pending(&mut self) {
        if !self.pending.is_empty() {
            log::debug!("[JOURNAL] discard {} pending records", self.pending.len());
            self.pending.clear();
        }
    }

    /// 已持久化的记录数
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// 日志是否为空（不含 pending）
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 未 flush 的记录数
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// 按追加顺序解码已持久化的记录
    pub fn records(
        &self,
    ) -> impl Iterator<Item = core::result::Result<JournalRecord, RecordError>> + '_ {
        self.records.iter().map(|buf| types::decode_record(buf))
    }

    /// 状态快照
    pub fn stats(&self) -> JournalStats {
        JournalStats {
            durable_records: self.records.len(),
            pending_records: self.pending.len(),
            capacity: self.capacity,
            next_seq: self.next_seq,
        }
    }

    /// 破坏一条已持久化记录中的一个字节
    ///
    /// 只供崩溃模拟器调用。
    pub fn corrupt_record(&mut self, index: usize, offset: usize, mask: u8) -> Result<()> {
        let record = self.records.get_mut(index).ok_or(Error::new(
            ErrorKind::InvalidInput,
            "Journal record index out of range",
        ))?;
        let at = offset % record.len();
        record[at] ^= mask;
        log::debug!("[JOURNAL] corrupt record={} offset={}", index, at);
        Ok(())
    }

    /// 按谓词保留记录，返回删掉的条数（检查点专用）
    pub(super) fn retain_decoded<F>(&mut self, keep: F) -> usize
    where
        F: Fn(&core::result::Result<JournalRecord, RecordError>) -> bool,
    {
        let before = self.records.len();
        self.records.retain(|buf| keep(&types::decode_record(buf)));
        before - self.records.len()
    }

    fn alloc_seq(&mut self) -> u32 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn reserve_one(&self) -> Result<()> {
        if self.records.len() + self.pending.len() >= self.capacity {
            return Err(Error::new(ErrorKind::OutOfSpace, "Journal is full"));
        }
        Ok(())
    }
}
