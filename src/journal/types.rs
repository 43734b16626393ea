//! Journal 记录格式定义
//!
//! 每条记录是一段小端编码的字节序列，结尾带 CRC32C 校验和。
//!
//! # 布局
//!
//! ```text
//! Offset  Size  Field
//! 0x00    4     magic (0x4A46534C)
//! 0x04    1     kind (REC_ENTRY / REC_COMMIT)
//! 0x05    1     flags (FLAG_LAST_ENTRY)
//! 0x06    1     op (Create / Write / Delete，提交标记为 0)
//! 0x07    1     padding
//! 0x08    8     tx_id
//! 0x10    4     seq
//! 0x14    4     inode_id
//! 0x18    2     name_len
//! 0x1A    4     payload_len
//! 0x1E    ..    name bytes
//! ..      ..    payload bytes
//! 末尾    4     checksum = crc32c(之前的全部字节)
//! ```
//!
//! 校验和覆盖整条记录，重放前逐条验证；
//! 校验失败的条目连同它所在事务的后续条目一起丢弃。

use alloc::string::String;
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};

use super::JournalError;
use crate::consts::{
    FLAG_LAST_ENTRY, JOURNAL_MAGIC, REC_COMMIT, REC_ENTRY, RECORD_CSUM_SIZE, RECORD_HEADER_SIZE,
};
use crate::crc;

/// 操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// 创建文件
    Create,
    /// 覆写文件
    Write,
    /// 删除文件
    Delete,
}

impl OpKind {
    /// 编码为记录字节
    pub fn as_u8(self) -> u8 {
        match self {
            OpKind::Create => 1,
            OpKind::Write => 2,
            OpKind::Delete => 3,
        }
    }

    /// 从记录字节解码
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(OpKind::Create),
            2 => Some(OpKind::Write),
            3 => Some(OpKind::Delete),
            _ => None,
        }
    }
}

/// 事务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// 已开始，条目尚未全部持久化
    Open,
    /// 全部条目已 flush 到日志
    Logged,
    /// 磁盘副作用进行中
    Committing,
    /// 副作用完成且提交标记已写入
    Committed,
    /// 在 Logged 之前被中断
    Aborted,
}

/// 一条事务日志条目
///
/// 追加进日志后不可变。payload 携带操作的完整目标内容
/// （而不是增量），这是重放幂等的前提。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    /// 所属事务
    pub tx_id: u64,
    /// 全局序列号（由 Journal 在追加时分配）
    pub seq: u32,
    /// 操作类型
    pub op: OpKind,
    /// 目标 inode
    pub inode_id: u32,
    /// 目标文件名
    pub name: String,
    /// 新的文件内容（Delete 为空）
    pub payload: Vec<u8>,
    /// 是否为事务内最后一个条目
    pub last: bool,
}

/// 解码后的日志记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalRecord {
    /// 事务条目
    Entry(JournalEntry),
    /// 提交标记
    Commit {
        /// 所属事务
        tx_id: u64,
        /// 全局序列号
        seq: u32,
    },
}

/// 记录解码错误
///
/// 头部可读时带上事务 id，恢复逻辑据此丢弃整个事务；
/// 头部本身不可信时为 None，恢复逻辑跳过该记录并继续扫描。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordError {
    /// 出错记录所属的事务（如果头部可读）
    pub tx_id: Option<u64>,
    /// 错误类别
    pub error: JournalError,
}

/// 一个文件系统操作对应的事务
#[derive(Debug, Clone)]
pub struct Transaction {
    /// 事务 id
    pub id: u64,
    /// 按顺序排列的条目
    pub entries: Vec<JournalEntry>,
    /// 状态
    pub state: TxState,
}

impl Transaction {
    /// 开始一个新事务
    pub fn new(id: u64) -> Self {
        Self {
            id,
            entries: Vec::new(),
            state: TxState::Open,
        }
    }

    /// 追加一个条目（last 标志由调用方设置）
    pub fn push(&mut self, entry: JournalEntry) {
        self.entries.push(entry);
    }
}

// =============================================================================
// 编码 / 解码
// =============================================================================

fn put_u16(buf: &mut Vec<u8>, value: u16) {
    let mut b = [0u8; 2];
    LittleEndian::write_u16(&mut b, value);
    buf.extend_from_slice(&b);
}

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    let mut b = [0u8; 4];
    LittleEndian::write_u32(&mut b, value);
    buf.extend_from_slice(&b);
}

fn put_u64(buf: &mut Vec<u8>, value: u64) {
    let mut b = [0u8; 8];
    LittleEndian::write_u64(&mut b, value);
    buf.extend_from_slice(&b);
}

fn encode_header(
    buf: &mut Vec<u8>,
    kind: u8,
    flags: u8,
    op: u8,
    tx_id: u64,
    seq: u32,
    inode_id: u32,
    name_len: u16,
    payload_len: u32,
) {
    put_u32(buf, JOURNAL_MAGIC);
    buf.push(kind);
    buf.push(flags);
    buf.push(op);
    buf.push(0); // padding
    put_u64(buf, tx_id);
    put_u32(buf, seq);
    put_u32(buf, inode_id);
    put_u16(buf, name_len);
    put_u32(buf, payload_len);
}

/// 编码一个事务条目
pub fn encode_entry(entry: &JournalEntry) -> Vec<u8> {
    let name = entry.name.as_bytes();
    let mut buf =
        Vec::with_capacity(RECORD_HEADER_SIZE + name.len() + entry.payload.len() + RECORD_CSUM_SIZE);
    encode_header(
        &mut buf,
        REC_ENTRY,
        if entry.last { FLAG_LAST_ENTRY } else { 0 },
        entry.op.as_u8(),
        entry.tx_id,
        entry.seq,
        entry.inode_id,
        name.len() as u16,
        entry.payload.len() as u32,
    );
    buf.extend_from_slice(name);
    buf.extend_from_slice(&entry.payload);
    let csum = crc::checksum32(&buf);
    put_u32(&mut buf, csum);
    buf
}

/// 编码一个提交标记
pub fn encode_commit(tx_id: u64, seq: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(RECORD_HEADER_SIZE + RECORD_CSUM_SIZE);
    encode_header(&mut buf, REC_COMMIT, 0, 0, tx_id, seq, 0, 0, 0);
    let csum = crc::checksum32(&buf);
    put_u32(&mut buf, csum);
    buf
}

/// 解码一条记录并验证校验和
pub fn decode_record(buf: &[u8]) -> core::result::Result<JournalRecord, RecordError> {
    if buf.len() < RECORD_HEADER_SIZE + RECORD_CSUM_SIZE {
        return Err(RecordError {
            tx_id: None,
            error: JournalError::Truncated,
        });
    }

    if LittleEndian::read_u32(&buf[0..4]) != JOURNAL_MAGIC {
        return Err(RecordError {
            tx_id: None,
            error: JournalError::CorruptRecord,
        });
    }

    let kind = buf[4];
    let flags = buf[5];
    let op = buf[6];
    let tx_id = LittleEndian::read_u64(&buf[8..16]);
    let seq = LittleEndian::read_u32(&buf[16..20]);
    let inode_id = LittleEndian::read_u32(&buf[20..24]);
    let name_len = LittleEndian::read_u16(&buf[24..26]) as usize;
    let payload_len = LittleEndian::read_u32(&buf[26..30]) as usize;

    let expected_len = RECORD_HEADER_SIZE + name_len + payload_len + RECORD_CSUM_SIZE;
    if buf.len() != expected_len {
        return Err(RecordError {
            tx_id: Some(tx_id),
            error: JournalError::Truncated,
        });
    }

    let body_end = buf.len() - RECORD_CSUM_SIZE;
    let stored = LittleEndian::read_u32(&buf[body_end..]);
    if crc::checksum32(&buf[..body_end]) != stored {
        return Err(RecordError {
            tx_id: Some(tx_id),
            error: JournalError::CorruptRecord,
        });
    }

    match kind {
        k if k == REC_COMMIT => Ok(JournalRecord::Commit { tx_id, seq }),
        k if k == REC_ENTRY => {
            let op = OpKind::from_u8(op).ok_or(RecordError {
                tx_id: Some(tx_id),
                error: JournalError::CorruptRecord,
            })?;
            let name_end = RECORD_HEADER_SIZE + name_len;
            let name = core::str::from_utf8(&buf[RECORD_HEADER_SIZE..name_end])
                .map_err(|_| RecordError {
                    tx_id: Some(tx_id),
                    error: JournalError::CorruptRecord,
                })?
                .into();
            Ok(JournalRecord::Entry(JournalEntry {
                tx_id,
                seq,
                op,
                inode_id,
                name,
                payload: buf[name_end..body_end].to_vec(),
                last: flags & FLAG_LAST_ENTRY != 0,
            }))
        }
        _ => Err(RecordError {
            tx_id: Some(tx_id),
            error: JournalError::CorruptRecord,
        }),
    }
}
