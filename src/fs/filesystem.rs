//! JournalingFileSystem 核心实现

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use super::types::{FsConfig, OpStatus};
use crate::check::{Expectation, IntegrityChecker, IntegrityReport};
use crate::crash::CrashSimulator;
use crate::crc;
use crate::disk::{DiskConfig, InodeState, VirtualDisk};
use crate::error::{Error, ErrorKind, Result};
use crate::journal::{
    self, Journal, JournalEntry, OpKind, RecoveryReport, Transaction, TxState,
};

/// 日志文件系统
///
/// 平面命名空间（文件名 → inode），每个操作一个事务。
/// 所有崩溃注入点都在操作内部固定位置，见 [`crate::crash`]。
#[derive(Debug)]
pub struct JournalingFileSystem {
    disk: VirtualDisk,
    journal: Journal,
    crash: CrashSimulator,
    namespace: BTreeMap<String, u32>,
    config: FsConfig,
    next_tx_id: u64,
    next_inode_id: u32,
    committed_since_checkpoint: u32,
}

impl JournalingFileSystem {
    /// 按配置创建文件系统
    ///
    /// # 错误
    ///
    /// - `ErrorKind::InvalidInput` - 磁盘容量参数非法
    pub fn new(config: &FsConfig) -> Result<Self> {
        let disk = VirtualDisk::new(&DiskConfig::new(config.block_count, config.block_size))?;
        log::info!(
            "[FS] mount: {} blocks x {} bytes, journal={}",
            config.block_count,
            config.block_size,
            config.journal_enabled
        );
        Ok(Self {
            disk,
            journal: Journal::new(config.journal_capacity),
            crash: CrashSimulator::new(config.crash_seed),
            namespace: BTreeMap::new(),
            config: config.clone(),
            next_tx_id: 1,
            next_inode_id: 1,
            committed_since_checkpoint: 0,
        })
    }

    // =========================================================================
    // 文件操作
    // =========================================================================

    /// 创建文件并写入初始内容
    ///
    /// # 错误
    ///
    /// - `ErrorKind::InvalidInput` - 文件名为空或过长
    /// - `ErrorKind::AlreadyExists` - 同名文件已存在
    /// - `ErrorKind::OutOfSpace` - 磁盘或日志空间不足
    pub fn create_file(&mut self, name: &str, data: &[u8]) -> Result<OpStatus> {
        validate_name(name)?;
        if self.namespace.contains_key(name) {
            return Err(Error::new(ErrorKind::AlreadyExists, "File already exists"));
        }
        if self.disk.blocks_needed(data.len()) > self.disk.free_block_count() {
            return Err(Error::new(ErrorKind::OutOfSpace, "Not enough free blocks"));
        }

        let inode_id = self.alloc_inode_id();
        self.run_tx(OpKind::Create, inode_id, name, data)
    }

    /// 整体覆写已有文件
    ///
    /// # 错误
    ///
    /// - `ErrorKind::NotFound` - 文件不存在
    /// - `ErrorKind::OutOfSpace` - 增长超过剩余容量
    pub fn write_file(&mut self, name: &str, data: &[u8]) -> Result<OpStatus> {
        validate_name(name)?;
        let inode_id = self.lookup(name)?;

        let current = self
            .disk
            .inode(inode_id)
            .map(|i| i.blocks.len() as u32)
            .unwrap_or(0);
        let needed = self.disk.blocks_needed(data.len());
        if needed.saturating_sub(current) > self.disk.free_block_count() {
            return Err(Error::new(ErrorKind::OutOfSpace, "Not enough free blocks"));
        }

        self.run_tx(OpKind::Write, inode_id, name, data)
    }

    /// 删除文件
    ///
    /// # 错误
    ///
    /// - `ErrorKind::NotFound` - 文件不存在
    pub fn delete_file(&mut self, name: &str) -> Result<OpStatus> {
        validate_name(name)?;
        let inode_id = self.lookup(name)?;
        self.run_tx(OpKind::Delete, inode_id, name, &[])
    }

    /// 读取文件内容并校验
    ///
    /// # 错误
    ///
    /// - `ErrorKind::NotFound` - 文件不存在
    /// - `ErrorKind::DiskCorrupted` - 内容与记录的校验和不符，
    ///   或 inode 未处于 Committed 状态
    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let inode_id = self.lookup(name)?;
        let (state, checksum) = {
            let inode = self
                .disk
                .inode(inode_id)
                .filter(|i| i.is_live())
                .ok_or(Error::new(ErrorKind::NotFound, "File not found"))?;
            (inode.state, inode.checksum)
        };

        let data = self.disk.read(inode_id)?;
        if state != InodeState::Committed || crc::checksum32(&data) != checksum {
            return Err(Error::new(
                ErrorKind::DiskCorrupted,
                "File content fails checksum",
            ));
        }
        Ok(data)
    }

    // =========================================================================
    // 恢复与检查点
    // =========================================================================

    /// 崩溃后恢复（模拟重启 + 日志重放）
    ///
    /// 日志关闭时只清除崩溃状态，磁盘保持原样。
    pub fn recover(&mut self) -> Result<RecoveryReport> {
        self.crash.reset();
        if !self.config.journal_enabled {
            log::info!("[FS] recover: journal disabled, nothing to replay");
            return Ok(RecoveryReport::default());
        }

        let report = journal::recover(&mut self.journal, &mut self.disk, &mut self.namespace)?;
        // 重放可能落下了更大的 inode id
        let max_id = self.disk.inodes().map(|i| i.id).max().unwrap_or(0);
        self.next_inode_id = self.next_inode_id.max(max_id + 1);
        Ok(report)
    }

    /// 手动触发检查点，返回回收的记录条数
    pub fn checkpoint(&mut self) -> Result<usize> {
        self.committed_since_checkpoint = 0;
        journal::checkpoint(&mut self.journal)
    }

    /// 对照期望状态做一次完整性检查
    pub fn run_integrity_check(&self, expectation: &Expectation) -> IntegrityReport {
        IntegrityChecker::check(&self.disk, expectation)
    }

    // =========================================================================
    // 破坏注入（委托给崩溃模拟器）
    // =========================================================================

    /// 随机破坏一个已用块
    pub fn corrupt_random_block(&mut self) -> Result<Option<u32>> {
        self.crash.corrupt_random_used_block(&mut self.disk)
    }

    /// 翻转指定日志记录中的一个随机位
    pub fn corrupt_journal_record(&mut self, index: usize) -> Result<()> {
        self.crash.corrupt_journal_record(&mut self.journal, index)
    }

    // =========================================================================
    // 访问器
    // =========================================================================

    /// 底层磁盘
    pub fn disk(&self) -> &VirtualDisk {
        &self.disk
    }

    /// 日志
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// 崩溃模拟器（装填崩溃点用）
    pub fn crash_mut(&mut self) -> &mut CrashSimulator {
        &mut self.crash
    }

    /// 崩溃模拟器
    pub fn crash(&self) -> &CrashSimulator {
        &self.crash
    }

    /// 文件名对应的 inode id
    pub fn inode_of(&self, name: &str) -> Option<u32> {
        self.namespace.get(name).copied()
    }

    /// 按名字排序遍历所有文件
    pub fn files(&self) -> impl Iterator<Item = (&String, u32)> {
        self.namespace.iter().map(|(name, &id)| (name, id))
    }

    /// 文件数
    pub fn file_count(&self) -> usize {
        self.namespace.len()
    }

    // =========================================================================
    // 事务驱动
    // =========================================================================

    /// 以单事务执行一个操作，穿过全部崩溃注入点
    fn run_tx(&mut self, op: OpKind, inode_id: u32, name: &str, payload: &[u8]) -> Result<OpStatus> {
        let mut tx = Transaction::new(self.alloc_tx_id());
        tx.push(JournalEntry {
            tx_id: tx.id,
            seq: 0,
            op,
            inode_id,
            name: name.to_string(),
            payload: payload.to_vec(),
            last: true,
        });
        log::debug!("[FS] tx={} {:?} name={}", tx.id, op, name);

        if self.config.journal_enabled {
            for entry in &tx.entries {
                self.journal.append_entry(entry.clone())?;
            }
            if self.crash.fire_pre_log() {
                // 条目从未 flush：事务没有留下任何痕迹
                self.journal.discard_pending();
                tx.state = TxState::Aborted;
                return Ok(OpStatus::Crashed);
            }
            self.journal.flush();
            tx.state = TxState::Logged;

            if self.crash.fire_post_log() {
                // 已 Logged 未应用：恢复时会被 redo
                return Ok(OpStatus::Crashed);
            }
        } else if self.crash.fire_pre_log() || self.crash.fire_post_log() {
            // 无日志模式：磁盘副作用之前的崩溃让操作凭空消失
            return Ok(OpStatus::Crashed);
        }

        tx.state = TxState::Committing;
        if self.apply(op, inode_id, name, payload)? == OpStatus::Crashed {
            return Ok(OpStatus::Crashed);
        }

        if self.config.journal_enabled {
            self.journal.append_commit(tx.id)?;
            self.journal.flush();
            self.maybe_checkpoint()?;
        }
        tx.state = TxState::Committed;
        Ok(OpStatus::Done)
    }

    /// 把操作的磁盘副作用执行到底或执行到崩溃点
    fn apply(&mut self, op: OpKind, inode_id: u32, name: &str, payload: &[u8]) -> Result<OpStatus> {
        match op {
            OpKind::Create => {
                let needed = self.disk.blocks_needed(payload.len());
                self.disk.allocate(inode_id, needed)?;
                self.namespace.insert(name.to_string(), inode_id);
                self.apply_write(inode_id, payload)
            }
            OpKind::Write => self.apply_write(inode_id, payload),
            OpKind::Delete => {
                if self.crash.fire_mid_commit(0) {
                    return Ok(OpStatus::Crashed);
                }
                self.disk.delete(inode_id)?;
                self.namespace.remove(name);
                Ok(OpStatus::Done)
            }
        }
    }

    /// 逐块写入，每个块之前和提交之前各有一个 mid-commit 注入点
    fn apply_write(&mut self, inode_id: u32, data: &[u8]) -> Result<OpStatus> {
        let checksum = crc::checksum32(data);
        self.disk.prepare_write(inode_id, data.len())?;

        let mut written = 0u32;
        for (slot, chunk) in data.chunks(self.disk.block_size()).enumerate() {
            if self.crash.fire_mid_commit(written) {
                // inode 留在 Pending，数据写了一半
                return Ok(OpStatus::Crashed);
            }
            self.disk.write_block(inode_id, slot, chunk)?;
            written += 1;
        }
        if self.crash.fire_mid_commit(written) {
            // 数据齐了但校验和与状态未提交
            return Ok(OpStatus::Crashed);
        }

        self.disk.complete_write(inode_id, checksum)?;
        Ok(OpStatus::Done)
    }

    fn maybe_checkpoint(&mut self) -> Result<()> {
        self.committed_since_checkpoint += 1;
        if self.config.checkpoint_interval > 0
            && self.committed_since_checkpoint >= self.config.checkpoint_interval
        {
            self.committed_since_checkpoint = 0;
            journal::checkpoint(&mut self.journal)?;
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<u32> {
        self.namespace
            .get(name)
            .copied()
            .ok_or(Error::new(ErrorKind::NotFound, "File not found"))
    }

    fn alloc_tx_id(&mut self) -> u64 {
        let id = self.next_tx_id;
        self.next_tx_id += 1;
        id
    }

    fn alloc_inode_id(&mut self) -> u32 {
        let id = self.next_inode_id;
        self.next_inode_id += 1;
        id
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > crate::consts::MAX_NAME_LEN {
        return Err(Error::new(ErrorKind::InvalidInput, "Invalid file name"));
    }
    Ok(())
}
