//! 完整性检查
//!
//! 崩溃与恢复之后，把磁盘的实际状态和调用方记录的期望状态
//! 逐文件比对，分类为 Intact / Corrupted / Missing，并给出
//! 恢复率。检查器只读 [`VirtualDisk`]，从不看日志——
//! 它回答的是"磁盘现在是什么样"，而不是"日志说应该是什么样"。

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::crc;
use crate::disk::{BlockStatus, InodeState, VirtualDisk};

/// 单个文件的检查结论
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// 内容与期望完全一致
    Intact,
    /// 文件存在但内容或元数据与期望不符
    Corrupted,
    /// inode 不存在或已 Free
    Missing,
}

/// 对单个文件的期望
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedFile {
    /// 期望的 inode
    pub inode_id: u32,
    /// 期望的字节数
    pub size: u64,
    /// 期望内容的 CRC32C
    pub checksum: u32,
}

/// 期望状态：文件名 → 期望内容的摘要
///
/// 由调用方在每次成功操作后维护，代表"如果没有崩溃，
/// 磁盘上应该有什么"。
#[derive(Debug, Clone, Default)]
pub struct Expectation {
    files: BTreeMap<String, ExpectedFile>,
}

impl Expectation {
    /// 创建空的期望集
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个文件的期望摘要
    pub fn expect(&mut self, name: &str, file: ExpectedFile) {
        self.files.insert(name.into(), file);
    }

    /// 根据完整内容记录期望（自动计算校验和）
    pub fn expect_data(&mut self, name: &str, inode_id: u32, data: &[u8]) {
        self.expect(
            name,
            ExpectedFile {
                inode_id,
                size: data.len() as u64,
                checksum: crc::checksum32(data),
            },
        );
    }

    /// 移除一个文件的期望（文件被删除后调用）
    pub fn forget(&mut self, name: &str) {
        self.files.remove(name);
    }

    /// 期望的文件数
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// 是否没有任何期望
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// 遍历期望集
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ExpectedFile)> {
        self.files.iter()
    }
}

/// 单个文件的检查结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCheck {
    /// 文件名
    pub name: String,
    /// 期望的 inode
    pub inode_id: u32,
    /// 结论
    pub status: FileStatus,
}

/// 一次完整检查的汇总
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrityReport {
    /// 期望的文件总数
    pub expected_files: u32,
    /// 完好的文件数
    pub intact: u32,
    /// 受损的文件数
    pub corrupted: u32,
    /// 丢失的文件数
    pub missing: u32,
    /// 磁盘上标记为 Corrupted 的块数
    pub corrupted_blocks: u32,
    /// 空闲块数
    pub blocks_free: u32,
    /// 已用块数
    pub blocks_used: u32,
    /// 恢复率 = intact / expected（期望为空时为 1.0）
    pub recovery_rate: f64,
    /// 逐文件明细
    pub details: Vec<FileCheck>,
}

/// 完整性检查器
#[derive(Debug)]
pub struct IntegrityChecker;

impl IntegrityChecker {
    /// 把磁盘状态与期望比对，产出报告
    pub fn check(disk: &VirtualDisk, expectation: &Expectation) -> IntegrityReport {
        let mut details = Vec::with_capacity(expectation.len());
        let mut intact = 0u32;
        let mut corrupted = 0u32;
        let mut missing = 0u32;

        for (name, expected) in expectation.iter() {
            let status = Self::check_file(disk, expected);
            match status {
                FileStatus::Intact => intact += 1,
                FileStatus::Corrupted => corrupted += 1,
                FileStatus::Missing => missing += 1,
            }
            if status != FileStatus::Intact {
                log::warn!("[CHECK] {}: {:?}", name, status);
            }
            details.push(FileCheck {
                name: name.clone(),
                inode_id: expected.inode_id,
                status,
            });
        }

        let expected_files = expectation.len() as u32;
        let recovery_rate = if expected_files == 0 {
            1.0
        } else {
            intact as f64 / expected_files as f64
        };

        let stats = disk.stats();
        log::info!(
            "[CHECK] {}/{} intact, {} corrupted, {} missing, rate={:.2}",
            intact,
            expected_files,
            corrupted,
            missing,
            recovery_rate
        );
        IntegrityReport {
            expected_files,
            intact,
            corrupted,
            missing,
            corrupted_blocks: stats.corrupted_blocks,
            blocks_free: stats.free_blocks,
            blocks_used: stats.used_blocks,
            recovery_rate,
            details,
        }
    }

    /// 单个文件的分类
    ///
    /// Intact 要求同时满足：inode 处于 Committed、大小一致、
    /// inode 记录的校验和与期望一致、按块重算的内容校验和也一致。
    /// 任何一条不满足即 Corrupted；inode 不存在或已 Free 即 Missing。
    fn check_file(disk: &VirtualDisk, expected: &ExpectedFile) -> FileStatus {
        let inode = match disk.inode(expected.inode_id) {
            Some(inode) if inode.is_live() => inode,
            _ => return FileStatus::Missing,
        };

        if inode.state != InodeState::Committed {
            return FileStatus::Corrupted;
        }
        if inode.size != expected.size || inode.checksum != expected.checksum {
            return FileStatus::Corrupted;
        }
        // 块被标记 Corrupted 时内容必然被改过，但仍重算校验和，
        // 让"内容悄悄变了而状态没变"的情况也能被抓住
        for &block in &inode.blocks {
            if disk.block_status(block) != Some(BlockStatus::Used) {
                return FileStatus::Corrupted;
            }
        }
        match disk.read(expected.inode_id) {
            Ok(data) if crc::checksum32(&data) == expected.checksum => FileStatus::Intact,
            _ => FileStatus::Corrupted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::{CorruptMode, DiskConfig};

    fn disk_with_file(data: &[u8]) -> (VirtualDisk, Expectation) {
        let mut disk = VirtualDisk::new(&DiskConfig::new(32, 64)).unwrap();
        disk.allocate(1, disk.blocks_needed(data.len()).max(1)).unwrap();
        disk.write(1, data).unwrap();

        let mut expectation = Expectation::new();
        expectation.expect_data("a", 1, data);
        (disk, expectation)
    }

    #[test]
    fn test_intact_file() {
        let (disk, expectation) = disk_with_file(&[0x11; 100]);

        let report = IntegrityChecker::check(&disk, &expectation);
        assert_eq!(report.intact, 1);
        assert_eq!(report.corrupted, 0);
        assert_eq!(report.recovery_rate, 1.0);
        assert_eq!(report.details[0].status, FileStatus::Intact);
    }

    #[test]
    fn test_corrupted_block_detected() {
        let (mut disk, expectation) = disk_with_file(&[0x22; 100]);

        let block = disk.inode(1).unwrap().blocks[0];
        disk.corrupt(block, CorruptMode::FlipByte { offset: 3, mask: 0x01 })
            .unwrap();

        let report = IntegrityChecker::check(&disk, &expectation);
        assert_eq!(report.corrupted, 1);
        assert_eq!(report.corrupted_blocks, 1);
        assert_eq!(report.recovery_rate, 0.0);
    }

    #[test]
    fn test_pending_inode_is_corrupted() {
        let (mut disk, expectation) = disk_with_file(&[0x33; 100]);

        // 半途的写入把 inode 留在 Pending
        disk.prepare_write(1, 100).unwrap();
        disk.write_block(1, 0, &[0x44; 64]).unwrap();

        let report = IntegrityChecker::check(&disk, &expectation);
        assert_eq!(report.details[0].status, FileStatus::Corrupted);
    }

    #[test]
    fn test_missing_file() {
        let (mut disk, expectation) = disk_with_file(&[0x55; 40]);
        disk.delete(1).unwrap();

        let report = IntegrityChecker::check(&disk, &expectation);
        assert_eq!(report.missing, 1);
        assert_eq!(report.details[0].status, FileStatus::Missing);
    }

    #[test]
    fn test_recovery_rate_mixed() {
        let mut disk = VirtualDisk::new(&DiskConfig::new(32, 64)).unwrap();
        let mut expectation = Expectation::new();

        for id in 1..=4u32 {
            let data = [id as u8; 64];
            disk.allocate(id, 1).unwrap();
            disk.write(id, &data).unwrap();
            expectation.expect_data(&alloc::format!("f{}", id), id, &data);
        }
        // 破坏一个，删除一个
        let block = disk.inode(2).unwrap().blocks[0];
        disk.corrupt(block, CorruptMode::Zero).unwrap();
        disk.delete(3).unwrap();

        let report = IntegrityChecker::check(&disk, &expectation);
        assert_eq!((report.intact, report.corrupted, report.missing), (2, 1, 1));
        assert_eq!(report.recovery_rate, 0.5);
    }

    #[test]
    fn test_empty_expectation() {
        let disk = VirtualDisk::new(&DiskConfig::new(8, 64)).unwrap();
        let report = IntegrityChecker::check(&disk, &Expectation::new());
        assert_eq!(report.recovery_rate, 1.0);
        assert!(report.details.is_empty());
    }

    #[test]
    fn test_forget_removes_expectation() {
        let (disk, mut expectation) = disk_with_file(&[0x66; 10]);
        expectation.forget("a");
        assert!(expectation.is_empty());

        let report = IntegrityChecker::check(&disk, &expectation);
        assert_eq!(report.expected_files, 0);
    }
}
