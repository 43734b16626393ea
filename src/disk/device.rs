//! VirtualDisk 核心实现

use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;

use super::inode::{BlockStatus, Inode, InodeState};
use crate::bitmap::ops;
use crate::crc;
use crate::error::{Error, ErrorKind, Result};

/// 虚拟磁盘构造参数
#[derive(Debug, Clone)]
pub struct DiskConfig {
    /// 总块数
    pub block_count: u32,
    /// 块大小（字节）
    pub block_size: usize,
}

impl DiskConfig {
    /// 创建指定容量的配置
    pub fn new(block_count: u32, block_size: usize) -> Self {
        Self {
            block_count,
            block_size,
        }
    }
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            block_count: crate::consts::DEFAULT_BLOCK_COUNT,
            block_size: crate::consts::DEFAULT_BLOCK_SIZE,
        }
    }
}

/// 磁盘状态快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskStats {
    /// 总块数
    pub total_blocks: u32,
    /// 空闲块数
    pub free_blocks: u32,
    /// 已使用块数
    pub used_blocks: u32,
    /// 被破坏的块数
    pub corrupted_blocks: u32,
    /// 存活（非 Free）的 inode 数
    pub live_inodes: u32,
}

/// 块破坏方式
///
/// 所有偏移和掩码都在调用前解析好，磁盘侧不含随机性，
/// 保证同一种子下的破坏完全可复现。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptMode {
    /// 翻转块内单个字节中的若干位（mask 不能为 0）
    FlipByte {
        /// 块内字节偏移
        offset: usize,
        /// 异或掩码
        mask: u8,
    },
    /// 整块清零
    Zero,
    /// 截断：保留前 `keep` 字节，其余清零（模拟写到一半断电）
    Truncate {
        /// 保留的字节数
        keep: usize,
    },
}

/// 虚拟块设备
///
/// 固定容量的块存储 + inode 表 + 空闲块位图。
/// 所有副作用都是直接、同步、立即可见的。
///
/// # 不变式
///
/// - 每个存活 inode 引用的块在位图中都已置位；
/// - 任意两个 inode 不会占用同一个块。
///
/// # 子步骤接口
///
/// `write` 是 `prepare_write` → 逐块 `write_block` → `complete_write`
/// 的便捷封装。文件系统层直接驱动这三个子步骤，
/// 崩溃模拟器因此可以精确地在"已写 k 块"处打断一次写入。
#[derive(Debug)]
pub struct VirtualDisk {
    /// 块内容
    blocks: Vec<Vec<u8>>,
    /// 每块的状态标签
    status: Vec<BlockStatus>,
    /// 空闲块位图（置位 = 已占用）
    bitmap: Vec<u8>,
    /// inode 表
    inodes: BTreeMap<u32, Inode>,
    /// 块大小（字节）
    block_size: usize,
    /// 总块数
    total_blocks: u32,
    /// 正常路径的变更计数（写前日志不变式的探针）
    mutation_count: u64,
    /// 正常路径写入的块数
    blocks_written: u64,
}

impl VirtualDisk {
    /// 创建指定容量的虚拟磁盘
    ///
    /// # 错误
    ///
    /// - `ErrorKind::InvalidInput` - 块数或块大小为 0
    pub fn new(config: &DiskConfig) -> Result<Self> {
        if config.block_count == 0 || config.block_size == 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Disk capacity must be non-zero",
            ));
        }

        let count = config.block_count as usize;
        Ok(Self {
            blocks: vec![vec![0u8; config.block_size]; count],
            status: vec![BlockStatus::Free; count],
            bitmap: vec![0u8; count.div_ceil(8)],
            inodes: BTreeMap::new(),
            block_size: config.block_size,
            total_blocks: config.block_count,
            mutation_count: 0,
            blocks_written: 0,
        })
    }

    /// 块大小（字节）
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// 总块数
    pub fn total_blocks(&self) -> u32 {
        self.total_blocks
    }

    /// 当前空闲块数
    pub fn free_block_count(&self) -> u32 {
        ops::count_zeros(&self.bitmap, 0, self.total_blocks)
    }

    /// 存放 `len` 字节需要的块数
    pub fn blocks_needed(&self, len: usize) -> u32 {
        len.div_ceil(self.block_size) as u32
    }

    /// 正常路径的变更计数
    ///
    /// 只统计 allocate/write/delete 路径；`corrupt` 绕过此计数。
    pub fn mutation_count(&self) -> u64 {
        self.mutation_count
    }

    /// 正常路径写入的块数
    pub fn blocks_written(&self) -> u64 {
        self.blocks_written
    }

    /// 查找 inode（包括已 Free 的表项）
    pub fn inode(&self, inode_id: u32) -> Option<&Inode> {
        self.inodes.get(&inode_id)
    }

    /// 遍历所有 inode 表项
    pub fn inodes(&self) -> impl Iterator<Item = &Inode> {
        self.inodes.values()
    }

    /// inode 是否存在且非 Free
    pub fn contains_live(&self, inode_id: u32) -> bool {
        self.inodes
            .get(&inode_id)
            .map(Inode::is_live)
            .unwrap_or(false)
    }

    /// 查询块状态
    pub fn block_status(&self, block_index: u32) -> Option<BlockStatus> {
        self.status.get(block_index as usize).copied()
    }

    // =========================================================================
    // 正常 API（只由文件系统层调用）
    // =========================================================================

    /// 为新 inode 预留空闲块
    ///
    /// 全有或全无：空间不足时不产生任何副作用。
    ///
    /// # 错误
    ///
    /// - `ErrorKind::OutOfSpace` - 空闲块不足
    /// - `ErrorKind::InvalidState` - inode id 已被存活文件占用
    pub fn allocate(&mut self, inode_id: u32, size_in_blocks: u32) -> Result<()> {
        if self.contains_live(inode_id) {
            return Err(Error::new(
                ErrorKind::InvalidState,
                "Inode id already in use",
            ));
        }

        let blocks = self.alloc_blocks(size_in_blocks)?;
        log::trace!(
            "[DISK] allocate inode={} blocks={}",
            inode_id,
            size_in_blocks
        );
        self.inodes.insert(inode_id, Inode::new_allocated(inode_id, blocks));
        self.mutation_count += 1;
        Ok(())
    }

    /// 读取文件内容（拼接所有块并截断到 size）
    ///
    /// # 错误
    ///
    /// - `ErrorKind::NotFound` - inode 不存在或已 Free
    pub fn read(&self, inode_id: u32) -> Result<Vec<u8>> {
        let inode = self.require_live(inode_id)?;
        let mut data = Vec::with_capacity(inode.blocks.len() * self.block_size);
        for &block in &inode.blocks {
            data.extend_from_slice(&self.blocks[block as usize]);
        }
        data.truncate(inode.size as usize);
        Ok(data)
    }

    /// 覆写文件内容，必要时增减块，并更新校验和
    ///
    /// 等价于 `prepare_write` → 逐块 `write_block` → `complete_write`
    /// 一气呵成；恢复重放（redo）走的就是这条不可中断的路径。
    ///
    /// # 错误
    ///
    /// - `ErrorKind::NotFound` - inode 不存在或已 Free
    /// - `ErrorKind::OutOfSpace` - 增长超过剩余容量
    pub fn write(&mut self, inode_id: u32, data: &[u8]) -> Result<()> {
        let checksum = crc::checksum32(data);
        self.prepare_write(inode_id, data.len())?;
        for (slot, chunk) in data.chunks(self.block_size).enumerate() {
            self.write_block(inode_id, slot, chunk)?;
        }
        self.complete_write(inode_id, checksum)
    }

    /// 写入子步骤 1：按新长度调整块分配，进入 Pending 状态
    ///
    /// 空间检查发生在任何副作用之前：`OutOfSpace` 时磁盘保持原样。
    ///
    /// # 返回
    ///
    /// 调整后按顺序排列的块索引
    pub fn prepare_write(&mut self, inode_id: u32, new_len: usize) -> Result<Vec<u32>> {
        let needed = self.blocks_needed(new_len);
        let current = self.require_live(inode_id)?.blocks.len() as u32;

        if needed > current {
            let extra = self.alloc_blocks(needed - current)?;
            self.require_live_mut(inode_id)?.blocks.extend(extra);
        } else if needed < current {
            let tail = self.require_live_mut(inode_id)?.blocks.split_off(needed as usize);
            for block in tail {
                self.release_block(block);
            }
        }

        let blocks = {
            let inode = self.require_live_mut(inode_id)?;
            inode.size = new_len as u64;
            inode.state = InodeState::Pending;
            inode.blocks.clone()
        };
        self.mutation_count += 1;
        Ok(blocks)
    }

    /// 写入子步骤 2：写入第 `slot` 个块
    ///
    /// 数据不足一块时用零填充到块边界。
    pub fn write_block(&mut self, inode_id: u32, slot: usize, chunk: &[u8]) -> Result<()> {
        if chunk.len() > self.block_size {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Chunk larger than block size",
            ));
        }

        let block_index = {
            let inode = self.require_live(inode_id)?;
            *inode.blocks.get(slot).ok_or(Error::new(
                ErrorKind::InvalidInput,
                "Block slot out of range",
            ))?
        };

        let buf = &mut self.blocks[block_index as usize];
        buf.fill(0);
        buf[..chunk.len()].copy_from_slice(chunk);
        self.status[block_index as usize] = BlockStatus::Used;
        self.blocks_written += 1;
        self.mutation_count += 1;
        Ok(())
    }

    /// 写入子步骤 3：记录校验和，进入 Committed 状态
    pub fn complete_write(&mut self, inode_id: u32, checksum: u32) -> Result<()> {
        let inode = self.require_live_mut(inode_id)?;
        inode.checksum = checksum;
        inode.state = InodeState::Committed;
        self.mutation_count += 1;
        Ok(())
    }

    /// 删除文件：inode 置 Free，块退回空闲集合
    ///
    /// # 错误
    ///
    /// - `ErrorKind::NotFound` - inode 不存在或已 Free
    pub fn delete(&mut self, inode_id: u32) -> Result<()> {
        let blocks: Vec<u32> = {
            let inode = self.require_live_mut(inode_id)?;
            let blocks = core::mem::take(&mut inode.blocks);
            inode.size = 0;
            inode.checksum = 0;
            inode.state = InodeState::Free;
            blocks
        };
        for block in blocks {
            self.release_block(block);
        }
        log::trace!("[DISK] delete inode={}", inode_id);
        self.mutation_count += 1;
        Ok(())
    }

    // =========================================================================
    // 崩溃模拟器专用 API
    // =========================================================================

    /// 破坏一个块的内容
    ///
    /// 只供崩溃模拟器调用，绕过正常 API 和变更计数。
    /// 块会被标记为 Corrupted，同时内容真实被改写。
    pub fn corrupt(&mut self, block_index: u32, mode: CorruptMode) -> Result<()> {
        let buf = self
            .blocks
            .get_mut(block_index as usize)
            .ok_or(Error::new(ErrorKind::InvalidInput, "Block index out of range"))?;

        match mode {
            CorruptMode::FlipByte { offset, mask } => {
                if mask == 0 {
                    // 零掩码不改内容，却会把块标成 Corrupted
                    return Err(Error::new(ErrorKind::InvalidInput, "Flip mask must be non-zero"));
                }
                let at = offset % buf.len();
                buf[at] ^= mask;
            }
            CorruptMode::Zero => buf.fill(0),
            CorruptMode::Truncate { keep } => {
                let keep = keep.min(buf.len());
                buf[keep..].fill(0);
            }
        }

        self.status[block_index as usize] = BlockStatus::Corrupted;
        log::debug!("[DISK] corrupt block={} mode={:?}", block_index, mode);
        Ok(())
    }

    // =========================================================================
    // 统计与一致性
    // =========================================================================

    /// 磁盘状态快照
    pub fn stats(&self) -> DiskStats {
        let mut free = 0;
        let mut used = 0;
        let mut corrupted = 0;
        for status in &self.status {
            match status {
                BlockStatus::Free => free += 1,
                BlockStatus::Used => used += 1,
                BlockStatus::Corrupted => corrupted += 1,
            }
        }
        DiskStats {
            total_blocks: self.total_blocks,
            free_blocks: free,
            used_blocks: used,
            corrupted_blocks: corrupted,
            live_inodes: self.inodes.values().filter(|i| i.is_live()).count() as u32,
        }
    }

    /// 校验 inode 表和位图的不变式
    ///
    /// 存活 inode 引用的块必须在位图中置位，且不与其他 inode 重叠。
    pub fn check_invariants(&self) -> Result<()> {
        let mut seen = vec![false; self.total_blocks as usize];
        for inode in self.inodes.values().filter(|i| i.is_live()) {
            for &block in &inode.blocks {
                if !ops::test_bit(&self.bitmap, block) {
                    return Err(Error::new(
                        ErrorKind::InvalidState,
                        "Live inode references unallocated block",
                    ));
                }
                if core::mem::replace(&mut seen[block as usize], true) {
                    return Err(Error::new(
                        ErrorKind::InvalidState,
                        "Two inodes claim the same block",
                    ));
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // 内部辅助
    // =========================================================================

    fn require_live(&self, inode_id: u32) -> Result<&Inode> {
        self.inodes
            .get(&inode_id)
            .filter(|i| i.is_live())
            .ok_or(Error::new(ErrorKind::NotFound, "Inode not found"))
    }

    fn require_live_mut(&mut self, inode_id: u32) -> Result<&mut Inode> {
        self.inodes
            .get_mut(&inode_id)
            .filter(|i| i.is_live())
            .ok_or(Error::new(ErrorKind::NotFound, "Inode not found"))
    }

    /// 预留 `count` 个空闲块（首次适应）
    ///
    /// 空间不足时在修改位图之前就返回 `OutOfSpace`。
    fn alloc_blocks(&mut self, count: u32) -> Result<Vec<u32>> {
        if self.free_block_count() < count {
            return Err(Error::new(ErrorKind::OutOfSpace, "Not enough free blocks"));
        }

        let mut found = Vec::with_capacity(count as usize);
        let mut cursor = 0;
        for _ in 0..count {
            let block = ops::find_first_zero(&self.bitmap, cursor, self.total_blocks)
                .ok_or(Error::new(ErrorKind::OutOfSpace, "Not enough free blocks"))?;
            ops::set_bit(&mut self.bitmap, block)?;
            found.push(block);
            cursor = block + 1;
        }
        Ok(found)
    }

    /// 把一个块退回空闲集合（内容保留，状态清为 Free）
    fn release_block(&mut self, block: u32) {
        let _ = ops::clear_bit(&mut self.bitmap, block);
        self.status[block as usize] = BlockStatus::Free;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_disk() -> VirtualDisk {
        VirtualDisk::new(&DiskConfig::new(16, 64)).unwrap()
    }

    #[test]
    fn test_allocate_and_out_of_space() {
        let mut disk = small_disk();

        disk.allocate(1, 10).unwrap();
        assert_eq!(disk.free_block_count(), 6);

        // 空间不足时全有或全无
        let err = disk.allocate(2, 7).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfSpace);
        assert_eq!(disk.free_block_count(), 6);

        disk.check_invariants().unwrap();
    }

    #[test]
    fn test_write_read_roundtrip() {
        let mut disk = small_disk();
        let data = b"spanning multiple blocks of sixty-four bytes each, for sure!!!!! tail";

        disk.allocate(1, disk.blocks_needed(data.len())).unwrap();
        disk.write(1, data).unwrap();

        assert_eq!(disk.read(1).unwrap(), data);
        let inode = disk.inode(1).unwrap();
        assert_eq!(inode.state, InodeState::Committed);
        assert_eq!(inode.checksum, crate::crc::checksum32(data));
        disk.check_invariants().unwrap();
    }

    #[test]
    fn test_write_grow_and_shrink() {
        let mut disk = small_disk();

        disk.allocate(1, 1).unwrap();
        disk.write(1, &[0xAA; 200]).unwrap(); // 4 块
        assert_eq!(disk.inode(1).unwrap().blocks.len(), 4);

        disk.write(1, &[0xBB; 30]).unwrap(); // 收缩到 1 块
        assert_eq!(disk.inode(1).unwrap().blocks.len(), 1);
        assert_eq!(disk.read(1).unwrap(), &[0xBB; 30]);
        disk.check_invariants().unwrap();
    }

    #[test]
    fn test_delete_returns_blocks() {
        let mut disk = small_disk();

        disk.allocate(1, 4).unwrap();
        disk.write(1, &[1u8; 256]).unwrap();
        assert_eq!(disk.free_block_count(), 12);

        disk.delete(1).unwrap();
        assert_eq!(disk.free_block_count(), 16);
        assert_eq!(disk.inode(1).unwrap().state, InodeState::Free);

        // 已删除的文件不可读
        assert_eq!(disk.read(1).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_partial_write_leaves_pending() {
        let mut disk = small_disk();
        let data = [7u8; 128]; // 2 块

        disk.allocate(1, 2).unwrap();
        disk.write(1, &data).unwrap();

        // 模拟只写了第一块的中断写入
        disk.prepare_write(1, 128).unwrap();
        disk.write_block(1, 0, &[9u8; 64]).unwrap();

        let inode = disk.inode(1).unwrap();
        assert_eq!(inode.state, InodeState::Pending);
        // 声明的大小与实际内容不一致：校验和仍是旧数据的
        assert_ne!(crate::crc::checksum32(&disk.read(1).unwrap()), inode.checksum);
    }

    #[test]
    fn test_corrupt_flips_content() {
        let mut disk = small_disk();
        let data = [3u8; 64];

        disk.allocate(1, 1).unwrap();
        disk.write(1, &data).unwrap();

        let block = disk.inode(1).unwrap().blocks[0];
        disk.corrupt(block, CorruptMode::FlipByte { offset: 5, mask: 0x10 })
            .unwrap();

        assert_eq!(disk.block_status(block), Some(BlockStatus::Corrupted));
        let read_back = disk.read(1).unwrap();
        assert_ne!(crate::crc::checksum32(&read_back), disk.inode(1).unwrap().checksum);
        assert_eq!(disk.stats().corrupted_blocks, 1);
    }

    #[test]
    fn test_corrupt_rejects_zero_mask() {
        let mut disk = small_disk();

        disk.allocate(1, 1).unwrap();
        disk.write(1, &[1u8; 8]).unwrap();
        let block = disk.inode(1).unwrap().blocks[0];

        let err = disk
            .corrupt(block, CorruptMode::FlipByte { offset: 0, mask: 0 })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        // 被拒绝的破坏不得留下 Corrupted 标记
        assert_eq!(disk.block_status(block), Some(BlockStatus::Used));
    }

    #[test]
    fn test_mutation_counters() {
        let mut disk = small_disk();
        assert_eq!(disk.mutation_count(), 0);

        disk.allocate(1, 1).unwrap();
        disk.write(1, &[1u8; 10]).unwrap();
        let after_write = disk.mutation_count();
        assert!(after_write >= 4); // allocate + prepare + block + complete
        assert_eq!(disk.blocks_written(), 1);

        // corrupt 绕过计数
        disk.corrupt(0, CorruptMode::Zero).unwrap();
        assert_eq!(disk.mutation_count(), after_write);
    }
}
