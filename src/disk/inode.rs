//! Inode 和块状态定义

use alloc::vec::Vec;

/// inode 状态标签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeState {
    /// 空闲（已删除或从未使用）
    Free,
    /// 块已预留，尚未写入数据
    Allocated,
    /// 写入进行中（崩溃会把 inode 留在这个状态）
    Pending,
    /// 数据和校验和一致，写入完成
    Committed,
}

/// 块状态标签
///
/// `Corrupted` 由崩溃模拟器标记，用于完整性报告的块统计；
/// 损坏同时也真实地改写了块内容，校验和检测不依赖这个标签。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    /// 空闲
    Free,
    /// 已写入数据
    Used,
    /// 被崩溃模拟器破坏
    Corrupted,
}

/// inode 元数据记录
///
/// 由 [`VirtualDisk`](super::VirtualDisk) 独占拥有：
/// 文件创建时生成，写入/删除时原地修改，从不共享。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    /// 文件标识
    pub id: u32,
    /// 文件大小（字节）
    pub size: u64,
    /// 按顺序排列的块索引
    pub blocks: Vec<u32>,
    /// 文件内容的 CRC32C 校验和
    pub checksum: u32,
    /// 状态标签
    pub state: InodeState,
}

impl Inode {
    /// 创建一个刚分配好块、还没有数据的 inode
    pub fn new_allocated(id: u32, blocks: Vec<u32>) -> Self {
        Self {
            id,
            size: 0,
            blocks,
            checksum: 0,
            state: InodeState::Allocated,
        }
    }

    /// inode 是否持有有效文件（非 Free）
    pub fn is_live(&self) -> bool {
        self.state != InodeState::Free
    }
}
