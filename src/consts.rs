//! 常量定义
//!
//! 模拟器各组件使用的默认参数和 journal 记录格式常量。

// =============================================================================
// 磁盘默认参数
// =============================================================================

/// 默认块大小（4 KiB）
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// 默认块数（对应 10 MiB 的虚拟磁盘）
pub const DEFAULT_BLOCK_COUNT: u32 = 2560;

/// 文件名最大长度（字节）
pub const MAX_NAME_LEN: usize = 255;

// =============================================================================
// Journal 参数
// =============================================================================

/// 默认检查点间隔（每提交多少个事务做一次检查点）
pub const DEFAULT_CHECKPOINT_INTERVAL: u32 = 5;

/// Journal 默认容量（持久化记录条数上限）
pub const DEFAULT_JOURNAL_CAPACITY: usize = 1024;

// =============================================================================
// Journal 记录格式
// =============================================================================

/// Journal 记录 magic number（"JFSL"）
pub const JOURNAL_MAGIC: u32 = 0x4A46_534C;

/// 记录类型：事务条目
pub const REC_ENTRY: u8 = 1;

/// 记录类型：提交标记
pub const REC_COMMIT: u8 = 2;

/// 条目标志：事务内最后一个条目
pub const FLAG_LAST_ENTRY: u8 = 0x01;

/// 记录头固定长度：magic(4) + kind(1) + flags(1) + op(1) + pad(1)
/// + tx_id(8) + seq(4) + inode_id(4) + name_len(2) + payload_len(4)
pub const RECORD_HEADER_SIZE: usize = 30;

/// 记录尾部校验和长度
pub const RECORD_CSUM_SIZE: usize = 4;
