//! 错误类型定义
//!
//! 提供崩溃一致性模拟各组件共用的错误类型。

use core::fmt;

/// 模拟器操作错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: &'static str,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// 空闲块不足，分配被拒绝
    OutOfSpace,
    /// 文件或 inode 不存在
    NotFound,
    /// 文件名已被占用
    AlreadyExists,
    /// Journal 记录校验和不匹配
    JournalCorrupted,
    /// 块内容在事务之外被破坏（只在完整性检查时发现）
    DiskCorrupted,
    /// 无效参数
    InvalidInput,
    /// 无效状态
    InvalidState,
}

impl Error {
    /// 创建新错误
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self { kind, message }
    }

    /// 获取错误类型
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// 获取错误消息
    pub const fn message(&self) -> &'static str {
        self.message
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

// Journal error conversion
impl From<crate::journal::JournalError> for Error {
    fn from(err: crate::journal::JournalError) -> Self {
        use crate::journal::JournalError;
        match err {
            JournalError::CorruptRecord => {
                Error::new(ErrorKind::JournalCorrupted, "Journal record checksum mismatch")
            }
            JournalError::Truncated => {
                Error::new(ErrorKind::JournalCorrupted, "Journal record truncated")
            }
            JournalError::NoSpace => {
                Error::new(ErrorKind::OutOfSpace, "Journal has no space")
            }
        }
    }
}

/// Result 类型别名
pub type Result<T> = core::result::Result<T, Error>;
