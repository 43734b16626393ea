//! crashfs_core: 崩溃一致性模拟器
//!
//! 这是一个纯 Rust 实现的崩溃一致性教学模拟库，把写前日志
//! （WAL）保护数据的全过程做成可控实验：
//! - **虚拟磁盘**：块存储 + inode 表 + 空闲位图，副作用立即可见
//! - **日志文件系统**：每个操作一个事务，先记日志再改磁盘
//! - **崩溃注入**：在固定注入点打断操作，种子化、完全可复现
//! - **完整性检查**：崩溃与恢复之后逐文件评估损伤
//!
//! # 示例
//!
//! ```rust,ignore
//! use crashfs_core::{
//!     CrashPoint, Expectation, FsConfig, IntegrityChecker,
//!     JournalingFileSystem, Result,
//! };
//!
//! fn main() -> Result<()> {
//!     let mut fs = JournalingFileSystem::new(&FsConfig::default())?;
//!     let mut expected = Expectation::new();
//!
//!     fs.create_file("a.dat", &[7u8; 4096])?;
//!     expected.expect_data("a.dat", fs.inode_of("a.dat").unwrap(), &[7u8; 4096]);
//!
//!     // 在写完 1 个块之后拔掉电源
//!     fs.crash_mut().arm(CrashPoint::MidCommit { after_blocks: 1 });
//!     fs.write_file("a.dat", &[9u8; 8192])?;
//!
//!     // 重放日志，然后检查损伤
//!     fs.recover()?;
//!     let report = IntegrityChecker::check(fs.disk(), &expected);
//!     assert_eq!(report.recovery_rate, 1.0);
//!     Ok(())
//! }
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`consts`] - 常量定义
//! - [`disk`] - 虚拟块设备与 inode 表
//! - [`journal`] - 写前日志、恢复与检查点
//! - [`fs`] - 日志文件系统高级 API
//! - [`crash`] - 崩溃注入与随机破坏
//! - [`check`] - 完整性检查与恢复率
//! - [`bitmap`] - 位图操作

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

// ===== 核心模块 =====

/// 错误处理
pub mod error;

/// 常量定义
pub mod consts;

/// 位图操作
pub mod bitmap;

/// 虚拟块设备
pub mod disk;

/// 写前日志系统
pub mod journal;

/// 日志文件系统
pub mod fs;

/// 崩溃注入
pub mod crash;

/// 完整性检查
pub mod check;

/// CRC32C 校验和计算
pub(crate) mod crc;

// ===== 公共导出 =====

// 错误处理
pub use error::{Error, ErrorKind, Result};

// 磁盘
pub use disk::{BlockStatus, CorruptMode, DiskConfig, DiskStats, Inode, InodeState, VirtualDisk};

// Journal
pub use journal::{
    Journal, JournalEntry, JournalError, JournalRecord, JournalStats, OpKind, RecoveryReport,
    Transaction, TxState,
};

// 文件系统
pub use fs::{FsConfig, JournalingFileSystem, OpStatus};

// 崩溃注入
pub use crash::{CrashPoint, CrashSimulator, CrashSites};

// 完整性检查
pub use check::{
    ExpectedFile, Expectation, FileCheck, FileStatus, IntegrityChecker, IntegrityReport,
};
