//! 日志文件系统
//!
//! [`JournalingFileSystem`] 把平面命名空间的文件操作
//! （创建 / 覆写 / 删除 / 读取）组织成事务：先把完整意图
//! 写进日志并 flush，然后才改动磁盘，最后写提交标记。
//! 每一步之间都有崩溃注入点，崩溃后的状态由
//! [`recover`](JournalingFileSystem::recover) 修复。
//!
//! 日志可以整体关闭（`journal_enabled = false`），此时操作
//! 直接改磁盘，崩溃会留下永久的不一致——这正是用来对照
//! 展示日志价值的模式。

mod filesystem;
mod types;

pub use filesystem::JournalingFileSystem;
pub use types::{FsConfig, OpStatus};
