//! 崩溃注入
//!
//! [`CrashSimulator`] 在文件系统操作的固定注入点打断执行，
//! 并提供种子化的随机破坏（翻转块内容、破坏日志记录）。
//! 同一种子下所有决策完全可复现。
//!
//! # 注入点
//!
//! - **pre-log**：事务条目尚未 flush，日志里没有任何痕迹；
//! - **post-log**：条目已 flush，磁盘副作用尚未开始；
//! - **mid-commit**：磁盘副作用进行到第 k 块之后。
//!
//! 崩溃本身不销毁任何状态，它只是让操作中途返回。
//! "断电后还剩什么"由日志的 flush 边界和磁盘的已写块决定。

mod simulator;

pub use simulator::{CrashPoint, CrashSimulator, CrashSites};
