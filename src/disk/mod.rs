//! 虚拟块设备
//!
//! [`VirtualDisk`] 是模拟中唯一执行"物理"读写的组件：
//! 固定容量的块数组、inode 表和空闲块位图。
//! 没有任何内部缓冲——每次写入立即可见，这正是崩溃注入有意义的前提
//! （写入中途的崩溃就是 `write` 调用中途的崩溃）。
//!
//! 正常 API（allocate / read / write / delete）只由文件系统层调用；
//! [`VirtualDisk::corrupt`] 只由崩溃模拟器调用，绕过一切一致性维护。

mod device;
mod inode;

pub use device::{CorruptMode, DiskConfig, DiskStats, VirtualDisk};
pub use inode::{BlockStatus, Inode, InodeState};
