//! 空闲块位图
//!
//! VirtualDisk 用位图跟踪块的分配情况，每一位对应一个块。

pub mod ops;
