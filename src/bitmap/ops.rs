//! 位图操作实现
//!
//! 空闲块位图的基本操作：置位表示块已被某个 inode 占用，
//! 清零表示块空闲可分配。

use crate::error::{Error, ErrorKind, Result};

/// 测试位图中某一位是否被设置
///
/// # 参数
///
/// * `bitmap` - 位图数据
/// * `index` - 位索引（从 0 开始）
pub fn test_bit(bitmap: &[u8], index: u32) -> bool {
    let byte_index = (index / 8) as usize;
    let bit_offset = (index % 8) as u8;

    if byte_index >= bitmap.len() {
        return false;
    }

    (bitmap[byte_index] & (1 << bit_offset)) != 0
}

/// 设置位图中的某一位
///
/// # 返回
///
/// 成功返回 ()，如果索引超出范围返回错误
pub fn set_bit(bitmap: &mut [u8], index: u32) -> Result<()> {
    let byte_index = (index / 8) as usize;
    let bit_offset = (index % 8) as u8;

    if byte_index >= bitmap.len() {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            "Bitmap index out of range",
        ));
    }

    bitmap[byte_index] |= 1 << bit_offset;
    Ok(())
}

/// 清除位图中的某一位
///
/// # 返回
///
/// 成功返回 ()，如果索引超出范围返回错误
pub fn clear_bit(bitmap: &mut [u8], index: u32) -> Result<()> {
    let byte_index = (index / 8) as usize;
    let bit_offset = (index % 8) as u8;

    if byte_index >= bitmap.len() {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            "Bitmap index out of range",
        ));
    }

    bitmap[byte_index] &= !(1 << bit_offset);
    Ok(())
}

/// 在位图中查找第一个空闲位（值为 0 的位）
///
/// # 参数
///
/// * `bitmap` - 位图数据
/// * `start` - 开始搜索的位置（从 0 开始）
/// * `end` - 结束位置（不包含）
///
/// # 返回
///
/// 成功返回第一个空闲位的索引，如果没有找到返回 None
pub fn find_first_zero(bitmap: &[u8], start: u32, end: u32) -> Option<u32> {
    let max_bits = (bitmap.len() * 8) as u32;
    let end = end.min(max_bits);

    for i in start..end {
        if !test_bit(bitmap, i) {
            return Some(i);
        }
    }

    None
}

/// 统计位图中从 start 到 end 范围内被设置的位数
pub fn count_ones(bitmap: &[u8], start: u32, end: u32) -> u32 {
    let max_bits = (bitmap.len() * 8) as u32;
    let end = end.min(max_bits);
    let mut count = 0;

    for i in start..end {
        if test_bit(bitmap, i) {
            count += 1;
        }
    }

    count
}

/// 统计位图中从 start 到 end 范围内空闲的位数
pub fn count_zeros(bitmap: &[u8], start: u32, end: u32) -> u32 {
    let max_bits = (bitmap.len() * 8) as u32;
    let end = end.min(max_bits);
    (end - start) - count_ones(bitmap, start, end)
}
