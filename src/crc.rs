//! CRC32C 校验和计算
//!
//! 为文件内容和 journal 记录提供统一的 32 位校验和。
//! 写入时和验证时必须使用同一算法，否则完整性比较没有意义。

/// 计算 CRC32C 校验和（一次性计算）
#[inline]
pub fn checksum32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_basic() {
        let data = b"hello world";
        assert_ne!(checksum32(data), 0);
        assert_eq!(checksum32(data), checksum32(data));
        assert_ne!(checksum32(b"hello world"), checksum32(b"hello worle"));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(checksum32(&[]), 0);
    }
}
