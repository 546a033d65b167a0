//! CRC32 校验和计算
//!
//! 为内容指纹提供 CRC32 计算功能

use crc32fast::Hasher;

/// 计算 CRC32 校验和（一次性计算）
///
/// # 参数
/// * `data` - 要计算校验和的数据
///
/// # 返回
/// CRC32 值
#[inline]
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// 计算 CRC32 校验和（追加模式）
///
/// # 参数
/// * `crc` - 初始 CRC 值
/// * `data` - 要计算校验和的数据
///
/// # 返回
/// 更新后的 CRC32 值
#[inline]
pub fn crc32_append(crc: u32, data: &[u8]) -> u32 {
    let mut hasher = Hasher::new_with_initial(crc);
    hasher.update(data);
    hasher.finalize()
}
