//! 内容指纹
//!
//! 指纹是 CRC32 链式计算：源地址（小端字节）、请求大小（小端字节）、
//! 然后是源数据的前 `min(size, SOURCE_CHUNK_SIZE)` 字节采样。

use crate::consts::SOURCE_CHUNK_SIZE;
use crate::crc::{crc32, crc32_append};
use crate::device::FlashDevice;
use crate::error::Result;

/// 计算一次搬运请求的内容指纹
///
/// 采样只覆盖源数据的前 `SOURCE_CHUNK_SIZE` 字节：超出采样窗口的
/// 内容差异无法被区分，CRC 碰撞也无法被区分。这是启动路径上的
/// 速度换正确性取舍，调用方必须把指纹当作弱指纹对待。
///
/// 地址和大小参与计算，所以同样的内容换了源地址或换了请求大小
/// 都会得到不同的指纹。
///
/// # 参数
///
/// * `source` - 数据源设备（执行一次采样读取）
/// * `source_address` - 源设备内字节地址
/// * `size` - 请求大小（字节）
/// * `buf` - 采样缓冲区，至少 `min(size, SOURCE_CHUNK_SIZE)` 字节
///
/// # 返回
///
/// 32 位内容指纹。注意 0 与空闲表项标记重合：指纹恰好算出 0 的
/// 内容永远不会命中缓存，每次都会被重新搬运。
pub fn compute_tag<S: FlashDevice>(
    source: &mut S,
    source_address: u32,
    size: u32,
    buf: &mut [u8],
) -> Result<u32> {
    let len = size.min(SOURCE_CHUNK_SIZE) as usize;

    let mut tag = crc32(&source_address.to_le_bytes());
    tag = crc32_append(tag, &size.to_le_bytes());

    source.read(source_address, &mut buf[..len])?;
    tag = crc32_append(tag, &buf[..len]);

    Ok(tag)
}
