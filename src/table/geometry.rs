//! 块几何推导
//!
//! 从设备总容量推导存储块大小和分配表的驻留位置。

use crate::consts::{ALIGN_BOUNDARY, TABLE_CAPACITY, TABLE_REGION_SIZE};
use crate::error::{Error, ErrorKind, Result};

/// 设备块几何
///
/// 设备末尾保留 `TABLE_REGION_SIZE` 字节给分配表，其余空间按
/// `TABLE_CAPACITY` 等分并向下对齐到擦除边界，得到存储块大小。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    total_size: u32,
    store_block_size: u32,
}

impl Geometry {
    /// 从设备总容量推导几何参数
    ///
    /// # 参数
    ///
    /// * `total_size` - 设备总容量（字节）
    ///
    /// # 错误
    ///
    /// 设备太小，推导出的存储块不足一个擦除边界时返回 `InvalidInput`
    pub fn for_device(total_size: u32) -> Result<Self> {
        let usable = total_size.saturating_sub(TABLE_REGION_SIZE);
        let store_block_size = (usable / TABLE_CAPACITY as u32) & !(ALIGN_BOUNDARY - 1);

        if store_block_size < ALIGN_BOUNDARY {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "device too small: store block below erase boundary",
            ));
        }

        Ok(Self {
            total_size,
            store_block_size,
        })
    }

    /// 设备总容量（字节）
    pub fn total_size(&self) -> u32 {
        self.total_size
    }

    /// 存储块大小（字节）
    pub fn store_block_size(&self) -> u32 {
        self.store_block_size
    }

    /// 总块容量
    pub fn capacity_blocks(&self) -> u16 {
        TABLE_CAPACITY
    }

    /// 分配表在设备上的字节偏移（末尾的保留区域）
    pub fn table_offset(&self) -> u32 {
        self.total_size - TABLE_REGION_SIZE
    }

    /// 块号对应的设备内字节地址
    pub fn block_addr(&self, block: u16) -> u32 {
        block as u32 * self.store_block_size
    }

    /// 装下 `size` 字节需要的块数（向上取整，`u32::MAX` 附近不溢出）
    pub fn blocks_for_size(&self, size: u32) -> u32 {
        size.div_ceil(self.store_block_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_derivation() {
        // 126 块 * 4096 + 4096 保留区域 = 520192
        let geom = Geometry::for_device(520192).unwrap();
        assert_eq!(geom.store_block_size(), 4096);
        assert_eq!(geom.capacity_blocks(), 126);
        assert_eq!(geom.table_offset(), 520192 - 4096);
    }

    #[test]
    fn test_geometry_aligns_down() {
        // 16 MiB 设备：(16M - 4096) / 126 = 133109，对齐到 131072
        let geom = Geometry::for_device(16 * 1024 * 1024).unwrap();
        assert_eq!(geom.store_block_size() % ALIGN_BOUNDARY, 0);
        assert_eq!(geom.store_block_size(), 131072);
    }

    #[test]
    fn test_device_too_small() {
        let err = Geometry::for_device(64 * 1024).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_block_math() {
        let geom = Geometry::for_device(520192).unwrap();
        assert_eq!(geom.block_addr(0), 0);
        assert_eq!(geom.block_addr(2), 8192);

        assert_eq!(geom.blocks_for_size(1), 1);
        assert_eq!(geom.blocks_for_size(4096), 1);
        assert_eq!(geom.blocks_for_size(4097), 2);
        assert_eq!(geom.blocks_for_size(5000), 2);
    }

    #[test]
    fn test_blocks_for_size_near_max() {
        let geom = Geometry::for_device(520192).unwrap();

        // 接近 u32::MAX 的请求照常向上取整，不回绕成 0
        assert_eq!(geom.blocks_for_size(u32::MAX), u32::MAX / 4096 + 1);
        // u32::MAX - 4095 恰好是块大小的整数倍
        assert_eq!(geom.blocks_for_size(u32::MAX - 4095), u32::MAX / 4096);
    }
}
