//! 设备能力接口
//!
//! 对应底层驱动暴露的统一能力集合：读/写/擦除/映射模式切换。
//! 缓存 flash 设备和数据源设备（SD 类块设备）各实现一次。

use crate::error::{Error, ErrorKind, Result};
use bitflags::bitflags;

bitflags! {
    /// 状态寄存器诊断位
    ///
    /// 仅用于诊断输出，分配器逻辑不依赖这些位。
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u8 {
        /// 写入/擦除进行中
        const BUSY          = 0x01;
        /// 写使能已置位
        const WRITE_ENABLED = 0x02;
        /// 块保护位 0
        const PROTECT_0     = 0x04;
        /// 块保护位 1
        const PROTECT_1     = 0x08;
    }
}

/// 设备能力接口
///
/// 实现此 trait 以提供底层设备访问。所有操作都是同步阻塞的：
/// 长时间的擦除会阻塞调用上下文直到完成，没有异步完成路径。
///
/// # 示例
///
/// ```rust,ignore
/// use flashcache_core::{FlashDevice, Result};
///
/// struct MyFlash {
///     // ...
/// }
///
/// impl FlashDevice for MyFlash {
///     fn total_size(&self) -> u32 {
///         16 * 1024 * 1024
///     }
///
///     fn is_presented(&self) -> bool {
///         true
///     }
///
///     fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
///         // 实现读取
///         Ok(())
///     }
///
///     // ... 其余方法
/// }
/// ```
pub trait FlashDevice {
    /// 初始化设备
    fn init(&mut self) -> Result<()>;

    /// 从设备地址读取数据
    ///
    /// # 参数
    ///
    /// * `addr` - 设备内字节地址
    /// * `buf` - 目标缓冲区，读取 `buf.len()` 字节
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()>;

    /// 向设备地址写入数据
    ///
    /// 目标区域必须已擦除，写入不做擦前检查。
    ///
    /// # 参数
    ///
    /// * `addr` - 设备内字节地址
    /// * `buf` - 源缓冲区，写入 `buf.len()` 字节
    fn write(&mut self, addr: u32, buf: &[u8]) -> Result<()>;

    /// 擦除一段区域
    ///
    /// # 参数
    ///
    /// * `addr` - 起始地址（应对齐到擦除边界）
    /// * `size` - 擦除长度（字节）
    fn erase(&mut self, addr: u32, size: u32) -> Result<()>;

    /// 启用内存映射读模式
    ///
    /// 映射模式与擦除/编程互斥：设备在擦写期间无法响应映射读。
    fn enable_mapped_mode(&mut self) -> Result<()>;

    /// 禁用内存映射读模式
    fn disable_mapped_mode(&mut self) -> Result<()>;

    /// 最小擦除粒度（字节）
    fn smallest_erase_size(&self) -> u32;

    /// 设备是否被检测到
    fn is_presented(&self) -> bool;

    /// 设备总容量（字节）
    fn total_size(&self) -> u32;

    /// 内存映射窗口的基地址
    ///
    /// 返回给调用方的目的地址位于这个地址空间中。
    fn mapped_base(&self) -> u32 {
        0
    }

    // ===== 诊断接口（分配器逻辑不使用）=====

    /// 读取 JEDEC ID（诊断用）
    fn read_id(&mut self, dest: &mut [u8; 3]) -> Result<()> {
        *dest = [0; 3];
        Ok(())
    }

    /// 读取状态寄存器（诊断用）
    fn read_status(&mut self) -> Result<StatusFlags> {
        Ok(StatusFlags::empty())
    }

    /// 读取配置寄存器（诊断用）
    fn read_config(&mut self) -> Result<u8> {
        Ok(0)
    }

    /// 设备名称（诊断用）
    fn name(&self) -> &'static str {
        "unknown"
    }
}

/// 检查设备是否在场，不在场则返回 `DeviceAbsent`
///
/// 所有会动到持久化状态的路径都先经过这个检查，保证设备缺失时
/// 不产生任何变更。
pub(crate) fn ensure_presented<D: FlashDevice>(device: &D) -> Result<()> {
    if !device.is_presented() {
        return Err(Error::new(
            ErrorKind::DeviceAbsent,
            "flash device not presented",
        ));
    }
    Ok(())
}
