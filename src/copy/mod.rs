//! 数据搬运
//!
//! 面向调用方的入口：把源设备上的一段数据搬进缓存 flash，返回
//! 映射地址空间中的目的地址。已缓存的内容直接返回地址，不做任何
//! 搬运 I/O。
//!
//! copy/fingerprint.rs 实现采样式内容指纹

mod fingerprint;

pub use self::fingerprint::compute_tag;

use crate::balloc::allocate;
use crate::consts::{ALIGN_BOUNDARY, SOURCE_CHUNK_SIZE};
use crate::device::{FlashDevice, Watchdog};
use crate::error::{Error, ErrorKind, Result};
use crate::lookup;
use crate::table::{load_or_format, persist, AllocTable, Geometry};

/// flash 缓存
///
/// 持有缓存 flash 设备、数据源设备和喂狗接口。分配表在第一次
/// 搬运时惰性加载，之后常驻内存，每次分配变更后同步写回设备。
///
/// 没有内部锁：所有操作都假定单一控制流，并发保护是调用方的责任。
///
/// # 示例
///
/// ```rust,ignore
/// use flashcache_core::{FlashCache, NoWatchdog, Result};
///
/// fn load_asset(flash: MyFlash, sd: MySd) -> Result<u32> {
///     let mut cache = FlashCache::new(flash, sd, NoWatchdog)?;
///     // 已缓存则立即返回，否则擦除并搬运
///     cache.copy(0x4000, 51200)
/// }
/// ```
pub struct FlashCache<F: FlashDevice, S: FlashDevice, W: Watchdog> {
    flash: F,
    source: S,
    watchdog: W,
    geom: Geometry,
    table: Option<AllocTable>,
    chunk: [u8; SOURCE_CHUNK_SIZE as usize],
}

impl<F: FlashDevice, S: FlashDevice, W: Watchdog> FlashCache<F, S, W> {
    /// 创建缓存实例
    ///
    /// 从缓存设备的总容量推导块几何。不触碰分配表：表在第一次
    /// 需要时才从设备加载。
    ///
    /// # 参数
    ///
    /// * `flash` - 缓存 flash 设备
    /// * `source` - 数据源设备
    /// * `watchdog` - 保活接口
    ///
    /// # 错误
    ///
    /// 设备太小无法推导块几何时返回 `InvalidInput`
    pub fn new(flash: F, source: S, watchdog: W) -> Result<Self> {
        let geom = Geometry::for_device(flash.total_size())?;

        Ok(Self {
            flash,
            source,
            watchdog,
            geom,
            table: None,
            chunk: [0; SOURCE_CHUNK_SIZE as usize],
        })
    }

    /// 块几何
    pub fn geometry(&self) -> &Geometry {
        &self.geom
    }

    /// 当前的分配表（尚未加载时为 `None`）
    pub fn table(&self) -> Option<&AllocTable> {
        self.table.as_ref()
    }

    /// 确保分配表已加载（只加载一次，幂等）
    fn ensure_table(&mut self) -> Result<()> {
        if self.table.is_none() {
            self.table = Some(load_or_format(&mut self.flash, &self.geom)?);
        }
        Ok(())
    }

    /// 把源设备上的一段数据搬进缓存 flash
    ///
    /// 先计算内容指纹并查表：命中就直接返回目的地址，不做任何
    /// 搬运 I/O。未命中则分配块（可能驱逐旧内容）、按源传输粒度
    /// 流式搬运，目的地址落在擦除边界上就先擦再写。搬运期间映射
    /// 模式保持关闭，循环内持续喂狗。
    ///
    /// 搬运没有写后校验，也没有跨调用的中间状态。
    ///
    /// # 参数
    ///
    /// * `source_address` - 源设备内字节地址
    /// * `size` - 要搬运的字节数
    ///
    /// # 返回
    ///
    /// 数据在映射地址空间中的地址（映射基址 + 块偏移）
    ///
    /// # 错误
    ///
    /// - `InvalidInput` - `size` 为 0
    /// - `CapacityExceeded` - 请求超过设备总块数
    /// - `DeviceAbsent` / `Io` - 设备访问失败
    pub fn copy(&mut self, source_address: u32, size: u32) -> Result<u32> {
        if size == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "zero-sized copy"));
        }

        self.ensure_table()?;
        let blocks_needed = self.geom.blocks_for_size(size);
        let tag = compute_tag(&mut self.source, source_address, size, &mut self.chunk)?;

        let table = self
            .table
            .as_mut()
            .ok_or(Error::new(ErrorKind::InvariantBroken, "table not loaded"))?;

        if let Some(idx) = lookup::find(table, blocks_needed as u16, tag) {
            let entry = table
                .entry(idx)
                .ok_or(Error::new(ErrorKind::InvariantBroken, "bad entry index"))?;
            log::info!(
                "[COPY] already cached: tag={:#x}, block={}, count={}",
                tag,
                entry.block,
                entry.count
            );
            return Ok(self.flash.mapped_base() + self.geom.block_addr(entry.block));
        }

        let idx = allocate(
            table,
            &mut self.flash,
            &mut self.watchdog,
            &self.geom,
            blocks_needed,
            tag,
        )?;
        let block = table
            .entry(idx)
            .ok_or(Error::new(ErrorKind::InvariantBroken, "bad entry index"))?
            .block;

        log::info!(
            "[COPY] {} bytes from {:#x} into block {} ({} blocks)",
            size,
            source_address,
            block,
            blocks_needed
        );

        let mut src = source_address;
        let mut dst = self.geom.block_addr(block);
        let mut left = size as i64;

        self.flash.disable_mapped_mode()?;
        while left > 0 {
            self.watchdog.refresh();

            if dst % ALIGN_BOUNDARY == 0 {
                self.flash.erase(dst, ALIGN_BOUNDARY)?;
            }

            // 末尾不足一个传输单位也按整块搬：多写的字节落在本次
            // 分配的块内，不会越过块边界
            self.source.read(src, &mut self.chunk)?;
            self.flash.write(dst, &self.chunk)?;

            src += SOURCE_CHUNK_SIZE;
            dst += SOURCE_CHUNK_SIZE;
            left -= SOURCE_CHUNK_SIZE as i64;
        }
        self.flash.enable_mapped_mode()?;

        Ok(self.flash.mapped_base() + self.geom.block_addr(block))
    }

    /// 复位缓存：丢弃所有已缓存内容
    ///
    /// 把分配表重置为覆盖整个设备的单个空闲表项并立即持久化。
    /// 已搬运的数据不会被擦除，只是不再可达，之后的分配会覆盖它。
    pub fn reset(&mut self) -> Result<()> {
        let table = AllocTable::formatted(self.geom.capacity_blocks());
        persist(&table, &mut self.flash, &mut self.watchdog, &self.geom)?;
        self.table = Some(table);

        log::info!("[COPY] cache reset");
        Ok(())
    }

    /// 输出缓存设备的诊断信息
    pub fn log_device_info(&mut self) -> Result<()> {
        let mut id = [0u8; 3];
        self.flash.read_id(&mut id)?;
        let status = self.flash.read_status()?;
        let config = self.flash.read_config()?;

        log::info!(
            "[DEVICE] {}: id={:02x}{:02x}{:02x}, status={:?}, config={:#04x}",
            self.flash.name(),
            id[0],
            id[1],
            id[2],
            status,
            config
        );
        log::info!(
            "[DEVICE] {} bytes total, {} blocks of {} bytes",
            self.geom.total_size(),
            self.geom.capacity_blocks(),
            self.geom.store_block_size()
        );
        Ok(())
    }
}
