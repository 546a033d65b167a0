//! 块分配
//!
//! 选择/拆分一段连续块，写入新表项，然后同步持久化分配表。

use super::reclaim;
use crate::device::{FlashDevice, Watchdog};
use crate::error::{Error, ErrorKind, Result};
use crate::table::{persist, AllocTable, Geometry, TableEntry};

/// 分配一段连续块并提交到分配表
///
/// 策略：
/// - 快速路径：表序最后一个表项空闲且够大就直接用（偏向最近腾出的
///   高地址区域，减少回收折腾）。
/// - 否则走轮转回收拿到一段足够长的空闲块。
/// - 拿到的段比需要的大就拆分：在它后面插入覆盖剩余块的空闲表项。
/// - 把选中的表项就地改写为请求的 `tag` 和精确块数。
/// - 持久化分配表——这是持久性检查点，每次成功分配都先落盘再返回。
///
/// # 参数
///
/// * `table` - 分配表
/// * `device` - 缓存 flash 设备
/// * `watchdog` - 保活接口
/// * `geom` - 块几何
/// * `blocks_needed` - 需要的块数
/// * `tag` - 内容指纹
///
/// # 返回
///
/// 成功返回表项索引；绝对设备地址 = `entry.block * store_block_size`
///
/// # 错误
///
/// - `InvalidInput` - 请求 0 块（不产生任何变更）
/// - `CapacityExceeded` - 请求超过设备总块数（不产生任何变更）
/// - `InvariantBroken` - 回收结果小于请求（防御性断言）
/// - `DeviceAbsent` / `Io` - 持久化失败
pub fn allocate<D: FlashDevice, W: Watchdog>(
    table: &mut AllocTable,
    device: &mut D,
    watchdog: &mut W,
    geom: &Geometry,
    blocks_needed: u32,
    tag: u32,
) -> Result<usize> {
    let capacity = geom.capacity_blocks();

    if blocks_needed == 0 {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            "zero-block allocation",
        ));
    }

    if blocks_needed > capacity as u32 {
        log::error!(
            "[ALLOC] request for {} blocks exceeds capacity {}",
            blocks_needed,
            capacity
        );
        return Err(Error::new(
            ErrorKind::CapacityExceeded,
            "flash too small for requested size",
        ));
    }
    let blocks_needed = blocks_needed as u16;

    // 快速路径：表尾的空闲段
    let last = table.entries.len().saturating_sub(1);
    let idx = match table.entries.get(last) {
        Some(entry) if entry.is_free() && entry.count >= blocks_needed => last,
        _ => reclaim(table, blocks_needed, capacity)?,
    };

    let chosen = *table
        .entries
        .get(idx)
        .ok_or(Error::new(ErrorKind::InvariantBroken, "bad entry index"))?;
    if chosen.count < blocks_needed {
        return Err(Error::new(
            ErrorKind::InvariantBroken,
            "reclaimed run smaller than requested",
        ));
    }

    // 拆分过大的段：剩余块作为新的空闲表项插到后面
    if chosen.count > blocks_needed {
        table.entries.insert(
            idx + 1,
            TableEntry {
                tag: 0,
                block: chosen.block + blocks_needed,
                count: chosen.count - blocks_needed,
            },
        )?;
    }

    if let Some(entry) = table.entries.get_mut(idx) {
        entry.tag = tag;
        entry.count = blocks_needed;
    }

    log::info!(
        "[ALLOC] entry {}: tag={:#x}, block={}, count={}",
        idx,
        tag,
        chosen.block,
        blocks_needed
    );

    // 持久性检查点
    persist(table, device, watchdog, geom)?;

    Ok(idx)
}
