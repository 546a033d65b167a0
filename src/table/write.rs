//! 分配表编码和持久化

use super::{AllocTable, Geometry};
use crate::consts::{
    TABLE_ENTRY_SIZE, TABLE_HEADER_SIZE, TABLE_MAGIC, TABLE_REGION_SIZE, TABLE_VERSION,
};
use crate::device::{ensure_presented, FlashDevice, Watchdog};
use crate::error::Result;
use alloc::vec;
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};

/// 将分配表编码为持久化镜像
///
/// 布局见 [`super::decode_table`]。输出长度为
/// `TABLE_HEADER_SIZE + num_entries * TABLE_ENTRY_SIZE`。
pub fn encode_table(table: &AllocTable) -> Vec<u8> {
    let entries = table.entries.as_slice();
    let mut buf = vec![0u8; TABLE_HEADER_SIZE + entries.len() * TABLE_ENTRY_SIZE];

    LittleEndian::write_u32(&mut buf[0..4], TABLE_MAGIC);
    LittleEndian::write_u16(&mut buf[4..6], TABLE_VERSION);
    LittleEndian::write_u16(&mut buf[6..8], entries.len() as u16);
    LittleEndian::write_u16(&mut buf[8..10], table.next_free_index);

    for (i, entry) in entries.iter().enumerate() {
        let off = TABLE_HEADER_SIZE + i * TABLE_ENTRY_SIZE;
        LittleEndian::write_u32(&mut buf[off..off + 4], entry.tag);
        LittleEndian::write_u16(&mut buf[off + 4..off + 6], entry.block);
        LittleEndian::write_u16(&mut buf[off + 6..off + 8], entry.count);
    }

    buf
}

/// 将分配表同步写回设备
///
/// 擦除末尾的保留区域后重写完整的表镜像。这条路径和长时间擦除
/// 在同一个阻塞上下文里，所以写前必须先喂狗。
///
/// 擦除-重写之间没有版本号也没有第二副本：如果在中途掉电，
/// 保留区域会处于不确定状态且无法恢复（下次启动按未初始化处理，
/// 丢弃所有分配）。
///
/// # 参数
///
/// * `table` - 要持久化的表
/// * `device` - 缓存 flash 设备
/// * `watchdog` - 保活接口
/// * `geom` - 块几何
///
/// # 错误
///
/// - `DeviceAbsent` - 设备不在场（不产生任何变更）
/// - `ErrorKind::Io` - 擦除或写入失败
pub fn persist<D: FlashDevice, W: Watchdog>(
    table: &AllocTable,
    device: &mut D,
    watchdog: &mut W,
    geom: &Geometry,
) -> Result<()> {
    ensure_presented(device)?;

    let image = encode_table(table);
    log::debug!(
        "[TABLE] persist: {} entries, {} bytes at {:#x}",
        table.num_entries(),
        image.len(),
        geom.table_offset()
    );

    watchdog.refresh();
    device.disable_mapped_mode()?;
    device.erase(geom.table_offset(), TABLE_REGION_SIZE)?;
    device.write(geom.table_offset(), &image)?;
    device.enable_mapped_mode()?;

    Ok(())
}
