//! 分配表加载和验证

use super::{AllocTable, EntryList, Geometry, TableEntry};
use crate::consts::{
    TABLE_ENTRY_SIZE, TABLE_HEADER_SIZE, TABLE_MAGIC, TABLE_MAX_SERIALIZED, TABLE_VERSION,
};
use crate::device::FlashDevice;
use crate::error::Result;
use alloc::vec;
use byteorder::{ByteOrder, LittleEndian};

/// 解码持久化的分配表镜像
///
/// 布局（小端序）：`magic: u32`，`version: u16`，`num_entries: u16`，
/// `next_free_index: u16`，然后是 `num_entries` 个
/// `{tag: u32, block: u16, count: u16}` 表项。
///
/// # 参数
///
/// * `buf` - 保留区域的原始字节（至少 `TABLE_MAX_SERIALIZED` 字节）
/// * `capacity` - 表项数量上限
///
/// # 返回
///
/// 镜像有效返回 `Some(AllocTable)`；magic/version 不匹配或表项数量
/// 超出范围返回 `None`（触发重新格式化）
pub fn decode_table(buf: &[u8], capacity: u16) -> Option<AllocTable> {
    if buf.len() < TABLE_HEADER_SIZE {
        return None;
    }

    let magic = LittleEndian::read_u32(&buf[0..4]);
    let version = LittleEndian::read_u16(&buf[4..6]);
    if magic != TABLE_MAGIC || version != TABLE_VERSION {
        return None;
    }

    let num_entries = LittleEndian::read_u16(&buf[6..8]);
    let next_free_index = LittleEndian::read_u16(&buf[8..10]);

    // magic/version 匹配但表项数量出界：镜像不可信，走格式化路径
    if num_entries == 0 || num_entries > capacity {
        return None;
    }

    let need = TABLE_HEADER_SIZE + num_entries as usize * TABLE_ENTRY_SIZE;
    if buf.len() < need {
        return None;
    }

    let mut entries = EntryList::new(capacity as usize);
    for i in 0..num_entries as usize {
        let off = TABLE_HEADER_SIZE + i * TABLE_ENTRY_SIZE;
        let entry = TableEntry {
            tag: LittleEndian::read_u32(&buf[off..off + 4]),
            block: LittleEndian::read_u16(&buf[off + 4..off + 6]),
            count: LittleEndian::read_u16(&buf[off + 6..off + 8]),
        };
        // num_entries <= capacity，push 不会失败
        entries.push(entry).ok()?;
    }

    Some(AllocTable {
        next_free_index,
        entries,
    })
}

/// 加载持久化的分配表，失败则格式化
///
/// 从设备末尾的保留区域读取表镜像并验证。magic/version 不匹配时
/// 合成单个覆盖整个设备的空闲表项作为权威的内存状态——此时
/// **不会**立即写回设备（由下一次分配的持久化检查点落盘）。
/// 这是一次丢弃所有旧分配的数据丢失式修复。
///
/// # 参数
///
/// * `device` - 缓存 flash 设备
/// * `geom` - 块几何
///
/// # 错误
///
/// - `DeviceAbsent` - 设备不在场（不产生任何变更）
/// - `ErrorKind::Io` - 读取失败
pub fn load_or_format<D: FlashDevice>(device: &mut D, geom: &Geometry) -> Result<AllocTable> {
    crate::device::ensure_presented(device)?;

    let mut buf = vec![0u8; TABLE_MAX_SERIALIZED];
    device.read(geom.table_offset(), &mut buf)?;

    match decode_table(&buf, geom.capacity_blocks()) {
        Some(table) => {
            log::debug!(
                "[TABLE] loaded: {} entries, cursor={}",
                table.num_entries(),
                table.next_free_index()
            );
            Ok(table)
        }
        None => {
            log::info!("[TABLE] not initialized, formatting");
            Ok(AllocTable::formatted(geom.capacity_blocks()))
        }
    }
}
