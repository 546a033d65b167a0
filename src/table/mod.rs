//! 分配表模块
//!
//! 持久化的块分配表：表头（magic/version + 轮转游标）加上一段有序的
//! 表项序列。表驻留在设备末尾的固定保留区域，启动时加载一次，
//! 每次分配变更后同步重写。
//!
//! table/entry.rs 定义表项和有界有序序列
//! table/geometry.rs 从设备容量推导块几何
//! table/read.rs 提供加载/格式化
//! table/write.rs 提供编码和持久化

mod entry;
mod geometry;
mod read;
mod write;

pub use entry::{EntryList, TableEntry};
pub use geometry::Geometry;
pub use read::{decode_table, load_or_format};
pub use write::{encode_table, persist};

use crate::error::{Error, ErrorKind, Result};

/// 内存中的分配表
///
/// 表是整个分配器的唯一持久化状态，只能由分配和复位操作修改。
/// 它没有显式销毁：生命周期等于持有它的分配器实例的生命周期。
pub struct AllocTable {
    /// 轮转游标：下一次回收从这个索引开始（跨调用持久化，保证轮转公平）
    pub(crate) next_free_index: u16,
    /// 有序表项序列，按 block 升序且完全连续
    pub(crate) entries: EntryList,
}

impl AllocTable {
    /// 创建一张刚格式化的表：单个空闲表项覆盖整个设备
    ///
    /// # 参数
    ///
    /// * `capacity_blocks` - 设备总块数（同时也是表项上限）
    pub fn formatted(capacity_blocks: u16) -> Self {
        let mut entries = EntryList::new(capacity_blocks as usize);
        // 容量大于 0，push 不会失败
        let _ = entries.push(TableEntry {
            tag: 0,
            block: 0,
            count: capacity_blocks,
        });

        Self {
            next_free_index: 0,
            entries,
        }
    }

    /// 表项数量
    pub fn num_entries(&self) -> u16 {
        self.entries.len() as u16
    }

    /// 当前轮转游标
    pub fn next_free_index(&self) -> u16 {
        self.next_free_index
    }

    /// 获取表项
    pub fn entry(&self, idx: usize) -> Option<&TableEntry> {
        self.entries.get(idx)
    }

    /// 所有表项
    pub fn entries(&self) -> &[TableEntry] {
        self.entries.as_slice()
    }

    /// 校验表不变量
    ///
    /// 每次变更之后都必须满足：
    /// - 表项按 block 升序且完全连续（`entry[i].block + entry[i].count == entry[i+1].block`）
    /// - 所有 count 之和等于总块容量
    /// - 没有两个相邻的空闲表项（空闲段总是立即合并）
    /// - 表项数量在 `1..=容量` 之间
    ///
    /// # 参数
    ///
    /// * `capacity_blocks` - 设备总块数
    pub fn check_invariants(&self, capacity_blocks: u16) -> Result<()> {
        let entries = self.entries.as_slice();

        if entries.is_empty() || entries.len() > capacity_blocks as usize {
            return Err(Error::new(
                ErrorKind::InvariantBroken,
                "entry count out of range",
            ));
        }

        if entries[0].block != 0 {
            return Err(Error::new(
                ErrorKind::InvariantBroken,
                "first entry does not start at block 0",
            ));
        }

        let mut total: u32 = 0;
        for (i, entry) in entries.iter().enumerate() {
            total += entry.count as u32;

            if let Some(next) = entries.get(i + 1) {
                if entry.block as u32 + entry.count as u32 != next.block as u32 {
                    return Err(Error::new(
                        ErrorKind::InvariantBroken,
                        "entries not contiguous",
                    ));
                }
                if entry.is_free() && next.is_free() {
                    return Err(Error::new(
                        ErrorKind::InvariantBroken,
                        "adjacent free entries not coalesced",
                    ));
                }
            }
        }

        if total != capacity_blocks as u32 {
            return Err(Error::new(
                ErrorKind::InvariantBroken,
                "entry counts do not sum to capacity",
            ));
        }

        Ok(())
    }
}
