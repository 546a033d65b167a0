//! 表项和有界有序序列

use crate::error::{Error, ErrorKind, Result};
use alloc::vec::Vec;

/// 分配表表项
///
/// 描述一段连续块的归属：`tag == 0` 表示空闲段，非零 tag 是内容指纹。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableEntry {
    /// 内容指纹（0 = 空闲）
    pub tag: u32,
    /// 起始块号
    pub block: u16,
    /// 块数量
    pub count: u16,
}

impl TableEntry {
    /// 是否为空闲段
    #[inline]
    pub fn is_free(&self) -> bool {
        self.tag == 0
    }
}

/// 有界有序表项序列
///
/// 容量在构造时确定并强制执行，插入/删除通过移位实现（O(n)）。
/// 对应持久化布局中固定大小的表项数组：上界刻意保留，不做无界扩展。
pub struct EntryList {
    entries: Vec<TableEntry>,
    capacity: usize,
}

impl EntryList {
    /// 创建空序列
    ///
    /// # 参数
    ///
    /// * `capacity` - 表项数量上限
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// 表项数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 容量上限
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 获取表项
    pub fn get(&self, idx: usize) -> Option<&TableEntry> {
        self.entries.get(idx)
    }

    /// 获取可变表项
    pub fn get_mut(&mut self, idx: usize) -> Option<&mut TableEntry> {
        self.entries.get_mut(idx)
    }

    /// 所有表项的切片
    pub fn as_slice(&self) -> &[TableEntry] {
        &self.entries
    }

    /// 在末尾追加表项
    ///
    /// # 错误
    ///
    /// 序列已满时返回 `InvariantBroken`
    pub fn push(&mut self, entry: TableEntry) -> Result<()> {
        if self.entries.len() >= self.capacity {
            return Err(Error::new(ErrorKind::InvariantBroken, "entry list full"));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// 在指定位置插入表项，后续表项右移一格
    ///
    /// # 参数
    ///
    /// * `idx` - 插入位置（`0..=len`）
    ///
    /// # 错误
    ///
    /// 序列已满或位置越界时返回 `InvariantBroken`
    pub fn insert(&mut self, idx: usize, entry: TableEntry) -> Result<()> {
        if self.entries.len() >= self.capacity {
            return Err(Error::new(ErrorKind::InvariantBroken, "entry list full"));
        }
        if idx > self.entries.len() {
            return Err(Error::new(
                ErrorKind::InvariantBroken,
                "insert index out of range",
            ));
        }
        self.entries.insert(idx, entry);
        Ok(())
    }

    /// 删除指定位置的表项，后续表项左移一格
    ///
    /// # 错误
    ///
    /// 位置越界时返回 `InvariantBroken`
    pub fn remove(&mut self, idx: usize) -> Result<TableEntry> {
        if idx >= self.entries.len() {
            return Err(Error::new(
                ErrorKind::InvariantBroken,
                "remove index out of range",
            ));
        }
        Ok(self.entries.remove(idx))
    }
}
