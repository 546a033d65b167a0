//! 内容查找
//!
//! 把请求的（块数，内容指纹）对与现有表项匹配，判断缓存命中。

use crate::table::AllocTable;

/// 在分配表中查找匹配的表项
///
/// 线性扫描：命中条件是 `tag` 相等**且** `count` 与请求的块数完全相等。
/// 块数不同永远算未命中——即使底层内容相同，改变大小也会强制一次
/// 全新的、不相交的分配。
///
/// 指纹本身是采样式的弱指纹（见 [`crate::copy`]）：采样前缀之外的
/// 内容差异、或 CRC 碰撞，都无法被区分。这是速度换正确性的既定取舍，
/// 不是正确性保证。
///
/// # 参数
///
/// * `table` - 分配表
/// * `block_count` - 请求的块数
/// * `tag` - 内容指纹
///
/// # 返回
///
/// 命中返回第一个匹配表项的索引
pub fn find(table: &AllocTable, block_count: u16, tag: u32) -> Option<usize> {
    table
        .entries()
        .iter()
        .position(|entry| entry.tag == tag && entry.count == block_count)
}
