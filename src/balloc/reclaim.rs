//! 轮转回收
//!
//! 只在分配器的快速路径失败时才会走到这里。回收策略是确定性的
//! 轮转驱逐：按游标顺序无条件释放表项，不看内容大小也不看最近
//! 使用情况。这是用缓存命中率换实现简单性——不是 LRU，也没有
//! 价值概念，调用方必须容忍已缓存数据被任意驱逐。

use crate::error::{Error, ErrorKind, Result};
use crate::table::AllocTable;

/// 轮转回收出一段足够大的空闲块
///
/// 算法：
/// 1. `cursor = next_free_index % num_entries`；如果从该表项起到设备
///    末尾已经放不下 `blocks_needed`，先把游标复位到 0。
/// 2. 循环：重新计算 cursor，推进 `next_free_index = cursor + 1`
///    （跨调用持久化，保证轮转公平），强制释放该表项（`tag = 0`）。
/// 3. 向前合并：前驱空闲则把游标左移到前驱。
/// 4. 向后合并：把所有紧邻的空闲后继并入当前表项并删除。
/// 5. 当前表项的块数够了就停止，否则继续轮转。
///
/// # 参数
///
/// * `table` - 分配表
/// * `blocks_needed` - 需要的连续块数
/// * `capacity_blocks` - 设备总块数
///
/// # 返回
///
/// 成功返回空闲段的表项索引
///
/// # 错误
///
/// `InvariantBroken` - 轮转一圈仍找不到足够容量（调用方已做过容量
/// 检查，正常情况下不可达）
pub fn reclaim(table: &mut AllocTable, blocks_needed: u16, capacity_blocks: u16) -> Result<usize> {
    let num_entries = table.entries.len();
    if num_entries == 0 {
        return Err(Error::new(ErrorKind::InvariantBroken, "empty entry list"));
    }

    let start = table.next_free_index as usize % num_entries;
    let start_block = table.entries.get(start).map(|e| e.block).unwrap_or(0);

    // 从这里到设备末尾放不下：游标复位，从头开始轮转
    if start_block as u32 + blocks_needed as u32 > capacity_blocks as u32 {
        table.next_free_index = 0;
    }

    // 每次迭代至少释放一个表项；一圈之内必然能凑出容量，
    // 超过预算说明表已损坏
    let budget = 2 * capacity_blocks as usize;
    for _ in 0..budget {
        let num_entries = table.entries.len();
        let mut cursor = table.next_free_index as usize % num_entries;
        table.next_free_index = cursor as u16 + 1;

        // 无条件驱逐：不管这里现在缓存着什么
        if let Some(entry) = table.entries.get_mut(cursor) {
            if !entry.is_free() {
                log::debug!(
                    "[RECLAIM] evict entry {} (tag={:#x}, block={}, count={})",
                    cursor,
                    entry.tag,
                    entry.block,
                    entry.count
                );
            }
            entry.tag = 0;
        }

        // 向前合并：移到空闲前驱，让后面的向后合并一并处理
        if cursor > 0 && table.entries.get(cursor - 1).is_some_and(|e| e.is_free()) {
            cursor -= 1;
            table.next_free_index -= 1;
        }

        // 向后合并：吸收所有紧邻的空闲后继。被驱逐的表项可能夹在
        // 两段空闲之间，只合并一个后继会留下两个相邻空闲表项
        while cursor + 1 < table.entries.len()
            && table.entries.get(cursor + 1).is_some_and(|e| e.is_free())
        {
            let successor = table.entries.remove(cursor + 1)?;
            if let Some(entry) = table.entries.get_mut(cursor) {
                entry.count += successor.count;
            }
        }

        if table.entries.get(cursor).map(|e| e.count).unwrap_or(0) >= blocks_needed {
            return Ok(cursor);
        }
    }

    Err(Error::new(
        ErrorKind::InvariantBroken,
        "reclaimer exhausted entries without finding capacity",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{AllocTable, TableEntry};

    fn table_with(entries: &[(u32, u16, u16)]) -> AllocTable {
        let mut table = AllocTable::formatted(126);
        let _ = table.entries.remove(0);
        for &(tag, block, count) in entries {
            table.entries.push(TableEntry { tag, block, count }).unwrap();
        }
        table
    }

    #[test]
    fn test_reclaim_evicts_at_cursor() {
        let mut table = table_with(&[(0xA, 0, 42), (0xB, 42, 42), (0xC, 84, 42)]);

        let idx = reclaim(&mut table, 42, 126).unwrap();
        assert_eq!(idx, 0);
        assert!(table.entry(0).unwrap().is_free());
        // 游标推进，下次从下一个表项开始
        assert_eq!(table.next_free_index(), 1);
        table.check_invariants(126).unwrap();
    }

    #[test]
    fn test_reclaim_rotates_across_calls() {
        let mut table = table_with(&[(0xA, 0, 42), (0xB, 42, 42), (0xC, 84, 42)]);

        // 三次回收按轮转顺序驱逐不同的表项
        let first = reclaim(&mut table, 1, 126).unwrap();
        assert_eq!(table.entry(first).unwrap().tag, 0);
        table.entries.get_mut(first).unwrap().tag = 0xA1;

        let second = reclaim(&mut table, 1, 126).unwrap();
        assert_ne!(table.entry(second).unwrap().tag, 0xA1);
        table.entries.get_mut(second).unwrap().tag = 0xA2;

        let third = reclaim(&mut table, 1, 126).unwrap();
        let tags: alloc::vec::Vec<u32> =
            table.entries().iter().map(|e| e.tag).collect();
        assert!(tags.contains(&0xA1) && tags.contains(&0xA2));
        assert_eq!(table.entry(third).unwrap().tag, 0);
        table.check_invariants(126).unwrap();
    }

    #[test]
    fn test_reclaim_coalesces_forward() {
        // 驱逐中间表项后与空闲后继合并
        let mut table = table_with(&[(0xA, 0, 40), (0xB, 40, 40), (0, 80, 46)]);
        table.next_free_index = 1;

        let idx = reclaim(&mut table, 80, 126).unwrap();
        assert_eq!(idx, 1);
        let entry = table.entry(idx).unwrap();
        assert_eq!(entry.count, 86);
        assert_eq!(table.num_entries(), 2);
        table.check_invariants(126).unwrap();
    }

    #[test]
    fn test_reclaim_coalesces_backward() {
        // 前驱空闲：游标左移并合并
        let mut table = table_with(&[(0, 0, 40), (0xB, 40, 40), (0xC, 80, 46)]);
        table.next_free_index = 1;

        let idx = reclaim(&mut table, 80, 126).unwrap();
        assert_eq!(idx, 0);
        let entry = table.entry(idx).unwrap();
        assert!(entry.is_free());
        assert_eq!(entry.count, 80);
        assert_eq!(table.num_entries(), 2);
        table.check_invariants(126).unwrap();
    }

    #[test]
    fn test_reclaim_merges_both_neighbors() {
        // 被驱逐的表项夹在两段空闲之间：三段合并成一段，
        // 不留下相邻的空闲表项
        let mut table = table_with(&[
            (0xE, 0, 10),
            (0, 10, 20),
            (0xB, 30, 5),
            (0, 35, 71),
            (0xD, 106, 20),
        ]);
        table.next_free_index = 2;

        let idx = reclaim(&mut table, 24, 126).unwrap();
        assert_eq!(idx, 1);
        let entry = table.entry(idx).unwrap();
        assert!(entry.is_free());
        assert_eq!((entry.block, entry.count), (10, 96));
        assert_eq!(table.num_entries(), 3);
        table.check_invariants(126).unwrap();
    }

    #[test]
    fn test_reclaim_wraparound_resets_cursor() {
        // 游标指向靠近末尾的表项，放不下就从头开始
        let mut table = table_with(&[(0xA, 0, 100), (0xB, 100, 26)]);
        table.next_free_index = 1;

        let idx = reclaim(&mut table, 100, 126).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(table.entry(idx).unwrap().block, 0);
        assert!(table.entry(idx).unwrap().count >= 100);
        table.check_invariants(126).unwrap();
    }

    #[test]
    fn test_reclaim_keeps_evicting_until_fits() {
        let mut table = table_with(&[(0xA, 0, 42), (0xB, 42, 42), (0xC, 84, 42)]);
        table.next_free_index = 0;

        // 需要 100 块：一个表项不够，持续驱逐合并直到凑够
        let idx = reclaim(&mut table, 100, 126).unwrap();
        let entry = table.entry(idx).unwrap();
        assert!(entry.count >= 100);
        table.check_invariants(126).unwrap();
    }
}
