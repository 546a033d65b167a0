//! 块分配模块
//!
//! balloc/reclaim.rs 实现轮转回收（强制驱逐 + 相邻空闲段合并）
//! balloc/allocate.rs 实现块分配（快速路径 + 拆分 + 持久化检查点）

mod allocate;
mod reclaim;

pub use self::allocate::allocate;
pub use self::reclaim::reclaim;
