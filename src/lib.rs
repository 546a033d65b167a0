//! flashcache_core: 持久化内容寻址 flash 缓存分配器
//!
//! 把慢速数据源（SD 类块设备）上的内容按需搬进内存映射的 SPI flash，
//! 并在重启之间记住哪些内容已经缓存：
//! - **持久化分配表**：驻留在设备末尾的保留区域，启动时加载，
//!   每次分配变更后同步写回
//! - **内容寻址**：采样式 CRC32 指纹 + 请求大小精确匹配，命中即返回
//! - **轮转驱逐**：容量不足时按游标顺序强制驱逐并合并相邻空闲段
//!
//! # 示例
//!
//! ```rust,ignore
//! use flashcache_core::{FlashCache, FlashDevice, NoWatchdog, Result};
//!
//! // 为缓存 flash 和数据源各实现一次 FlashDevice trait
//! fn boot(flash: MyFlash, sd: MySd) -> Result<()> {
//!     let mut cache = FlashCache::new(flash, sd, NoWatchdog)?;
//!
//!     // 已缓存则立即返回映射地址，否则擦除、搬运、持久化
//!     let addr = cache.copy(/* 源地址 */ 0x4000, /* 字节数 */ 51200)?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`consts`] - 常量定义
//! - [`crc`] - CRC32 校验和
//! - [`device`] - 设备能力抽象和喂狗接口
//! - [`table`] - 持久化分配表
//! - [`lookup`] - 内容查找
//! - [`balloc`] - 块分配和轮转回收
//! - [`copy`] - 数据搬运入口
//! - [`sd`] - SPI 模式 SD 数据源

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

// ===== 核心模块 =====

/// 错误处理
pub mod error;

/// 常量定义
pub mod consts;

/// CRC32 校验和
pub mod crc;

/// 设备能力抽象
pub mod device;

/// 持久化分配表
pub mod table;

/// 内容查找
pub mod lookup;

/// 块分配
pub mod balloc;

/// 数据搬运
pub mod copy;

/// SD 数据源
pub mod sd;

// ===== 常用类型再导出 =====

pub use copy::FlashCache;
pub use device::{FlashDevice, NoWatchdog, StatusFlags, Watchdog};
pub use error::{Error, ErrorKind, Result};
pub use sd::{SdCard, SpiBus};
pub use table::{AllocTable, Geometry, TableEntry};
