//! 设备能力抽象
//!
//! 提供统一的设备能力接口和喂狗（liveness）接口。
//! device/interface.rs 定义 `FlashDevice` trait，缓存 flash 和数据源设备
//! 各实现一次，分配器只依赖 trait 本身。
//!
//! device/watchdog.rs 定义 `Watchdog` trait，在长时间阻塞的擦写路径上
//! 发出保活信号，避免外部看门狗误复位。

mod interface;
mod watchdog;

pub use interface::{FlashDevice, StatusFlags};
pub(crate) use interface::ensure_presented;
pub use watchdog::{NoWatchdog, Watchdog};
