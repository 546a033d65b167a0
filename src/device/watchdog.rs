//! 喂狗（liveness）接口
//!
//! 长时间阻塞的擦除/编程路径需要在操作前后向外部监督定时器发出保活
//! 信号，否则会触发误复位。这不是并发原语，只是对外部看门狗的调度礼貌。

/// 看门狗 trait
///
/// 在长时间阻塞操作（表持久化、流式搬运）前后调用 `refresh()`。
///
/// # 设计说明
///
/// 这是一个接口预留，允许用户根据需要选择实现：
/// - `NoWatchdog` - 测试或没有看门狗的环境（默认）
/// - 硬件看门狗的喂狗寄存器封装
pub trait Watchdog {
    /// 发出保活信号
    fn refresh(&mut self);
}

/// 无看门狗实现（默认）
///
/// 用于测试环境或已知不需要保活的场景
pub struct NoWatchdog;

impl Watchdog for NoWatchdog {
    #[inline]
    fn refresh(&mut self) {}
}
