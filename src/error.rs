//! 错误类型定义
//!
//! 提供 flash 缓存分配器操作的错误类型。
//!
//! 按照固件的惯例，这里的大多数错误都是不可恢复的：调用方（顶层控制循环）
//! 收到错误后应该复位设备，而不是继续使用可能已损坏的分配器状态。
//! 唯一在内部被静默处理的情况是持久化表的 magic/version 不匹配——
//! 这会触发完整的重新初始化（丢弃所有旧分配）。

use core::fmt;

/// flash 缓存操作错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: &'static str,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// I/O 错误
    Io,
    /// 无效参数
    InvalidInput,
    /// 设备不存在（未检测到 flash）
    DeviceAbsent,
    /// 请求的块数超过设备总容量
    CapacityExceeded,
    /// 分配表不变量被破坏（防御性断言，正常情况下不可达）
    InvariantBroken,
    /// 设备命令/响应序列重试耗尽
    RetryExhausted,
    /// 不支持的操作
    Unsupported,
}

impl Error {
    /// 创建新错误
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self { kind, message }
    }

    /// 获取错误类型
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// 获取错误消息
    pub const fn message(&self) -> &'static str {
        self.message
    }

    /// 是否为致命错误
    ///
    /// 除了 `InvalidInput` 以外的所有类别都被视为致命错误：
    /// 调用方不应重试，而应复位整个设备。
    pub const fn is_fatal(&self) -> bool {
        !matches!(self.kind, ErrorKind::InvalidInput)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result 类型别名
pub type Result<T> = core::result::Result<T, Error>;
