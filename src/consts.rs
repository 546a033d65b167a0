//! flash 缓存分配器常量定义
//!
//! 这个模块包含了分配器的所有常量定义，包括：
//! - 持久化分配表的布局常量
//! - 块几何参数
//! - 数据搬运相关常量

//=============================================================================
// 持久化分配表
//=============================================================================

/// 分配表魔数（"SLSF"，小端序写入）
pub const TABLE_MAGIC: u32 = 0x4653_4C53;

/// 分配表版本
pub const TABLE_VERSION: u16 = 1;

/// 表项数量上限（同时也是设备的总块数）
pub const TABLE_CAPACITY: u16 = 126;

/// 表头序列化大小（magic + version + num_entries + next_free_index）
pub const TABLE_HEADER_SIZE: usize = 10;

/// 单个表项序列化大小（tag + block + count）
pub const TABLE_ENTRY_SIZE: usize = 8;

/// 分配表在设备末尾占用的保留区域大小
pub const TABLE_REGION_SIZE: u32 = 4096;

/// 序列化后的分配表大小上限
///
/// 保留区域有 4096 字节，但表本身必须装进 1024 字节。
/// 如果增加表头字段，需要相应调小 TABLE_CAPACITY。
pub const TABLE_MAX_SERIALIZED: usize = 1024;

// 编译期检查：完整的表必须能装进 1KB
const _: () = assert!(
    TABLE_HEADER_SIZE + TABLE_CAPACITY as usize * TABLE_ENTRY_SIZE <= TABLE_MAX_SERIALIZED
);

//=============================================================================
// 块几何
//=============================================================================

/// 擦除对齐边界（4096 字节）
///
/// 存储块大小向下对齐到这个边界；搬运数据时目的地址落在
/// 这个边界上就要先擦除。
pub const ALIGN_BOUNDARY: u32 = 4096;

//=============================================================================
// 数据搬运
//=============================================================================

/// 从源设备读取的单次传输长度（512 字节）
///
/// 同时也是内容指纹采样的最大长度。
pub const SOURCE_CHUNK_SIZE: u32 = 512;
