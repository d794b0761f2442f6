//! 同步记录类型定义

use serde::{Deserialize, Serialize};

/// 同步记录
///
/// 每条记录对应一个成功归档的文件版本，只追加、不修改、不删除
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    /// 自增主键
    pub id: i64,
    /// 文件绝对路径
    pub path: String,
    /// 归档时的文件大小（字节）
    pub file_size: u64,
    /// 归档时的修改时间（秒，保留小数部分）
    pub mtime: f64,
    /// 服务端归档 ID
    pub archive_id: String,
    /// 服务端归档位置
    pub location: String,
    /// 整体树形哈希
    pub checksum: String,
    /// 压缩标记（plain / zstd）
    pub compression: String,
    /// 服务端完成时间
    pub timestamp: String,
}
