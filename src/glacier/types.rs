// Glacier 接口类型定义

use std::fmt;
use std::path::Path;

/// 归档描述中的工具标记
pub const TOOL_TAG: &str = "grsync";

/// 归档结果（complete / upload_archive 成功后由服务端返回）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveResult {
    /// 归档 ID
    pub archive_id: String,
    /// 归档位置（相对 URI）
    pub location: String,
    /// 服务端确认的整体树形哈希
    pub checksum: String,
    /// 服务端完成时间
    pub timestamp: String,
}

/// 远端调用错误
///
/// 对核心逻辑来说所有远端失败都是同一种错误，不区分状态码
#[derive(Debug, Clone, thiserror::Error)]
#[error("{operation} 失败: {message}")]
pub struct RemoteError {
    /// 失败的操作名
    pub operation: &'static str,
    /// 错误描述
    pub message: String,
}

impl RemoteError {
    pub fn new(operation: &'static str, message: impl fmt::Display) -> Self {
        Self {
            operation,
            message: message.to_string(),
        }
    }
}

/// 生成归档描述
///
/// 格式: `grsync|<原始路径>|<文件大小>|<修改时间>|<用户描述>`，仅作为服务端元数据
pub fn archive_description(
    path: &Path,
    file_size: u64,
    mtime: f64,
    user_desc: Option<&str>,
) -> String {
    // 整数秒也保留小数部分，如 1700000000.0
    format!(
        "{}|{}|{}|{:?}|{}",
        TOOL_TAG,
        path.display(),
        file_size,
        mtime,
        user_desc.unwrap_or_default()
    )
}

/// 分片字节范围请求头: `bytes {start}-{end}/*`
pub fn content_range(offset: u64, len: u64) -> String {
    // 空分片时 end 比 start 小 1
    let end = i128::from(offset) + i128::from(len) - 1;
    format!("bytes {}-{}/*", offset, end)
}
