//! 同步记录持久化模块
//!
//! 记录已归档的文件版本，使重复运行只上传新增或变化的文件

pub mod sync_db;
pub mod types;

pub use sync_db::{SyncDbError, SyncStateStore};
pub use types::SyncRecord;
