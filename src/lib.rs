// Glacier rsync Library
// 类 rsync 的 Glacier 冷存储增量备份核心库

// 配置管理模块
pub mod config;

// 日志模块
pub mod logging;

// 流式压缩模块
pub mod compression;

// Glacier 接口模块（树形哈希、远端客户端）
pub mod glacier;

// 分片上传模块
pub mod uploader;

// 同步记录持久化模块
pub mod persistence;

// 备份编排模块
pub mod backup;

// 导出常用类型
pub use backup::{BackupOrchestrator, BackupSummary, SignalOutcome, StopHandle};
pub use compression::{Compression, PartSource, StreamingCompressor};
pub use config::{AppConfig, BackupConfig, CliArgs, ConfigError, LogConfig};
pub use glacier::{ArchiveResult, AwsGlacierClient, GlacierClient, RemoteError};
pub use persistence::{SyncDbError, SyncRecord, SyncStateStore};
pub use uploader::{decide_part_size, SessionState, UploadError, UploadSession};
