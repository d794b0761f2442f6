//! 备份编排
//!
//! 逐个处理候选文件（严格串行）：
//! 1. 检查停止标记
//! 2. 读取文件状态，查询是否已归档
//! 3. 决定分片大小，构建压缩读取器
//! 4. 驱动上传会话
//! 5. 关闭文件句柄，成功时写入同步记录
//!
//! 远端错误和本地 I/O 错误只影响当前文件；同步记录库错误终止整次运行

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use super::scanner::{file_mtime, format_bytes, scan_source};
use super::shutdown::StopHandle;
use crate::compression::StreamingCompressor;
use crate::config::BackupConfig;
use crate::glacier::{archive_description, GlacierClient};
use crate::persistence::{SyncDbError, SyncStateStore};
use crate::uploader::{decide_part_size, RetryPolicy, UploadSession};

/// 一次备份运行的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackupSummary {
    /// 候选文件总数
    pub total: usize,
    /// 上传成功
    pub uploaded: usize,
    /// 已归档而跳过
    pub skipped: usize,
    /// 失败（下次运行重试）
    pub failed: usize,
    /// 是否因停止请求提前结束
    pub stopped_early: bool,
}

/// 单个文件的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    Uploaded,
    Skipped,
    Failed,
}

/// 备份编排器
pub struct BackupOrchestrator<C: GlacierClient + ?Sized> {
    client: Arc<C>,
    store: Arc<SyncStateStore>,
    config: BackupConfig,
    stop: StopHandle,
}

impl<C: GlacierClient + ?Sized> BackupOrchestrator<C> {
    pub fn new(client: Arc<C>, store: Arc<SyncStateStore>, config: BackupConfig) -> Self {
        let stop = StopHandle::new(store.clone());
        Self {
            client,
            store,
            config,
            stop,
        }
    }

    /// 使用外部创建的停止句柄（必须指向同一个同步记录库）
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    /// 停止句柄，供信号回调使用
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// 请求停止：当前文件完成后退出循环
    pub fn stop(&self) {
        self.stop.request_stop();
    }

    /// 立即关闭同步记录库
    pub fn close(&self) {
        self.store.close();
    }

    /// 执行备份
    pub async fn backup(&self) -> Result<BackupSummary, SyncDbError> {
        let files = scan_source(&self.config.src);
        let total = files.len();
        info!("待备份文件数: {}", total);

        let mut summary = BackupSummary {
            total,
            ..Default::default()
        };

        let result = self.process_files(&files, &mut summary).await;

        // 无论循环如何结束都关闭连接
        self.store.close();
        result?;

        info!(
            "全部文件处理完成: 共 {}，上传 {}，跳过 {}，失败 {}{}",
            summary.total,
            summary.uploaded,
            summary.skipped,
            summary.failed,
            if summary.stopped_early { "（提前停止）" } else { "" }
        );
        Ok(summary)
    }

    async fn process_files(
        &self,
        files: &[std::path::PathBuf],
        summary: &mut BackupSummary,
    ) -> Result<(), SyncDbError> {
        let total = files.len();
        for (index, path) in files.iter().enumerate() {
            if self.stop.is_stop_requested() {
                warn!("收到停止请求，提前退出（剩余 {} 个文件未处理）", total - index);
                summary.stopped_early = true;
                break;
            }

            match self.backup_file(path, index + 1, total).await? {
                FileOutcome::Uploaded => summary.uploaded += 1,
                FileOutcome::Skipped => summary.skipped += 1,
                FileOutcome::Failed => summary.failed += 1,
            }
        }
        Ok(())
    }

    /// 处理单个文件
    async fn backup_file(
        &self,
        path: &Path,
        position: usize,
        total: usize,
    ) -> Result<FileOutcome, SyncDbError> {
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) => {
                error!("{}/{} - 读取文件状态失败: {:?}, 错误: {}", position, total, path, e);
                return Ok(FileOutcome::Failed);
            }
        };
        let file_size = metadata.len();
        let mtime = match file_mtime(&metadata) {
            Ok(mtime) => mtime,
            Err(e) => {
                error!("{}/{} - 读取修改时间失败: {:?}, 错误: {}", position, total, path, e);
                return Ok(FileOutcome::Failed);
            }
        };

        if self.store.is_archived(path, file_size, mtime)? {
            info!("{}/{} - {:?} 已归档，跳过", position, total, path);
            return Ok(FileOutcome::Skipped);
        }

        info!(
            "{}/{} - {:?} 需要备份 ({})",
            position,
            total,
            path,
            format_bytes(file_size)
        );

        let part_size = decide_part_size(file_size, self.config.part_size);
        if part_size != self.config.part_size {
            info!("分片大小调整为 {}", format_bytes(part_size));
        }

        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                error!("打开文件失败: {:?}, 错误: {}", path, e);
                return Ok(FileOutcome::Failed);
            }
        };

        let compression = self.config.compression;
        let mut source = match StreamingCompressor::new(&mut file, compression) {
            Ok(source) => Some(source),
            Err(e) => {
                error!("创建 {} 压缩读取器失败: {}", compression, e);
                None
            }
        };

        let description = archive_description(
            path,
            file_size,
            mtime,
            self.config.description.as_deref(),
        );

        let mut session = UploadSession::new(&*self.client, &self.config.vault)
            .with_retry(RetryPolicy::new(self.config.max_retries))
            .with_part_verification(self.config.verify_parts);

        let result = if self.config.single_shot_max > 0 && file_size <= self.config.single_shot_max
        {
            session.upload_whole(source.as_mut(), &description).await
        } else {
            session.run(source.as_mut(), part_size, &description).await
        };

        drop(source);
        drop(file);

        let archive = match result {
            Ok(archive) => {
                info!("{:?} 备份成功: archive_id={}", path, archive.archive_id);
                Some(archive)
            }
            Err(e) => {
                error!("{:?} 备份失败: {}", path, e);
                None
            }
        };

        self.store
            .record_archived(path, file_size, mtime, archive.as_ref(), compression)?;

        Ok(if archive.is_some() {
            FileOutcome::Uploaded
        } else {
            FileOutcome::Failed
        })
    }
}
