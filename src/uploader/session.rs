// 分片上传会话
//
// 状态流转：
//   Idle → Initiated → Uploading* → Completed
//   任一步骤失败 → Aborted
//
// 一个会话只服务一个文件，不跨文件复用，也不持久化。
// 失败的会话不会在本次运行中续传，文件留待下次运行从头上传

use std::io;

use tracing::{debug, error, info, warn};

use super::retry::RetryPolicy;
use crate::compression::PartSource;
use crate::glacier::{
    combine_checksums, content_range, hash_bytes, hash_part, ArchiveResult, GlacierClient,
    RemoteError, TreeHashError, EMPTY_TREE_HASH, TREE_HASH_BLOCK_SIZE,
};

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// 尚未初始化
    Idle,
    /// 已获取 uploadId
    Initiated,
    /// 正在上传分片
    Uploading,
    /// 上传完成
    Completed,
    /// 已放弃
    Aborted,
}

/// 上传错误
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// 没有可用的数据源（例如压缩器构建失败）
    #[error("没有可用的数据源，跳过上传")]
    NoSource,

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("读取数据源失败: {0}")]
    Io(#[from] io::Error),

    /// 本地分片哈希与服务端返回的不一致
    #[error("分片校验和不一致: range={range}, local={local}, remote={remote}")]
    ChecksumMismatch {
        range: String,
        local: String,
        remote: String,
    },

    #[error("会话状态 {state:?} 下不能执行 {operation}")]
    InvalidState {
        state: SessionState,
        operation: &'static str,
    },
}

/// 单文件上传会话
pub struct UploadSession<'a, C: GlacierClient + ?Sized> {
    client: &'a C,
    vault: &'a str,
    state: SessionState,
    upload_id: Option<String>,
    /// 已上传的字节数（下一个分片的起始偏移）
    offset: u64,
    /// 按分片顺序保存的服务端校验和
    checksums: Vec<String>,
    retry: RetryPolicy,
    verify_parts: bool,
}

impl<'a, C: GlacierClient + ?Sized> UploadSession<'a, C> {
    pub fn new(client: &'a C, vault: &'a str) -> Self {
        Self {
            client,
            vault,
            state: SessionState::Idle,
            upload_id: None,
            offset: 0,
            checksums: Vec::new(),
            retry: RetryPolicy::default(),
            verify_parts: false,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// 上传每个分片后用本地树形哈希核对服务端返回的校验和
    pub fn with_part_verification(mut self, verify_parts: bool) -> Self {
        self.verify_parts = verify_parts;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn upload_id(&self) -> Option<&str> {
        self.upload_id.as_deref()
    }

    pub fn bytes_uploaded(&self) -> u64 {
        self.offset
    }

    pub fn checksums(&self) -> &[String] {
        &self.checksums
    }

    fn expect_state(
        &self,
        allowed: &[SessionState],
        operation: &'static str,
    ) -> Result<(), UploadError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(UploadError::InvalidState {
                state: self.state,
                operation,
            })
        }
    }

    fn abort(&mut self, err: UploadError) -> UploadError {
        error!("上传会话中止 (upload_id={:?}): {}", self.upload_id, err);
        self.state = SessionState::Aborted;
        err
    }

    // =====================================================
    // 分片上传协议
    // =====================================================

    /// 初始化分片上传
    pub async fn initiate(&mut self, part_size: u64, description: &str) -> Result<(), UploadError> {
        self.expect_state(&[SessionState::Idle], "initiate")?;

        let client = self.client;
        let vault = self.vault;
        let result = self
            .retry
            .run(|| client.initiate_multipart_upload(vault, part_size, description))
            .await;

        match result {
            Ok(upload_id) => {
                info!(
                    "分片上传已初始化: vault={}, upload_id={}, part_size={}",
                    vault, upload_id, part_size
                );
                self.upload_id = Some(upload_id);
                self.state = SessionState::Initiated;
                Ok(())
            }
            Err(e) => Err(self.abort(e.into())),
        }
    }

    /// 逐个读取并上传分片，直到数据源结束
    pub async fn upload_loop<S: PartSource + ?Sized>(
        &mut self,
        source: &mut S,
        part_size: u64,
    ) -> Result<(), UploadError> {
        self.expect_state(
            &[SessionState::Initiated, SessionState::Uploading],
            "upload_loop",
        )?;

        let read_size = match usize::try_from(part_size) {
            Ok(n) => n,
            Err(_) => {
                let err = io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("分片大小超出平台限制: {}", part_size),
                );
                return Err(self.abort(err.into()));
            }
        };
        let upload_id = self.upload_id.clone().unwrap_or_default();
        let client = self.client;
        let vault = self.vault;

        loop {
            let chunk = match source.read_part(read_size) {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => return Err(self.abort(e.into())),
            };

            self.state = SessionState::Uploading;
            let len = chunk.len() as u64;
            let range = content_range(self.offset, len);
            let local = self.verify_parts.then(|| hash_part(&chunk, chunk.len()));

            debug!("上传分片: upload_id={}, range={}", upload_id, range);
            let result = self
                .retry
                .run(|| client.upload_multipart_part(vault, &upload_id, &range, chunk.clone()))
                .await;

            let remote = match result {
                Ok(checksum) => checksum,
                Err(e) => return Err(self.abort(e.into())),
            };

            if let Some(local) = local {
                if !local.eq_ignore_ascii_case(&remote) {
                    return Err(self.abort(UploadError::ChecksumMismatch {
                        range,
                        local,
                        remote,
                    }));
                }
            }

            self.checksums.push(remote);
            self.offset += len;
        }

        debug!(
            "分片读取结束: upload_id={}, parts={}, bytes={}",
            upload_id,
            self.checksums.len(),
            self.offset
        );
        Ok(())
    }

    /// 完成分片上传
    ///
    /// 整体校验和由服务端返回的分片校验和合并得出；没有任何分片时使用空对象哈希
    pub async fn complete(&mut self) -> Result<ArchiveResult, UploadError> {
        self.expect_state(
            &[SessionState::Initiated, SessionState::Uploading],
            "complete",
        )?;

        let checksum = match combine_checksums(&self.checksums) {
            Ok(checksum) => checksum,
            Err(TreeHashError::Empty) => EMPTY_TREE_HASH.to_string(),
            Err(e) => {
                let err = RemoteError::new("upload_multipart_part", e);
                return Err(self.abort(err.into()));
            }
        };

        let upload_id = self.upload_id.clone().unwrap_or_default();
        let client = self.client;
        let vault = self.vault;
        let archive_size = self.offset;
        let result = self
            .retry
            .run(|| client.complete_multipart_upload(vault, &upload_id, archive_size, &checksum))
            .await;

        match result {
            Ok(archive) => {
                info!(
                    "分片上传完成: archive_id={}, size={}, checksum={}",
                    archive.archive_id, archive_size, archive.checksum
                );
                if !archive.checksum.eq_ignore_ascii_case(&checksum) {
                    warn!(
                        "服务端确认的校验和与本地合并结果不同: local={}, remote={}",
                        checksum, archive.checksum
                    );
                }
                self.state = SessionState::Completed;
                Ok(archive)
            }
            Err(e) => Err(self.abort(e.into())),
        }
    }

    /// 完整执行一次分片上传：initiate → upload_loop → complete
    ///
    /// `source` 为 `None` 时直接中止，不会发起任何远端调用
    pub async fn run<S: PartSource + ?Sized>(
        &mut self,
        source: Option<&mut S>,
        part_size: u64,
        description: &str,
    ) -> Result<ArchiveResult, UploadError> {
        let Some(source) = source else {
            return Err(self.abort(UploadError::NoSource));
        };

        self.initiate(part_size, description).await?;
        self.upload_loop(source, part_size).await?;
        self.complete().await
    }

    // =====================================================
    // 单次上传
    // =====================================================

    /// 读取整个数据源并一次性上传（不分片）
    pub async fn upload_whole<S: PartSource + ?Sized>(
        &mut self,
        source: Option<&mut S>,
        description: &str,
    ) -> Result<ArchiveResult, UploadError> {
        self.expect_state(&[SessionState::Idle], "upload_whole")?;
        let Some(source) = source else {
            return Err(self.abort(UploadError::NoSource));
        };

        let mut body = Vec::new();
        loop {
            match source.read_part(TREE_HASH_BLOCK_SIZE) {
                Ok(Some(chunk)) => body.extend_from_slice(&chunk),
                Ok(None) => break,
                Err(e) => return Err(self.abort(e.into())),
            }
        }

        self.state = SessionState::Uploading;
        let checksum = hash_bytes(&body);
        let size = body.len() as u64;
        let client = self.client;
        let vault = self.vault;
        let result = self
            .retry
            .run(|| client.upload_archive(vault, description, &checksum, body.clone()))
            .await;

        match result {
            Ok(archive) => {
                info!(
                    "单次上传完成: archive_id={}, size={}, checksum={}",
                    archive.archive_id, size, archive.checksum
                );
                self.offset = size;
                self.checksums.push(checksum);
                self.state = SessionState::Completed;
                Ok(archive)
            }
            Err(e) => Err(self.abort(e.into())),
        }
    }
}
