// Glacier 远端客户端
//
// 核心逻辑只依赖 GlacierClient trait，传输层细节由具体实现负责。
// AwsGlacierClient 基于官方 SDK，保险库账号统一使用 "-"（当前凭证所属账号）

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_glacier::error::DisplayErrorContext;
use aws_sdk_glacier::primitives::ByteStream;
use tracing::{debug, info};

use super::types::{ArchiveResult, RemoteError};

/// 当前凭证所属账号
const ACCOUNT_ID: &str = "-";

/// 冷存储远端操作
#[async_trait]
pub trait GlacierClient: Send + Sync {
    /// 初始化分片上传，返回 uploadId
    async fn initiate_multipart_upload(
        &self,
        vault: &str,
        part_size: u64,
        description: &str,
    ) -> Result<String, RemoteError>;

    /// 上传单个分片，返回服务端计算的分片校验和
    ///
    /// `range` 为 `bytes {start}-{end}/*` 形式的字面字符串
    async fn upload_multipart_part(
        &self,
        vault: &str,
        upload_id: &str,
        range: &str,
        body: Vec<u8>,
    ) -> Result<String, RemoteError>;

    /// 完成分片上传
    async fn complete_multipart_upload(
        &self,
        vault: &str,
        upload_id: &str,
        archive_size: u64,
        checksum: &str,
    ) -> Result<ArchiveResult, RemoteError>;

    /// 单次上传整个归档（不分片）
    async fn upload_archive(
        &self,
        vault: &str,
        description: &str,
        checksum: &str,
        body: Vec<u8>,
    ) -> Result<ArchiveResult, RemoteError>;
}

/// 基于 aws-sdk-glacier 的客户端
#[derive(Clone)]
pub struct AwsGlacierClient {
    client: aws_sdk_glacier::Client,
}

impl AwsGlacierClient {
    /// 使用默认凭证链和指定区域创建客户端
    pub async fn from_region(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        info!("Glacier 客户端初始化完成: region={}", region);

        Self {
            client: aws_sdk_glacier::Client::new(&config),
        }
    }

    fn archive_result(
        operation: &'static str,
        archive_id: Option<&str>,
        location: Option<&str>,
        checksum: Option<&str>,
    ) -> Result<ArchiveResult, RemoteError> {
        let archive_id =
            archive_id.ok_or_else(|| RemoteError::new(operation, "响应缺少 archiveId"))?;

        Ok(ArchiveResult {
            archive_id: archive_id.to_string(),
            location: location.unwrap_or_default().to_string(),
            checksum: checksum.unwrap_or_default().to_string(),
            // SDK 输出不暴露响应头中的 Date，使用收到响应的时间
            timestamp: chrono::Utc::now().to_rfc2822(),
        })
    }
}

#[async_trait]
impl GlacierClient for AwsGlacierClient {
    async fn initiate_multipart_upload(
        &self,
        vault: &str,
        part_size: u64,
        description: &str,
    ) -> Result<String, RemoteError> {
        const OP: &str = "initiate_multipart_upload";

        let output = self
            .client
            .initiate_multipart_upload()
            .account_id(ACCOUNT_ID)
            .vault_name(vault)
            .part_size(part_size.to_string())
            .archive_description(description)
            .send()
            .await
            .map_err(|e| RemoteError::new(OP, DisplayErrorContext(&e)))?;

        output
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| RemoteError::new(OP, "响应缺少 uploadId"))
    }

    async fn upload_multipart_part(
        &self,
        vault: &str,
        upload_id: &str,
        range: &str,
        body: Vec<u8>,
    ) -> Result<String, RemoteError> {
        const OP: &str = "upload_multipart_part";

        debug!("上传分片: range={}, size={}", range, body.len());

        // 请求头中的树形哈希由 SDK 拦截器根据请求体补齐
        let output = self
            .client
            .upload_multipart_part()
            .account_id(ACCOUNT_ID)
            .vault_name(vault)
            .upload_id(upload_id)
            .range(range)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| RemoteError::new(OP, DisplayErrorContext(&e)))?;

        output
            .checksum()
            .map(str::to_string)
            .ok_or_else(|| RemoteError::new(OP, "响应缺少 checksum"))
    }

    async fn complete_multipart_upload(
        &self,
        vault: &str,
        upload_id: &str,
        archive_size: u64,
        checksum: &str,
    ) -> Result<ArchiveResult, RemoteError> {
        const OP: &str = "complete_multipart_upload";

        let output = self
            .client
            .complete_multipart_upload()
            .account_id(ACCOUNT_ID)
            .vault_name(vault)
            .upload_id(upload_id)
            .archive_size(archive_size.to_string())
            .checksum(checksum)
            .send()
            .await
            .map_err(|e| RemoteError::new(OP, DisplayErrorContext(&e)))?;

        Self::archive_result(
            OP,
            output.archive_id(),
            output.location(),
            output.checksum(),
        )
    }

    async fn upload_archive(
        &self,
        vault: &str,
        description: &str,
        checksum: &str,
        body: Vec<u8>,
    ) -> Result<ArchiveResult, RemoteError> {
        const OP: &str = "upload_archive";

        let output = self
            .client
            .upload_archive()
            .account_id(ACCOUNT_ID)
            .vault_name(vault)
            .archive_description(description)
            .checksum(checksum)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| RemoteError::new(OP, DisplayErrorContext(&e)))?;

        Self::archive_result(
            OP,
            output.archive_id(),
            output.location(),
            output.checksum(),
        )
    }
}
