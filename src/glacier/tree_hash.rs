// Glacier 树形哈希（Tree Hash）
//
// 计算规则：
// 1. 将数据按 1MB 切分，每块计算 SHA-256
// 2. 相邻两个摘要按原始字节（不是十六进制文本）拼接后再做 SHA-256
// 3. 落单的摘要原样进入上一层
// 4. 重复直到只剩一个摘要
//
// 分片校验和的合并使用同一套两两折叠算法，顺序必须与分片顺序一致

use sha2::{Digest, Sha256};

/// 树形哈希的叶子块大小: 1MB
pub const TREE_HASH_BLOCK_SIZE: usize = 1024 * 1024;

/// 空对象的树形哈希（空字符串的 SHA-256）
pub const EMPTY_TREE_HASH: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// 树形哈希错误
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TreeHashError {
    /// 摘要列表为空
    #[error("校验和列表为空")]
    Empty,
    /// 摘要不是合法的 64 位十六进制 SHA-256
    #[error("非法的校验和: {0}")]
    InvalidDigest(String),
}

type RawDigest = [u8; 32];

fn sha256(data: &[u8]) -> RawDigest {
    Sha256::digest(data).into()
}

/// 两两折叠，直到只剩一个摘要
fn fold(mut level: Vec<RawDigest>) -> Option<RawDigest> {
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => {
                    let mut hasher = Sha256::new();
                    hasher.update(left);
                    hasher.update(right);
                    hasher.finalize().into()
                }
                [single] => *single,
                _ => unreachable!("chunks(2) 只会产生 1 或 2 个元素"),
            })
            .collect();
    }
    level.pop()
}

/// 计算单个分片的树形哈希
///
/// 只对前 `min(data.len(), part_size)` 字节计算。空数据返回 [`EMPTY_TREE_HASH`]。
pub fn hash_part(data: &[u8], part_size: usize) -> String {
    let upper = data.len().min(part_size);
    let leaves: Vec<RawDigest> = data[..upper]
        .chunks(TREE_HASH_BLOCK_SIZE)
        .map(sha256)
        .collect();

    match fold(leaves) {
        Some(root) => hex::encode(root),
        None => EMPTY_TREE_HASH.to_string(),
    }
}

/// 计算整段数据的树形哈希（单次上传时使用）
pub fn hash_bytes(data: &[u8]) -> String {
    hash_part(data, data.len())
}

/// 合并一组十六进制摘要
///
/// 单元素列表原样返回；空列表返回 [`TreeHashError::Empty`]，由调用方决定空对象的处理方式。
pub fn combine_checksums<S: AsRef<str>>(checksums: &[S]) -> Result<String, TreeHashError> {
    let mut leaves = Vec::with_capacity(checksums.len());
    for checksum in checksums {
        let text = checksum.as_ref();
        let raw: RawDigest = hex::decode(text)
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| TreeHashError::InvalidDigest(text.to_string()))?;
        leaves.push(raw);
    }

    fold(leaves)
        .map(hex::encode)
        .ok_or(TreeHashError::Empty)
}
