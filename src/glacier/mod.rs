// Glacier 冷存储模块

pub mod client;
pub mod tree_hash;
pub mod types;

pub use client::{AwsGlacierClient, GlacierClient};
pub use tree_hash::{
    combine_checksums, hash_bytes, hash_part, TreeHashError, EMPTY_TREE_HASH,
    TREE_HASH_BLOCK_SIZE,
};
pub use types::{archive_description, content_range, ArchiveResult, RemoteError, TOOL_TAG};
