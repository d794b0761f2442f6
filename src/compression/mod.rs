// 流式压缩模块
//
// 把原始文件（可选地经过压缩）包装成支持定长读取的数据源，
// 上传会话按分片大小逐段读取

pub mod producer;
pub mod stream;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;

pub use producer::ChunkProducer;
#[cfg(feature = "zstd")]
pub use producer::ZstdProducer;
pub use stream::{ChunkBuffer, StreamingCompressor};

/// 压缩算法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// 不压缩
    #[default]
    #[value(skip)]
    Plain,
    /// zstd 流式压缩
    Zstd,
}

impl Compression {
    /// 写入同步记录的压缩标记
    pub fn tag(&self) -> &'static str {
        match self {
            Compression::Plain => "plain",
            Compression::Zstd => "zstd",
        }
    }

    /// 当前构建是否包含该编解码器
    pub fn is_available(&self) -> bool {
        match self {
            Compression::Plain => true,
            Compression::Zstd => cfg!(feature = "zstd"),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// 定长读取数据源
///
/// `read_part(n)` 返回恰好 `n` 字节；仅在流末尾返回更少的字节；
/// 流彻底读完后返回 `None`。空分片是内容，`None` 才表示结束
pub trait PartSource {
    fn read_part(&mut self, n: usize) -> io::Result<Option<Vec<u8>>>;
}
