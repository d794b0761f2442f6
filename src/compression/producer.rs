// 压缩数据生产者
//
// 按需拉取：每次调用产出一段长度不定的压缩数据，产出完毕返回 None

use std::io;
#[cfg(feature = "zstd")]
use std::io::Read;

/// 拉取式分段生产者
pub trait ChunkProducer {
    /// 产出下一段数据，没有更多数据时返回 `None`
    fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>>;
}

impl<P: ChunkProducer + ?Sized> ChunkProducer for Box<P> {
    fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        (**self).next_chunk()
    }
}

/// zstd 压缩生产者
///
/// 每次从压缩流中拉取至多 `write_size` 字节
#[cfg(feature = "zstd")]
pub struct ZstdProducer<R: Read> {
    encoder: zstd::stream::read::Encoder<'static, io::BufReader<R>>,
    write_size: usize,
}

#[cfg(feature = "zstd")]
impl<R: Read> ZstdProducer<R> {
    /// 默认每段 8KB
    pub const DEFAULT_WRITE_SIZE: usize = 8192;

    pub fn new(reader: R) -> io::Result<Self> {
        Self::with_write_size(reader, Self::DEFAULT_WRITE_SIZE)
    }

    pub fn with_write_size(reader: R, write_size: usize) -> io::Result<Self> {
        // level 0 表示使用 zstd 默认压缩级别
        let encoder = zstd::stream::read::Encoder::new(reader, 0)?;
        Ok(Self {
            encoder,
            write_size: write_size.max(1),
        })
    }
}

#[cfg(feature = "zstd")]
impl<R: Read> ChunkProducer for ZstdProducer<R> {
    fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut buffer = vec![0u8; self.write_size];
        loop {
            match self.encoder.read(&mut buffer) {
                Ok(0) => return Ok(None),
                Ok(n) => {
                    buffer.truncate(n);
                    return Ok(Some(buffer));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}
