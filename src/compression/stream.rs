// 定长读取适配器
//
// 压缩器产出的段长度与上传分片大小互不相关，
// ChunkBuffer 缓存尚未被取走的压缩数据，让调用方每次都能拿到恰好 n 字节

use std::io::{self, Read};

use super::producer::ChunkProducer;
#[cfg(feature = "zstd")]
use super::producer::ZstdProducer;
use super::{Compression, PartSource};

/// 分段缓冲区
pub struct ChunkBuffer<P: ChunkProducer> {
    producer: P,
    /// 已产出但尚未被读取的数据
    pending: Vec<u8>,
    /// 生产者是否已产出完毕
    exhausted: bool,
}

impl<P: ChunkProducer> ChunkBuffer<P> {
    pub fn new(producer: P) -> Self {
        Self {
            producer,
            pending: Vec::new(),
            exhausted: false,
        }
    }

    /// 当前缓存的字节数
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

impl<P: ChunkProducer> PartSource for ChunkBuffer<P> {
    fn read_part(&mut self, n: usize) -> io::Result<Option<Vec<u8>>> {
        if self.exhausted {
            return Ok(None);
        }

        while self.pending.len() < n {
            match self.producer.next_chunk()? {
                Some(chunk) => self.pending.extend_from_slice(&chunk),
                None => {
                    // 生产结束：剩余数据作为最后一个短分片返回
                    self.exhausted = true;
                    if self.pending.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(std::mem::take(&mut self.pending)));
                }
            }
        }

        let rest = self.pending.split_off(n);
        Ok(Some(std::mem::replace(&mut self.pending, rest)))
    }
}

enum Inner<R: Read> {
    Plain { reader: R, exhausted: bool },
    #[cfg(feature = "zstd")]
    Zstd(ChunkBuffer<ZstdProducer<R>>),
}

/// 流式压缩读取器
///
/// 不压缩时直接读取原始数据源；压缩时由 [`ChunkBuffer`] 缓冲压缩输出。
/// 读取器持有传入的数据源，传入 `&mut File` 时文件句柄仍由调用方关闭
pub struct StreamingCompressor<R: Read> {
    inner: Inner<R>,
    compression: Compression,
}

impl<R: Read> StreamingCompressor<R> {
    /// 创建读取器
    ///
    /// 选择的编解码器未编译进当前构建时返回 `Unsupported` 错误
    pub fn new(reader: R, compression: Compression) -> io::Result<Self> {
        let inner = match compression {
            Compression::Plain => Inner::Plain {
                reader,
                exhausted: false,
            },
            #[cfg(feature = "zstd")]
            Compression::Zstd => Inner::Zstd(ChunkBuffer::new(ZstdProducer::new(reader)?)),
            #[cfg(not(feature = "zstd"))]
            Compression::Zstd => {
                drop(reader);
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "当前构建未包含 zstd 编解码器",
                ));
            }
        };

        Ok(Self { inner, compression })
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }
}

impl<R: Read> PartSource for StreamingCompressor<R> {
    fn read_part(&mut self, n: usize) -> io::Result<Option<Vec<u8>>> {
        match &mut self.inner {
            Inner::Plain { reader, exhausted } => {
                if *exhausted {
                    return Ok(None);
                }

                let mut buffer = Vec::with_capacity(n);
                reader.by_ref().take(n as u64).read_to_end(&mut buffer)?;

                if buffer.is_empty() && n > 0 {
                    *exhausted = true;
                    return Ok(None);
                }
                if buffer.len() < n {
                    // 读到文件末尾，下一次直接返回结束
                    *exhausted = true;
                }
                Ok(Some(buffer))
            }
            #[cfg(feature = "zstd")]
            Inner::Zstd(buffer) => buffer.read_part(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::Cursor;

    /// 按预设长度产出数据的生产者
    struct FixedChunks {
        chunks: VecDeque<Vec<u8>>,
    }

    impl FixedChunks {
        fn new(sizes: &[usize]) -> Self {
            let mut next = 0u8;
            let chunks = sizes
                .iter()
                .map(|&size| {
                    (0..size)
                        .map(|_| {
                            next = next.wrapping_add(1);
                            next
                        })
                        .collect()
                })
                .collect();
            Self { chunks }
        }
    }

    impl ChunkProducer for FixedChunks {
        fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
            Ok(self.chunks.pop_front())
        }
    }

    fn drain<S: PartSource>(source: &mut S, n: usize) -> Vec<Vec<u8>> {
        let mut parts = Vec::new();
        while let Some(part) = source.read_part(n).unwrap() {
            parts.push(part);
        }
        parts
    }

    #[test]
    fn test_buffer_reads_exact_sizes_across_chunk_boundaries() {
        let mut buffer = ChunkBuffer::new(FixedChunks::new(&[3, 5, 4]));

        let parts = drain(&mut buffer, 5);
        let sizes: Vec<usize> = parts.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![5, 5, 2]);
        assert_eq!(parts.concat(), (1..=12).collect::<Vec<u8>>());

        assert!(buffer.is_exhausted());
        assert!(buffer.read_part(5).unwrap().is_none());
    }

    #[test]
    fn test_buffer_retains_remainder() {
        let mut buffer = ChunkBuffer::new(FixedChunks::new(&[10]));

        assert_eq!(buffer.read_part(4).unwrap().unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(buffer.pending_len(), 6);
        assert_eq!(buffer.read_part(4).unwrap().unwrap(), vec![5, 6, 7, 8]);
        assert_eq!(buffer.read_part(4).unwrap().unwrap(), vec![9, 10]);
        assert!(buffer.read_part(4).unwrap().is_none());
    }

    #[test]
    fn test_buffer_exact_multiple_ends_with_sentinel() {
        let mut buffer = ChunkBuffer::new(FixedChunks::new(&[4, 4]));

        assert_eq!(buffer.read_part(4).unwrap().unwrap().len(), 4);
        assert_eq!(buffer.read_part(4).unwrap().unwrap().len(), 4);
        // 没有剩余数据时不会产生空分片
        assert!(buffer.read_part(4).unwrap().is_none());
    }

    #[test]
    fn test_buffer_empty_producer() {
        let mut buffer = ChunkBuffer::new(FixedChunks::new(&[]));
        assert!(buffer.read_part(16).unwrap().is_none());
        assert!(buffer.is_exhausted());
    }

    #[test]
    fn test_plain_reads_exact_then_sentinel() {
        let data = vec![42u8; 100];
        let mut source = StreamingCompressor::new(Cursor::new(data.clone()), Compression::Plain).unwrap();

        assert_eq!(source.read_part(100).unwrap().unwrap(), data);
        assert!(source.read_part(100).unwrap().is_none());
    }

    #[test]
    fn test_plain_short_read_then_sentinel() {
        let data: Vec<u8> = (0..10).collect();
        let mut source = StreamingCompressor::new(Cursor::new(data), Compression::Plain).unwrap();

        assert_eq!(source.read_part(4).unwrap().unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(source.read_part(4).unwrap().unwrap(), vec![4, 5, 6, 7]);
        // 请求超过剩余长度只返回剩余部分
        assert_eq!(source.read_part(4).unwrap().unwrap(), vec![8, 9]);
        assert!(source.read_part(4).unwrap().is_none());
    }

    #[test]
    fn test_plain_empty_file() {
        let mut source =
            StreamingCompressor::new(Cursor::new(Vec::<u8>::new()), Compression::Plain).unwrap();
        assert!(source.read_part(1024).unwrap().is_none());
    }

    #[test]
    fn test_plain_borrowed_file_handle() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("borrowed.bin");
        std::fs::write(&path, b"hello glacier").unwrap();

        let mut file = std::fs::File::open(&path).unwrap();
        {
            let mut source = StreamingCompressor::new(&mut file, Compression::Plain).unwrap();
            assert_eq!(drain(&mut source, 5).concat(), b"hello glacier".to_vec());
        }
        // 句柄仍归调用方所有
        assert!(file.metadata().is_ok());
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn test_zstd_round_trip_for_various_read_sizes() {
        let data: Vec<u8> = (0..300_000u32)
            .flat_map(|i| (i % 977).to_le_bytes())
            .collect();

        let natural = ZstdProducer::<Cursor<Vec<u8>>>::DEFAULT_WRITE_SIZE;
        for n in [100, natural, natural * 10] {
            let mut source =
                StreamingCompressor::new(Cursor::new(data.clone()), Compression::Zstd).unwrap();
            let parts = drain(&mut source, n);

            // 除最后一个分片外都是恰好 n 字节
            for part in &parts[..parts.len() - 1] {
                assert_eq!(part.len(), n);
            }
            let restored = zstd::stream::decode_all(Cursor::new(parts.concat())).unwrap();
            assert_eq!(restored, data, "n={}", n);
        }
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn test_zstd_empty_input_produces_single_part() {
        let mut source =
            StreamingCompressor::new(Cursor::new(Vec::<u8>::new()), Compression::Zstd).unwrap();
        let parts = drain(&mut source, 1024 * 1024);
        assert_eq!(parts.len(), 1);
        assert!(zstd::stream::decode_all(Cursor::new(parts.concat()))
            .unwrap()
            .is_empty());
    }
}
