use crate::IngestResult;
use async_compression::tokio::bufread::{GzipDecoder, ZstdDecoder};
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::{AsyncRead, BufReader, ReadBuf};

#[derive(Debug, Clone)]
pub struct SourceMeta {
    /// e.g. "application/gzip" or "text/csv"
    pub content_type: String,
    /// e.g. "gzip", "zstd", or empty
    pub content_encoding: String,
    /// just the key/filename (used for extension fallback)
    pub name_hint: String,
    /// Character encoding of the export, fixed for the whole operation (defaults to UTF-8)
    pub charset: &'static encoding_rs::Encoding,
}

impl Default for SourceMeta {
    fn default() -> Self {
        Self {
            content_type: String::new(),
            content_encoding: String::new(),
            name_hint: String::new(),
            charset: encoding_rs::UTF_8,
        }
    }
}

impl SourceMeta {
    fn is_gzip(&self) -> bool {
        let ce = self.content_encoding.to_ascii_lowercase();
        let ct = self.content_type.to_ascii_lowercase();
        ce.split(',').any(|s| s.trim() == "gzip")
            || matches!(ct.as_str(), "application/gzip" | "application/x-gzip")
            || self.name_hint.ends_with(".gz")
    }

    fn is_zstd(&self) -> bool {
        let ce = self.content_encoding.to_ascii_lowercase();
        let ct = self.content_type.to_ascii_lowercase();
        ce.split(',').any(|s| s.trim() == "zstd")
            || ct == "application/zstd"
            || self.name_hint.ends_with(".zst")
    }
}

/// Shared count of raw bytes pulled from a source, before decompression.
#[derive(Debug, Clone, Default)]
pub struct ByteCounter(Arc<AtomicU64>);

impl ByteCounter {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }
}

struct CountingReader<R> {
    inner: R,
    counter: ByteCounter,
}

impl<R: AsyncRead + Unpin> AsyncRead for CountingReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            self.counter.add((buf.filled().len() - before) as u64);
        }
        poll
    }
}

/// A byte source with a size known up front.
///
/// `total_size` and [`IngestSource::consumed`] are both measured on the raw
/// bytes, so progress on a compressed export tracks the compressed file.
pub struct IngestSource {
    pub(crate) reader: Box<dyn AsyncRead + Unpin + Send>,
    pub(crate) total_size: u64,
    pub(crate) meta: SourceMeta,
    pub(crate) consumed: ByteCounter,
}

impl IngestSource {
    /// Wrap a raw reader with byte counting and optional gzip/zstd decompression.
    pub fn new<R>(raw: R, total_size: u64, meta: SourceMeta) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let consumed = ByteCounter::default();
        let counting = CountingReader {
            inner: raw,
            counter: consumed.clone(),
        };

        // Decoders need a buffered reader; plain sources are read as-is so the
        // pipeline never pulls more than one read ahead.
        let reader: Box<dyn AsyncRead + Unpin + Send> = if meta.is_gzip() {
            Box::new(GzipDecoder::new(BufReader::with_capacity(1 << 20, counting)))
        } else if meta.is_zstd() {
            Box::new(ZstdDecoder::new(BufReader::with_capacity(1 << 20, counting)))
        } else {
            Box::new(counting)
        };

        Self {
            reader,
            total_size,
            meta,
            consumed,
        }
    }

    /// In-memory source; `total_size` is the buffer length.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>, meta: SourceMeta) -> Self {
        let bytes = bytes.into();
        let len = bytes.len() as u64;
        Self::new(io::Cursor::new(bytes), len, meta)
    }

    /// Open a local export; meta is derived from the file extension only.
    pub async fn from_path(path: &Path) -> IngestResult<Self> {
        let file = File::open(path).await?;
        let total_size = file.metadata().await?.len();
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        let mut meta = SourceMeta {
            name_hint: name,
            ..Default::default()
        };

        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        match ext {
            "gz" => {
                meta.content_type = "application/gzip".into();
                meta.content_encoding = "gzip".into();
            }
            "zst" => {
                meta.content_type = "application/zstd".into();
                meta.content_encoding = "zstd".into();
            }
            _ => {
                meta.content_type = "text/csv".into();
            }
        }

        Ok(Self::new(file, total_size, meta))
    }

    /// Override the charset chosen at construction.
    pub fn with_charset(mut self, charset: &'static encoding_rs::Encoding) -> Self {
        self.meta.charset = charset;
        self
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn meta(&self) -> &SourceMeta {
        &self.meta
    }

    /// Handle to the raw byte count; stays valid after the source is consumed.
    pub fn consumed(&self) -> ByteCounter {
        self.consumed.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn counts_raw_bytes_as_they_are_read() {
        let mut source = IngestSource::from_bytes(b"Cycle,Voltage\n1,3.7\n".to_vec(), SourceMeta::default());
        let counter = source.consumed();
        assert_eq!(counter.get(), 0);

        let mut out = String::new();
        source.reader.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "Cycle,Voltage\n1,3.7\n");
        assert_eq!(counter.get(), source.total_size());
    }

    #[test]
    fn detects_compression_from_meta() {
        let meta = SourceMeta {
            content_encoding: "identity, GZIP".into(),
            ..Default::default()
        };
        assert!(meta.is_gzip());
        let meta = SourceMeta {
            name_hint: "run42.csv.zst".into(),
            ..Default::default()
        };
        assert!(meta.is_zstd());
        assert!(!SourceMeta::default().is_gzip());
    }
}
