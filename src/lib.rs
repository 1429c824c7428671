//! Streaming ingestion of battery cycler CSV exports.
//!
//! - Streaming path: sources above the configured cutover are read one buffer at a
//!   time, reassembled into lines, tokenized and emitted as fixed-capacity chunks.
//! - Whole-file path: smaller sources are handed to a [`WholeFileParser`] in one go.
//!
//! Both paths produce the same rows for the same content. Local files may be
//! gzip or zstd compressed.
//!
//! Data shape:
//! - [`ParsedRow`]: ordered `column -> raw string` mapping (no numeric typing)
//! - [`DataChunk`]: up to `chunk_capacity` rows with a contiguous `[start, end)` range
//! - [`StreamingResult`]: final metadata, progress and warnings of one operation
#![cfg_attr(docsrs, feature(doc_cfg))]
//
mod batch;
mod chunk;
mod codec;
mod config;
mod io;
mod lines;
mod progress;
mod rows;
mod stream;
mod tokenize;
mod virtual_data;
mod warning;
mod whole_file;

pub use crate::batch::BatchProcessor;
pub use crate::chunk::{ChunkAssembler, DataChunk};
pub use crate::codec::{TextDecoder, Transcoder};
pub use crate::config::{IngestConfig, DEFAULT_HEADER_KEYWORDS};
pub use crate::io::{ByteCounter, IngestSource, SourceMeta};
pub use crate::lines::LineReassembler;
pub use crate::progress::{ProcessingProgress, ProgressEstimator};
pub use crate::rows::{HeaderDetector, LineOutcome, ParsedRow, RowAssembler};
pub use crate::stream::{
    CollectingObserver, IngestMetadata, IngestObserver, IngestPath, StreamingParser,
    StreamingResult,
};
pub use crate::tokenize::Tokenizer;
pub use crate::virtual_data::VirtualDataProvider;
pub use crate::warning::IngestWarning;
pub use crate::whole_file::{CsvWholeFileParser, ParsedFile, WholeFileParser};

use thiserror::Error;

/// Error type returned by this crate.
///
/// Only unrecoverable conditions live here. Malformed rows and a missing
/// header are reported as [`IngestWarning`]s on the result instead.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed reading source: {0}")]
    SourceRead(#[source] std::io::Error),
    #[error("malformed {encoding} input near byte {offset}")]
    Decode {
        encoding: &'static str,
        offset: u64,
    },
    #[error("ingestion cancelled")]
    Cancelled,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type IngestResult<T> = std::result::Result<T, IngestError>;
