use crate::chunk::{ChunkAssembler, DataChunk};
use crate::codec::Transcoder;
use crate::config::IngestConfig;
use crate::io::IngestSource;
use crate::lines::LineReassembler;
use crate::progress::{ProcessingProgress, ProgressEstimator};
use crate::rows::{HeaderDetector, LineOutcome, ParsedRow, RowAssembler};
use crate::tokenize::Tokenizer;
use crate::warning::IngestWarning;
use crate::whole_file::{CsvWholeFileParser, WholeFileParser};
use crate::{IngestError, IngestResult};
use futures::StreamExt;
use std::time::{Duration, Instant};
use tokio_util::codec::FramedRead;
use tokio_util::io::{ReaderStream, StreamReader};
use tokio_util::sync::CancellationToken;

const UNKNOWN: &str = "Unknown";

/// Receives the output of an operation, synchronously and in stream order.
pub trait IngestObserver {
    /// Called once per chunk, in ascending `index` order.
    fn on_chunk(&mut self, chunk: DataChunk);

    fn on_progress(&mut self, _progress: &ProcessingProgress) {}
}

impl<F> IngestObserver for F
where
    F: FnMut(DataChunk),
{
    fn on_chunk(&mut self, chunk: DataChunk) {
        self(chunk)
    }
}

/// Keeps every chunk and progress record it is handed.
#[derive(Debug, Default)]
pub struct CollectingObserver {
    pub chunks: Vec<DataChunk>,
    pub progress: Vec<ProcessingProgress>,
}

impl CollectingObserver {
    pub fn rows(&self) -> impl Iterator<Item = &ParsedRow> {
        self.chunks.iter().flat_map(|c| c.data.iter())
    }

    pub fn into_rows(self) -> Vec<ParsedRow> {
        self.chunks.into_iter().flat_map(|c| c.data).collect()
    }
}

impl IngestObserver for CollectingObserver {
    fn on_chunk(&mut self, chunk: DataChunk) {
        self.chunks.push(chunk);
    }

    fn on_progress(&mut self, progress: &ProcessingProgress) {
        self.progress.push(progress.clone());
    }
}

/// Which path an operation took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestPath {
    Streaming,
    WholeFile,
}

#[derive(Debug, Clone)]
pub struct IngestMetadata {
    pub path: IngestPath,
    pub name_hint: String,
    /// "Unknown" unless the whole-file parser inferred it.
    pub equipment: String,
    /// "Unknown" unless the whole-file parser inferred it.
    pub chemistry: String,
    pub headers: Vec<String>,
    pub total_lines: u64,
    pub rows_emitted: u64,
    pub rows_dropped: u64,
    pub file_size: u64,
    pub chunk_count: usize,
    pub elapsed: Duration,
}

/// Terminal value of one operation.
#[derive(Debug)]
pub struct StreamingResult {
    /// Rows from the whole-file path. Empty on the streaming path, whose rows
    /// were already handed over chunk by chunk.
    pub processed_data: Vec<ParsedRow>,
    pub metadata: IngestMetadata,
    pub progress: ProcessingProgress,
    pub warnings: Vec<IngestWarning>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitingHeader,
    AccumulatingRows,
    Finalizing,
    Done,
}

/// Per-operation state of the streaming path. Never shared between operations.
struct Pipeline {
    tokenizer: Tokenizer,
    rows: RowAssembler,
    chunks: ChunkAssembler,
    progress: ProgressEstimator,
    phase: Phase,
    line_no: u64,
}

impl Pipeline {
    fn new(config: &IngestConfig, total_size: u64) -> Self {
        Self {
            tokenizer: Tokenizer::new(config.delimiter, config.quote),
            rows: RowAssembler::new(
                HeaderDetector::new(&config.header_keywords),
                config.mismatch_sample_limit,
            ),
            chunks: ChunkAssembler::new(config.chunk_capacity, config.max_buffered_bytes),
            progress: ProgressEstimator::new(
                total_size,
                config.progress_cadence,
                config.chunk_capacity,
            ),
            phase: Phase::AwaitingHeader,
            line_no: 0,
        }
    }

    fn enter(&mut self, phase: Phase) {
        tracing::debug!(from = ?self.phase, to = ?phase, line = self.line_no, "phase change");
        self.phase = phase;
    }

    fn handle_line<O>(&mut self, line: &str, observer: &mut O)
    where
        O: IngestObserver + ?Sized,
    {
        self.line_no += 1;
        let fields = self.tokenizer.tokenize(line);
        match self.rows.accept(self.line_no, fields) {
            LineOutcome::Header => self.enter(Phase::AccumulatingRows),
            LineOutcome::Row(row) => {
                if let Some(chunk) = self.chunks.push(row) {
                    observer.on_chunk(chunk);
                }
            }
            LineOutcome::Empty | LineOutcome::Preamble | LineOutcome::Dropped { .. } => {}
        }

        if let Some(progress) = self
            .progress
            .on_line(self.rows.rows_built(), self.chunks.chunks_emitted())
        {
            tracing::trace!(percentage = progress.percentage, "progress");
            observer.on_progress(&progress);
        }
    }
}

/// Entry point: picks the streaming or whole-file path by source size.
///
/// Each call builds its own pipeline state and watches its own cancellation
/// token, so one parser may serve several sources concurrently and stays
/// usable after any of them is cancelled.
pub struct StreamingParser<P = CsvWholeFileParser> {
    config: IngestConfig,
    whole_file: P,
}

impl StreamingParser<CsvWholeFileParser> {
    pub fn new(config: IngestConfig) -> IngestResult<Self> {
        Self::with_whole_file_parser(config, CsvWholeFileParser)
    }
}

impl<P: WholeFileParser> StreamingParser<P> {
    pub fn with_whole_file_parser(config: IngestConfig, whole_file: P) -> IngestResult<Self> {
        config.validate()?;
        Ok(Self { config, whole_file })
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Ingest `source`, streaming it when it is larger than the cutover.
    pub async fn ingest<O>(
        &self,
        source: IngestSource,
        observer: &mut O,
    ) -> IngestResult<StreamingResult>
    where
        O: IngestObserver + ?Sized,
    {
        self.ingest_with_cancellation(source, observer, &CancellationToken::new())
            .await
    }

    /// Like [`StreamingParser::ingest`], stopping with [`IngestError::Cancelled`]
    /// once `cancel` fires. Only this operation is affected.
    pub async fn ingest_with_cancellation<O>(
        &self,
        source: IngestSource,
        observer: &mut O,
        cancel: &CancellationToken,
    ) -> IngestResult<StreamingResult>
    where
        O: IngestObserver + ?Sized,
    {
        if source.total_size() > self.config.streaming_cutover {
            self.ingest_streaming(source, observer, cancel).await
        } else {
            self.ingest_whole_file(source, observer, cancel).await
        }
    }

    /// Incremental path regardless of size.
    ///
    /// Reads one buffer at a time and fully processes it before asking for the
    /// next. Chunks delivered before an error or cancellation stay delivered.
    pub async fn ingest_streaming<O>(
        &self,
        source: IngestSource,
        observer: &mut O,
        cancel: &CancellationToken,
    ) -> IngestResult<StreamingResult>
    where
        O: IngestObserver + ?Sized,
    {
        let result = self.run_streaming(source, observer, cancel).await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, "streaming ingestion failed");
        }
        result
    }

    async fn run_streaming<O>(
        &self,
        source: IngestSource,
        observer: &mut O,
        cancel: &CancellationToken,
    ) -> IngestResult<StreamingResult>
    where
        O: IngestObserver + ?Sized,
    {
        let started = Instant::now();
        let consumed = source.consumed();
        let IngestSource {
            reader,
            total_size,
            meta,
            ..
        } = source;

        tracing::info!(
            source = %meta.name_hint,
            total_size,
            charset = meta.charset.name(),
            chunk_capacity = self.config.chunk_capacity,
            "streaming ingestion started"
        );

        let mut pipeline = Pipeline::new(&self.config, total_size);
        let mut lines = LineReassembler::new(meta.charset, self.config.line_terminator);
        let mut reads = ReaderStream::with_capacity(reader, self.config.read_buffer_size);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(
                        chunks = pipeline.chunks.chunks_emitted(),
                        line = pipeline.line_no,
                        "streaming ingestion cancelled"
                    );
                    return Err(IngestError::Cancelled);
                }
                next = reads.next() => next,
            };
            let Some(bytes) = next else {
                break;
            };
            let bytes = bytes.map_err(IngestError::SourceRead)?;

            pipeline.progress.record_bytes(consumed.get());
            for line in lines.push(&bytes)? {
                pipeline.handle_line(&line, observer);
            }
        }

        for line in lines.finish()? {
            pipeline.handle_line(&line, observer);
        }

        pipeline.enter(Phase::Finalizing);
        if let Some(chunk) = pipeline.chunks.finish() {
            observer.on_chunk(chunk);
        }

        // early flushes as they happened, then the end-of-stream tallies
        let mut warnings = pipeline.chunks.take_warnings();
        warnings.extend(pipeline.rows.warnings());
        for warning in &warnings {
            tracing::warn!(%warning, "recoverable ingestion anomaly");
        }

        let chunk_count = pipeline.chunks.chunks_emitted();
        let progress = pipeline.progress.finish(chunk_count);
        observer.on_progress(&progress);

        let metadata = IngestMetadata {
            path: IngestPath::Streaming,
            name_hint: meta.name_hint,
            equipment: UNKNOWN.to_string(),
            chemistry: UNKNOWN.to_string(),
            headers: pipeline.rows.headers(),
            total_lines: pipeline.line_no,
            rows_emitted: pipeline.chunks.rows_emitted(),
            rows_dropped: pipeline.rows.rows_dropped(),
            file_size: total_size,
            chunk_count,
            elapsed: started.elapsed(),
        };
        pipeline.enter(Phase::Done);

        tracing::info!(
            rows = metadata.rows_emitted,
            dropped = metadata.rows_dropped,
            chunks = chunk_count,
            lines = metadata.total_lines,
            elapsed_ms = metadata.elapsed.as_millis() as u64,
            "streaming ingestion finished"
        );

        Ok(StreamingResult {
            processed_data: Vec::new(),
            metadata,
            progress,
            warnings,
        })
    }

    /// One-pass path regardless of size: the whole source goes to the
    /// [`WholeFileParser`] and a single completed progress record is reported.
    pub async fn ingest_whole_file<O>(
        &self,
        source: IngestSource,
        observer: &mut O,
        cancel: &CancellationToken,
    ) -> IngestResult<StreamingResult>
    where
        O: IngestObserver + ?Sized,
    {
        let started = Instant::now();
        let IngestSource {
            reader,
            total_size,
            meta,
            ..
        } = source;

        tracing::debug!(source = %meta.name_hint, total_size, "whole-file ingestion started");

        let utf8 = StreamReader::new(FramedRead::new(reader, Transcoder::new(meta.charset)));
        let parsed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(IngestError::Cancelled),
            parsed = self.whole_file.parse(Box::new(utf8), &self.config) => parsed?,
        };

        for warning in &parsed.warnings {
            tracing::warn!(%warning, "recoverable ingestion anomaly");
        }

        let chunk_count = usize::from(!parsed.rows.is_empty());
        let progress = ProcessingProgress::complete(total_size, chunk_count);
        observer.on_progress(&progress);

        let metadata = IngestMetadata {
            path: IngestPath::WholeFile,
            name_hint: meta.name_hint,
            equipment: parsed.equipment.unwrap_or_else(|| UNKNOWN.to_string()),
            chemistry: parsed.chemistry.unwrap_or_else(|| UNKNOWN.to_string()),
            headers: parsed.headers,
            total_lines: parsed.total_lines,
            rows_emitted: parsed.rows.len() as u64,
            rows_dropped: parsed.rows_dropped,
            file_size: total_size,
            chunk_count,
            elapsed: started.elapsed(),
        };

        tracing::debug!(rows = metadata.rows_emitted, "whole-file ingestion finished");

        Ok(StreamingResult {
            processed_data: parsed.rows,
            metadata,
            progress,
            warnings: parsed.warnings,
        })
    }
}
