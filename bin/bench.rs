use clap::{Arg, ArgAction, Command};
use crc32fast::Hasher as Crc32;
use cycler_ingest::{
    DataChunk, IngestConfig, IngestObserver, IngestSource, ParsedRow, ProcessingProgress,
    StreamingParser, StreamingResult,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Counts rows and folds them into a CRC32 without keeping them.
#[derive(Default)]
struct Digest {
    rows: u64,
    chunks: usize,
    crc: Crc32,
    last_percent: f64,
}

impl Digest {
    fn update(&mut self, row: &ParsedRow) {
        for (fi, field) in row.values().iter().enumerate() {
            if fi > 0 {
                self.crc.update(&[0x1f]);
            }
            self.crc.update(field.as_bytes());
        }
        self.crc.update(&[0x1e]);
        self.rows += 1;
    }
}

impl IngestObserver for Digest {
    fn on_chunk(&mut self, chunk: DataChunk) {
        self.chunks += 1;
        for row in &chunk.data {
            self.update(row);
        }
    }

    fn on_progress(&mut self, progress: &ProcessingProgress) {
        if progress.percentage - self.last_percent >= 10.0 || progress.percentage >= 100.0 {
            self.last_percent = progress.percentage;
            eprintln!(
                "{:5.1}%  chunk {}/{}  eta {:.1}s",
                progress.percentage,
                progress.current_chunk,
                progress.total_chunks,
                progress.estimated_time_remaining.as_secs_f64()
            );
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let matches = Command::new("bench")
        .arg(Arg::new("path").long("path").value_parser(clap::value_parser!(PathBuf)).required(true))
        .arg(Arg::new("chunk-capacity").long("chunk-capacity").value_parser(clap::value_parser!(usize)))
        .arg(Arg::new("cutover").long("cutover").help("Streaming cutover in bytes").value_parser(clap::value_parser!(u64)))
        .arg(Arg::new("encoding").long("encoding").help("Charset label, e.g. windows-1252 (default UTF-8)"))
        .arg(Arg::new("stream").long("stream").help("Force the streaming path").action(ArgAction::SetTrue))
        .arg(Arg::new("verify").long("verify").help("Run both paths and compare CRC32 over all rows").action(ArgAction::SetTrue))
        .get_matches();

    let path = matches.get_one::<PathBuf>("path").unwrap();
    let mut config = IngestConfig::default();
    if let Some(&rows) = matches.get_one::<usize>("chunk-capacity") {
        config = config.with_chunk_capacity(rows);
    }
    if let Some(&bytes) = matches.get_one::<u64>("cutover") {
        config = config.with_streaming_cutover(bytes);
    }
    let charset = match matches.get_one::<String>("encoding") {
        Some(label) => encoding_rs::Encoding::for_label(label.as_bytes())
            .ok_or_else(|| anyhow::anyhow!("unknown encoding label '{label}'"))?,
        None => encoding_rs::UTF_8,
    };
    let parser = StreamingParser::new(config)?;

    if matches.get_flag("verify") {
        let (streamed, _) = run(&parser, path, charset, Mode::Streaming).await?;
        let (whole, _) = run(&parser, path, charset, Mode::WholeFile).await?;
        let (s, w) = (streamed.crc.finalize(), whole.crc.finalize());
        println!(
            "streaming rows={} chunks={} crc=0x{s:08x}\nwhole-file rows={} crc=0x{w:08x}",
            streamed.rows, streamed.chunks, whole.rows
        );
        if s != w || streamed.rows != whole.rows {
            anyhow::bail!("streaming and whole-file paths disagree");
        }
        return Ok(());
    }

    let mode = if matches.get_flag("stream") {
        Mode::Streaming
    } else {
        Mode::Auto
    };
    let start = Instant::now();
    let (digest, result) = run(&parser, path, charset, mode).await?;
    let elapsed = start.elapsed().as_secs_f64();
    let rps = (digest.rows as f64) / elapsed;

    println!(
        "source={} path={:?} rows={} dropped={} chunks={} (delivered {}) headers={:?}\nelapsed={:.1}s rows/sec={:.0}",
        path.display(),
        result.metadata.path,
        digest.rows,
        result.metadata.rows_dropped,
        result.metadata.chunk_count,
        digest.chunks,
        result.metadata.headers,
        elapsed,
        rps
    );
    for warning in &result.warnings {
        println!("warning: {warning}");
    }
    Ok(())
}

#[derive(Clone, Copy)]
enum Mode {
    Auto,
    Streaming,
    WholeFile,
}

async fn run(
    parser: &StreamingParser,
    path: &Path,
    charset: &'static encoding_rs::Encoding,
    mode: Mode,
) -> anyhow::Result<(Digest, StreamingResult)> {
    let source = IngestSource::from_path(path).await?.with_charset(charset);
    let mut digest = Digest::default();
    let cancel = CancellationToken::new();
    let result = match mode {
        Mode::Auto => parser.ingest(source, &mut digest).await?,
        Mode::Streaming => parser.ingest_streaming(source, &mut digest, &cancel).await?,
        Mode::WholeFile => parser.ingest_whole_file(source, &mut digest, &cancel).await?,
    };
    for row in &result.processed_data {
        digest.update(row);
    }
    Ok((digest, result))
}
