use cycler_ingest::{
    CollectingObserver, IngestConfig, IngestPath, IngestSource, StreamingParser,
};
use std::{fs::File, io::Write, path::PathBuf, process::Command};

#[tokio::test]
async fn streams_gzip_export_into_bounded_chunks() -> anyhow::Result<()> {
    // Create a small cycler export
    let dir = tempfile::tempdir()?;
    let csv_path = dir.path().join("cell_07.csv");
    let mut f = File::create(&csv_path)?;
    writeln!(f, "Cycle,Step,Time(s),Voltage(V),Current(A)")?;
    for i in 0..100_000 {
        writeln!(f, "{},{},{i},{:.3},1.500", i / 400 + 1, (i / 100) % 4 + 1, 3.0 + (i % 100) as f64 * 0.012)?;
    }
    drop(f);

    // gzip it (use system gzip for speed)
    let gz_path: PathBuf = dir.path().join("cell_07.csv.gz");
    let status = Command::new("bash")
        .arg("-lc")
        .arg(format!(
            "gzip -c {} > {}",
            csv_path.display(),
            gz_path.display()
        ))
        .status()?;
    assert!(status.success());

    // Force the streaming path regardless of size
    let config = IngestConfig::default().with_streaming_cutover(0);
    let parser = StreamingParser::new(config)?;
    let source = IngestSource::from_path(&gz_path).await?;
    let compressed_size = source.total_size();

    let mut observer = CollectingObserver::default();
    let result = parser.ingest(source, &mut observer).await?;

    assert_eq!(result.metadata.path, IngestPath::Streaming);
    assert_eq!(result.metadata.rows_emitted, 100_000);
    assert_eq!(result.metadata.chunk_count, 10);
    assert!(observer.chunks.iter().all(|c| c.len() == 10_000));
    assert_eq!(
        result.metadata.headers,
        vec!["Cycle", "Step", "Time(s)", "Voltage(V)", "Current(A)"]
    );
    assert!(result.processed_data.is_empty());
    assert!(result.warnings.is_empty());

    // progress is measured against the compressed file
    assert_eq!(result.progress.total_size, compressed_size);
    assert_eq!(result.progress.processed_size, compressed_size);
    assert_eq!(observer.progress.last(), Some(&result.progress));
    Ok(())
}

#[tokio::test]
async fn small_plain_file_takes_whole_file_path() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("short.csv");
    std::fs::write(&path, "Cycle,Voltage(V)\n1,3.70\n2,3.71\n")?;

    let parser = StreamingParser::new(IngestConfig::default())?;
    let mut observer = CollectingObserver::default();
    let result = parser
        .ingest(IngestSource::from_path(&path).await?, &mut observer)
        .await?;

    assert_eq!(result.metadata.path, IngestPath::WholeFile);
    assert_eq!(result.processed_data.len(), 2);
    assert_eq!(result.processed_data[1].get("Voltage(V)"), Some("3.71"));
    assert_eq!(result.metadata.equipment, "Unknown");
    assert!(observer.chunks.is_empty());
    assert_eq!(observer.progress.len(), 1);
    assert_eq!(observer.progress[0].percentage, 100.0);
    Ok(())
}
