use std::fmt;

/// A recoverable anomaly. Never aborts an operation.
///
/// On the final result, per-event warnings ([`IngestWarning::EarlyFlush`])
/// come first in the order they happened, followed by the end-of-stream
/// tallies: skipped preamble, then format mismatches (or the missing header).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestWarning {
    /// Data lines whose field count differed from the header were dropped.
    FormatMismatch {
        expected: usize,
        dropped: u64,
        /// 1-based line numbers of the first offending lines.
        sample_lines: Vec<u64>,
    },
    /// No line matched the header keywords; no rows were built.
    NoHeaderDetected { lines_scanned: u64 },
    /// Non-empty lines before the header were skipped.
    PreambleSkipped { lines: u64 },
    /// A chunk was emitted under capacity because buffered rows exceeded the memory ceiling.
    EarlyFlush {
        chunk_index: usize,
        rows: usize,
        estimated_bytes: usize,
    },
}

impl fmt::Display for IngestWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestWarning::FormatMismatch {
                expected,
                dropped,
                sample_lines,
            } => {
                let lines: Vec<String> = sample_lines.iter().map(|l| l.to_string()).collect();
                write!(
                    f,
                    "dropped {dropped} row(s) whose field count differs from the {expected} header column(s); first at line(s) {}",
                    lines.join(", ")
                )
            }
            IngestWarning::NoHeaderDetected { lines_scanned } => write!(
                f,
                "no header row detected in {lines_scanned} line(s); no rows were produced"
            ),
            IngestWarning::PreambleSkipped { lines } => {
                write!(f, "skipped {lines} line(s) before the header row")
            }
            IngestWarning::EarlyFlush {
                chunk_index,
                rows,
                estimated_bytes,
            } => write!(
                f,
                "chunk {chunk_index} flushed early with {rows} row(s): ~{estimated_bytes} bytes buffered exceeded the memory ceiling"
            ),
        }
    }
}
