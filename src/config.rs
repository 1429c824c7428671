use crate::{IngestError, IngestResult};

/// Header keywords recognised in cycler exports (matched case-insensitively).
pub const DEFAULT_HEADER_KEYWORDS: [&str; 6] =
    ["cycle", "voltage", "current", "capacity", "time", "step"];

/// Per-operation settings. Every ingestion takes its own copy, so two
/// operations running side by side never share thresholds.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Rows per emitted chunk.
    pub chunk_capacity: usize,
    /// Sources strictly larger than this (in bytes) take the streaming path.
    pub streaming_cutover: u64,
    /// Emit a progress record every N lines.
    pub progress_cadence: u64,
    /// Lowercase substrings that mark a line as the header row.
    pub header_keywords: Vec<String>,
    pub delimiter: u8,
    pub quote: u8,
    pub line_terminator: u8,
    /// Soft ceiling on the estimated size of rows held before a chunk is flushed.
    pub max_buffered_bytes: usize,
    /// Bytes requested from the source per read.
    pub read_buffer_size: usize,
    /// How many offending line numbers a mismatch warning keeps.
    pub mismatch_sample_limit: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_capacity: 10_000,
            streaming_cutover: 50 * 1024 * 1024, // 50 MiB
            progress_cadence: 1_000,
            header_keywords: DEFAULT_HEADER_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            delimiter: b',',
            quote: b'"',
            line_terminator: b'\n',
            max_buffered_bytes: 64 * 1024 * 1024,
            read_buffer_size: 64 * 1024,
            mismatch_sample_limit: 10,
        }
    }
}

impl IngestConfig {
    pub fn with_chunk_capacity(mut self, rows: usize) -> Self {
        self.chunk_capacity = rows;
        self
    }

    pub fn with_streaming_cutover(mut self, bytes: u64) -> Self {
        self.streaming_cutover = bytes;
        self
    }

    pub fn with_progress_cadence(mut self, lines: u64) -> Self {
        self.progress_cadence = lines;
        self
    }

    pub fn with_header_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.header_keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().to_lowercase())
            .collect();
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_quote(mut self, quote: u8) -> Self {
        self.quote = quote;
        self
    }

    pub fn with_line_terminator(mut self, terminator: u8) -> Self {
        self.line_terminator = terminator;
        self
    }

    pub fn with_max_buffered_bytes(mut self, bytes: usize) -> Self {
        self.max_buffered_bytes = bytes;
        self
    }

    pub fn with_read_buffer_size(mut self, bytes: usize) -> Self {
        self.read_buffer_size = bytes;
        self
    }

    pub fn with_mismatch_sample_limit(mut self, limit: usize) -> Self {
        self.mismatch_sample_limit = limit;
        self
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> IngestResult<()> {
        let invalid = |msg: &str| Err(IngestError::InvalidConfig(msg.to_string()));

        if self.chunk_capacity == 0 {
            return invalid("chunk_capacity must be at least 1");
        }
        if self.progress_cadence == 0 {
            return invalid("progress_cadence must be at least 1");
        }
        if self.read_buffer_size == 0 {
            return invalid("read_buffer_size must be at least 1");
        }
        for (name, b) in [
            ("delimiter", self.delimiter),
            ("quote", self.quote),
            ("line_terminator", self.line_terminator),
        ] {
            if !b.is_ascii() {
                return Err(IngestError::InvalidConfig(format!(
                    "{name} must be an ASCII byte, got 0x{b:02x}"
                )));
            }
        }
        if self.delimiter == self.quote {
            return invalid("delimiter and quote must differ");
        }
        if self.line_terminator == self.delimiter || self.line_terminator == self.quote {
            return invalid("line_terminator must differ from delimiter and quote");
        }
        if self.header_keywords.iter().all(|k| k.trim().is_empty()) {
            return invalid("header_keywords must contain at least one keyword");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = IngestConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.chunk_capacity, 10_000);
        assert_eq!(cfg.streaming_cutover, 52_428_800);
        assert_eq!(cfg.progress_cadence, 1_000);
        assert_eq!(cfg.header_keywords.len(), 6);
    }

    #[test]
    fn rejects_zero_capacity_and_clashing_bytes() {
        assert!(matches!(
            IngestConfig::default().with_chunk_capacity(0).validate(),
            Err(IngestError::InvalidConfig(_))
        ));
        assert!(IngestConfig::default()
            .with_quote(b',')
            .validate()
            .is_err());
        assert!(IngestConfig::default()
            .with_delimiter(0xe9)
            .validate()
            .is_err());
        assert!(IngestConfig::default()
            .with_header_keywords(Vec::<String>::new())
            .validate()
            .is_err());
    }

    #[test]
    fn keywords_are_lowercased() {
        let cfg = IngestConfig::default().with_header_keywords(["Temp", "SOC"]);
        assert_eq!(cfg.header_keywords, vec!["temp", "soc"]);
    }
}
