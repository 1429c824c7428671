use crate::warning::IngestWarning;
use std::fmt;
use std::sync::Arc;

/// Case-insensitive keyword test that classifies a line as the header row.
#[derive(Debug, Clone)]
pub struct HeaderDetector {
    keywords: Vec<String>,
}

impl HeaderDetector {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn is_header(&self, fields: &[String]) -> bool {
        fields.iter().any(|field| {
            let field = field.to_lowercase();
            self.keywords.iter().any(|k| field.contains(k.as_str()))
        })
    }
}

/// One data line keyed by the header's column names, in header order.
///
/// Values are the raw trimmed strings; typing is left to downstream stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRow {
    columns: Arc<[String]>,
    values: Vec<String>,
}

impl ParsedRow {
    /// `values` must have one entry per column.
    pub(crate) fn new(columns: Arc<[String]>, values: Vec<String>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Value of the first column named `column`.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| self.values[idx].as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn into_values(self) -> Vec<String> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Rough heap + inline footprint. Column names are shared and not counted.
    pub fn estimated_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self
                .values
                .iter()
                .map(|v| std::mem::size_of::<String>() + v.capacity())
                .sum::<usize>()
    }
}

impl fmt::Display for ParsedRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (column, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{column}={value}")?;
        }
        Ok(())
    }
}

/// What became of one line.
#[derive(Debug)]
pub enum LineOutcome {
    /// Blank line.
    Empty,
    /// Non-empty line before any header was found.
    Preamble,
    /// The line was captured as the header.
    Header,
    Row(ParsedRow),
    /// Field count did not match the header.
    Dropped { found: usize },
}

/// Header capture and row building shared by both ingestion paths.
///
/// The header is write-once: the first non-empty line that passes the
/// [`HeaderDetector`] becomes the column list and is never treated as data.
#[derive(Debug)]
pub struct RowAssembler {
    detector: HeaderDetector,
    columns: Option<Arc<[String]>>,
    non_empty_lines: u64,
    preamble_lines: u64,
    rows_built: u64,
    rows_dropped: u64,
    mismatch_samples: Vec<u64>,
    sample_limit: usize,
}

impl RowAssembler {
    pub fn new(detector: HeaderDetector, sample_limit: usize) -> Self {
        Self {
            detector,
            columns: None,
            non_empty_lines: 0,
            preamble_lines: 0,
            rows_built: 0,
            rows_dropped: 0,
            mismatch_samples: Vec::new(),
            sample_limit,
        }
    }

    /// Classify tokenized `fields` from 1-based line `line_no`.
    pub fn accept(&mut self, line_no: u64, fields: Vec<String>) -> LineOutcome {
        if fields.iter().all(|f| f.is_empty()) && fields.len() <= 1 {
            return LineOutcome::Empty;
        }
        self.non_empty_lines += 1;

        let Some(columns) = self.columns.clone() else {
            if self.detector.is_header(&fields) {
                tracing::debug!(line = line_no, columns = fields.len(), "header detected");
                self.columns = Some(fields.into());
                return LineOutcome::Header;
            }
            self.preamble_lines += 1;
            return LineOutcome::Preamble;
        };

        if fields.len() != columns.len() {
            self.rows_dropped += 1;
            if self.mismatch_samples.len() < self.sample_limit {
                self.mismatch_samples.push(line_no);
            }
            tracing::trace!(
                line = line_no,
                expected = columns.len(),
                found = fields.len(),
                "dropping row with mismatched field count"
            );
            return LineOutcome::Dropped {
                found: fields.len(),
            };
        }

        self.rows_built += 1;
        LineOutcome::Row(ParsedRow::new(columns, fields))
    }

    pub fn header_detected(&self) -> bool {
        self.columns.is_some()
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns
            .as_deref()
            .map(|c| c.to_vec())
            .unwrap_or_default()
    }

    pub fn rows_built(&self) -> u64 {
        self.rows_built
    }

    pub fn rows_dropped(&self) -> u64 {
        self.rows_dropped
    }

    /// Warnings accumulated so far, preamble before mismatches.
    pub fn warnings(&self) -> Vec<IngestWarning> {
        let mut warnings = Vec::new();
        match &self.columns {
            None => {
                warnings.push(IngestWarning::NoHeaderDetected {
                    lines_scanned: self.non_empty_lines,
                });
            }
            Some(columns) => {
                if self.preamble_lines > 0 {
                    warnings.push(IngestWarning::PreambleSkipped {
                        lines: self.preamble_lines,
                    });
                }
                if self.rows_dropped > 0 {
                    warnings.push(IngestWarning::FormatMismatch {
                        expected: columns.len(),
                        dropped: self.rows_dropped,
                        sample_lines: self.mismatch_samples.clone(),
                    });
                }
            }
        }
        warnings
    }
}
