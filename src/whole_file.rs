use crate::codec::decode_error;
use crate::config::IngestConfig;
use crate::lines::LineReassembler;
use crate::rows::{HeaderDetector, LineOutcome, ParsedRow, RowAssembler};
use crate::tokenize::Tokenizer;
use crate::warning::IngestWarning;
use crate::IngestResult;
use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Output of a one-pass parse of a complete export.
#[derive(Debug, Default)]
pub struct ParsedFile {
    pub headers: Vec<String>,
    pub rows: Vec<ParsedRow>,
    /// Every line read, blank ones included.
    pub total_lines: u64,
    pub rows_dropped: u64,
    pub warnings: Vec<IngestWarning>,
    /// Filled by parsers that can infer the equipment vendor.
    pub equipment: Option<String>,
    /// Filled by parsers that can infer the cell chemistry.
    pub chemistry: Option<String>,
}

/// Parser used for sources at or below the streaming cutover.
///
/// The reader yields UTF-8; charset decoding has already happened.
pub trait WholeFileParser: Send + Sync {
    fn parse<'a>(
        &'a self,
        reader: Box<dyn AsyncRead + Unpin + Send>,
        config: &'a IngestConfig,
    ) -> BoxFuture<'a, IngestResult<ParsedFile>>;
}

/// Default whole-file parser.
///
/// Reads the complete text, then frames lines and fields with the same
/// [`LineReassembler`], [`Tokenizer`] and [`RowAssembler`] as the streaming
/// path, so both paths yield the same rows, warnings and line counts.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvWholeFileParser;

impl WholeFileParser for CsvWholeFileParser {
    fn parse<'a>(
        &'a self,
        mut reader: Box<dyn AsyncRead + Unpin + Send>,
        config: &'a IngestConfig,
    ) -> BoxFuture<'a, IngestResult<ParsedFile>> {
        Box::pin(async move {
            let mut text = Vec::new();
            reader.read_to_end(&mut text).await.map_err(decode_error)?;

            let mut reassembler = LineReassembler::new(encoding_rs::UTF_8, config.line_terminator);
            let mut lines = reassembler.push(&text)?;
            lines.extend(reassembler.finish()?);
            drop(text);

            let tokenizer = Tokenizer::new(config.delimiter, config.quote);
            let mut assembler = RowAssembler::new(
                HeaderDetector::new(&config.header_keywords),
                config.mismatch_sample_limit,
            );
            let mut rows = Vec::new();
            for (idx, line) in lines.iter().enumerate() {
                if let LineOutcome::Row(row) = assembler.accept(idx as u64 + 1, tokenizer.tokenize(line)) {
                    rows.push(row);
                }
            }

            Ok(ParsedFile {
                headers: assembler.headers(),
                rows,
                total_lines: lines.len() as u64,
                rows_dropped: assembler.rows_dropped(),
                warnings: assembler.warnings(),
                equipment: None,
                chemistry: None,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn parse(text: &str) -> ParsedFile {
        CsvWholeFileParser
            .parse(Box::new(std::io::Cursor::new(text.as_bytes().to_vec())), &IngestConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn parses_quoted_fields_and_drops_short_rows() {
        let text = "Test Name: cell_07\nCycle,Step,\"Voltage, V\"\n1,1,3.71\n1,2\n2,1,\"3.6\"\n";
        let parsed = parse(text).await;

        assert_eq!(parsed.headers, vec!["Cycle", "Step", "Voltage, V"]);
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[1].get("Voltage, V"), Some("3.6"));
        assert_eq!(parsed.rows_dropped, 1);
        assert_eq!(parsed.total_lines, 5);
        assert_eq!(
            parsed.warnings,
            vec![
                IngestWarning::PreambleSkipped { lines: 1 },
                IngestWarning::FormatMismatch {
                    expected: 3,
                    dropped: 1,
                    sample_lines: vec![4],
                },
            ]
        );
    }

    #[tokio::test]
    async fn quotes_never_span_lines() {
        let parsed = parse("Cycle,Note,Voltage\n1,\"first\nsecond\",3.7\n2,ok,3.8\n").await;

        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].get("Note"), Some("ok"));
        assert_eq!(
            parsed.warnings,
            vec![IngestWarning::FormatMismatch {
                expected: 3,
                dropped: 2,
                sample_lines: vec![2, 3],
            }]
        );
    }

    #[tokio::test]
    async fn counts_blank_lines_like_the_stream() {
        let parsed = parse("\nCycle,Voltage\r\n1,3.7\r\n\r\n\n").await;
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.total_lines, 5);
    }
}
