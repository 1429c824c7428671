use crate::rows::ParsedRow;
use crate::warning::IngestWarning;

/// A bounded, ordered slice of one operation's rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataChunk {
    pub id: String,
    /// Ordinal, starting at 0 and strictly increasing within an operation.
    pub index: usize,
    pub data: Vec<ParsedRow>,
    /// Row index of `data[0]` within the whole operation.
    pub start_index: u64,
    /// One past the last row index; equals the next chunk's `start_index`.
    pub end_index: u64,
    /// All rows were parsed when the chunk was sealed.
    pub processed: bool,
}

impl DataChunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Accumulates rows and seals them into [`DataChunk`]s.
///
/// A chunk is sealed at `capacity` rows, or earlier when the estimated size of
/// the buffered rows passes `max_buffered_bytes`. Rows are moved into the
/// chunk, so the buffer is empty again after each hand-off.
#[derive(Debug)]
pub struct ChunkAssembler {
    capacity: usize,
    max_buffered_bytes: usize,
    rows: Vec<ParsedRow>,
    buffered_bytes: usize,
    next_index: usize,
    next_start: u64,
    warnings: Vec<IngestWarning>,
}

impl ChunkAssembler {
    pub fn new(capacity: usize, max_buffered_bytes: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            max_buffered_bytes,
            rows: Vec::new(),
            buffered_bytes: 0,
            next_index: 0,
            next_start: 0,
            warnings: Vec::new(),
        }
    }

    /// Add a row; returns a sealed chunk when one is due.
    pub fn push(&mut self, row: ParsedRow) -> Option<DataChunk> {
        self.buffered_bytes += row.estimated_size();
        self.rows.push(row);

        if self.rows.len() >= self.capacity {
            return Some(self.seal());
        }
        if self.buffered_bytes > self.max_buffered_bytes {
            let warning = IngestWarning::EarlyFlush {
                chunk_index: self.next_index,
                rows: self.rows.len(),
                estimated_bytes: self.buffered_bytes,
            };
            tracing::warn!(%warning, "memory ceiling reached");
            self.warnings.push(warning);
            return Some(self.seal());
        }
        None
    }

    /// End of stream: seal whatever is left, if anything.
    pub fn finish(&mut self) -> Option<DataChunk> {
        if self.rows.is_empty() {
            None
        } else {
            Some(self.seal())
        }
    }

    pub fn chunks_emitted(&self) -> usize {
        self.next_index
    }

    pub fn rows_emitted(&self) -> u64 {
        self.next_start
    }

    pub fn buffered_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn take_warnings(&mut self) -> Vec<IngestWarning> {
        std::mem::take(&mut self.warnings)
    }

    fn seal(&mut self) -> DataChunk {
        let data = std::mem::take(&mut self.rows);
        let index = self.next_index;
        let start_index = self.next_start;
        let end_index = start_index + data.len() as u64;

        self.next_index += 1;
        self.next_start = end_index;
        self.buffered_bytes = 0;

        tracing::debug!(index, start_index, end_index, "chunk sealed");
        DataChunk {
            id: format!("chunk_{index:06}"),
            index,
            data,
            start_index,
            end_index,
            processed: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn row(i: usize) -> ParsedRow {
        let columns: Arc<[String]> = vec!["Cycle".to_string()].into();
        ParsedRow::new(columns, vec![i.to_string()])
    }

    #[test]
    fn seals_at_capacity_with_contiguous_ranges() {
        let mut asm = ChunkAssembler::new(3, usize::MAX);
        let mut chunks = Vec::new();
        for i in 0..7 {
            chunks.extend(asm.push(row(i)));
        }
        chunks.extend(asm.finish());

        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(DataChunk::len).collect::<Vec<_>>(),
            vec![3, 3, 1]
        );
        assert_eq!(
            chunks
                .iter()
                .map(|c| (c.index, c.start_index, c.end_index))
                .collect::<Vec<_>>(),
            vec![(0, 0, 3), (1, 3, 6), (2, 6, 7)]
        );
        assert_eq!(chunks[1].id, "chunk_000001");
        assert!(asm.finish().is_none());
    }

    #[test]
    fn flushes_early_over_memory_ceiling() {
        let one_row = row(0).estimated_size();
        let mut asm = ChunkAssembler::new(100, one_row * 2);
        assert!(asm.push(row(0)).is_none());
        assert!(asm.push(row(1)).is_none());
        let chunk = asm.push(row(2)).expect("early flush");
        assert_eq!(chunk.len(), 3);
        assert_eq!(asm.buffered_rows(), 0);

        let warnings = asm.take_warnings();
        assert!(matches!(
            warnings.as_slice(),
            [IngestWarning::EarlyFlush { chunk_index: 0, rows: 3, .. }]
        ));
    }
}
