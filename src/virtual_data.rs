use std::fmt::Display;
use std::sync::Arc;

/// Read-only windowing and search over rows that are already in memory.
///
/// Meant for presentation layers that render a visible window at a time.
/// Cloning is cheap; clones share the same rows.
#[derive(Debug)]
pub struct VirtualDataProvider<T> {
    rows: Arc<[T]>,
}

impl<T> Clone for VirtualDataProvider<T> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
        }
    }
}

impl<T> VirtualDataProvider<T> {
    pub fn new(rows: impl Into<Arc<[T]>>) -> Self {
        Self { rows: rows.into() }
    }

    pub fn total(&self) -> usize {
        self.rows.len()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.rows.get(index)
    }

    /// Rows in `[start, min(end, total))`; empty when the window is empty or past the end.
    pub fn get_chunk(&self, start: usize, end: usize) -> &[T] {
        let end = end.min(self.rows.len());
        if start >= end {
            return &[];
        }
        &self.rows[start..end]
    }
}

impl<T: Display> VirtualDataProvider<T> {
    /// Every row whose rendered text contains `query`, ignoring case.
    pub fn search(&self, query: &str) -> Vec<&T> {
        let needle = query.to_lowercase();
        self.rows
            .iter()
            .filter(|row| row.to_string().to_lowercase().contains(&needle))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> VirtualDataProvider<&'static str> {
        VirtualDataProvider::new(vec!["LFP cell", "NMC cell", "lfp pouch", "LTO", "NCA"])
    }

    #[test]
    fn window_is_clipped_to_total() {
        let p = provider();
        assert_eq!(p.total(), 5);
        assert_eq!(p.get_chunk(3, 1000), &["LTO", "NCA"]);
        assert_eq!(p.get_chunk(0, 2), &["LFP cell", "NMC cell"]);
        assert!(p.get_chunk(7, 9).is_empty());
        assert!(p.get_chunk(3, 2).is_empty());
    }

    #[test]
    fn search_ignores_case() {
        let p = provider();
        assert_eq!(p.search("lfp"), vec![&"LFP cell", &"lfp pouch"]);
        assert_eq!(p.search("CELL").len(), 2);
        assert!(p.search("sodium").is_empty());
    }
}
