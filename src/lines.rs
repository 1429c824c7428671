use crate::codec::TextDecoder;
use crate::IngestResult;
use memchr::memchr_iter;

/// Turns successive raw reads into complete lines.
///
/// The undecoded/unterminated tail of each read is carried over to the next
/// call, so a line is never split across two yielded lines and never yielded
/// twice. The terminator itself (and a `\r` before it) is not part of the line.
pub struct LineReassembler {
    decoder: TextDecoder,
    buffer: String,
    terminator: u8,
}

impl LineReassembler {
    /// `terminator` must be ASCII so every match falls on a char boundary.
    pub fn new(encoding: &'static encoding_rs::Encoding, terminator: u8) -> Self {
        debug_assert!(terminator.is_ascii());
        Self {
            decoder: TextDecoder::new(encoding),
            buffer: String::new(),
            terminator,
        }
    }

    /// Feed the next read; returns the lines it completed, in order.
    pub fn push(&mut self, bytes: &[u8]) -> IngestResult<Vec<String>> {
        self.decoder.decode_into(bytes, &mut self.buffer, false)?;
        Ok(self.drain_complete())
    }

    /// End of stream: flush the decoder and emit whatever tail remains as one last line.
    pub fn finish(&mut self) -> IngestResult<Vec<String>> {
        self.decoder.decode_into(&[], &mut self.buffer, true)?;
        let mut lines = self.drain_complete();
        if !self.buffer.is_empty() {
            let tail = std::mem::take(&mut self.buffer);
            lines.push(strip_cr(tail));
        }
        Ok(lines)
    }

    /// Bytes of decoded text waiting for a terminator.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    fn drain_complete(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        let mut start = 0;
        for end in memchr_iter(self.terminator, self.buffer.as_bytes()) {
            lines.push(strip_cr(self.buffer[start..end].to_string()));
            start = end + 1;
        }
        if start > 0 {
            self.buffer.drain(..start);
        }
        lines
    }
}

fn strip_cr(mut line: String) -> String {
    if line.ends_with('\r') {
        line.pop();
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reassembler() -> LineReassembler {
        LineReassembler::new(encoding_rs::UTF_8, b'\n')
    }

    #[test]
    fn carries_partial_line_to_next_read() {
        let mut r = reassembler();
        assert_eq!(r.push(b"Cycle,Volt").unwrap(), Vec::<String>::new());
        assert_eq!(r.push(b"age\n1,3.7\n2,").unwrap(), vec!["Cycle,Voltage", "1,3.7"]);
        assert_eq!(r.pending_len(), 2);
        assert_eq!(r.push(b"3.6").unwrap(), Vec::<String>::new());
        assert_eq!(r.finish().unwrap(), vec!["2,3.6"]);
        assert_eq!(r.pending_len(), 0);
    }

    #[test]
    fn strips_crlf_and_keeps_empty_lines() {
        let mut r = reassembler();
        assert_eq!(r.push(b"a\r\n\r\nb\r\n").unwrap(), vec!["a", "", "b"]);
        assert!(r.finish().unwrap().is_empty());
    }

    #[test]
    fn byte_at_a_time_matches_single_read() {
        let text = "Step,Time(s)\n1,0.5\n1,1.0\n2,1.5";
        let mut whole = reassembler();
        let mut expected = whole.push(text.as_bytes()).unwrap();
        expected.extend(whole.finish().unwrap());

        let mut r = reassembler();
        let mut got = Vec::new();
        for b in text.as_bytes() {
            got.extend(r.push(std::slice::from_ref(b)).unwrap());
        }
        got.extend(r.finish().unwrap());
        assert_eq!(got, expected);
        assert_eq!(got.len(), 4);
    }

    #[test]
    fn custom_terminator() {
        let mut r = LineReassembler::new(encoding_rs::UTF_8, b';');
        assert_eq!(r.push(b"a;b;c").unwrap(), vec!["a", "b"]);
        assert_eq!(r.finish().unwrap(), vec!["c"]);
    }
}
