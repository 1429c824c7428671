use crate::{IngestError, IngestResult};
use bytes::BytesMut;
use encoding_rs::{DecoderResult, Encoding};
use std::io;
use tokio_util::codec::Decoder;

/// Incremental decoder for one operation's fixed charset.
///
/// Multi-byte sequences split across reads are held inside the decoder until
/// the next call. A leading BOM is sniffed and dropped.
pub struct TextDecoder {
    encoding: &'static Encoding,
    decoder: encoding_rs::Decoder,
    consumed: u64,
    finished: bool,
}

impl TextDecoder {
    pub fn new(encoding: &'static Encoding) -> Self {
        Self {
            encoding,
            decoder: encoding.new_decoder(),
            consumed: 0,
            finished: false,
        }
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Decode `src` and append the text to `dst`. Pass `last = true` once, at end of input.
    pub fn decode_into(&mut self, mut src: &[u8], dst: &mut String, last: bool) -> IngestResult<()> {
        if self.finished {
            return Ok(());
        }
        loop {
            let needed = self
                .decoder
                .max_utf8_buffer_length_without_replacement(src.len())
                .unwrap_or_else(|| src.len() * 3 + 16);
            dst.reserve(needed);

            let (result, read) = self
                .decoder
                .decode_to_string_without_replacement(src, dst, last);
            self.consumed += read as u64;
            src = &src[read..];

            match result {
                DecoderResult::InputEmpty => break,
                DecoderResult::OutputFull => continue,
                DecoderResult::Malformed(bad, after) => {
                    return Err(IngestError::Decode {
                        encoding: self.encoding.name(),
                        offset: self.consumed.saturating_sub(bad as u64 + after as u64),
                    });
                }
            }
        }
        if last {
            self.finished = true;
        }
        Ok(())
    }
}

/// Frames an arbitrary-charset byte stream into UTF-8 buffers, for readers
/// that only understand UTF-8.
///
/// Malformed input surfaces as an `InvalidData` I/O error wrapping
/// [`IngestError::Decode`]; see [`decode_error`].
pub struct Transcoder {
    inner: TextDecoder,
}

impl Transcoder {
    pub fn new(encoding: &'static Encoding) -> Self {
        Self {
            inner: TextDecoder::new(encoding),
        }
    }

    fn run(&mut self, src: &mut BytesMut, last: bool) -> io::Result<Option<BytesMut>> {
        let mut out = String::new();
        self.inner
            .decode_into(src, &mut out, last)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        // encoding_rs keeps incomplete sequences internally, so input is always fully consumed
        src.clear();

        if out.is_empty() {
            Ok(None)
        } else {
            Ok(Some(BytesMut::from(out.as_bytes())))
        }
    }
}

/// Recover the [`IngestError::Decode`] a [`Transcoder`] wrapped into an I/O
/// error; anything else stays an I/O error.
pub(crate) fn decode_error(err: io::Error) -> IngestError {
    let decode = match err.get_ref().and_then(|e| e.downcast_ref::<IngestError>()) {
        Some(&IngestError::Decode { encoding, offset }) => Some((encoding, offset)),
        _ => None,
    };
    match decode {
        Some((encoding, offset)) => IngestError::Decode { encoding, offset },
        None => IngestError::Io(err),
    }
}

impl Decoder for Transcoder {
    type Item = BytesMut;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        self.run(src, false)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.inner.finished {
            buf.clear();
            return Ok(None);
        }
        self.run(buf, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_utf8_sequence_split_across_calls() {
        let mut dec = TextDecoder::new(encoding_rs::UTF_8);
        let bytes = "Temp(°C)".as_bytes();
        let split = bytes.iter().position(|b| *b == 0xC2).unwrap() + 1;

        let mut out = String::new();
        dec.decode_into(&bytes[..split], &mut out, false).unwrap();
        assert_eq!(out, "Temp(");
        dec.decode_into(&bytes[split..], &mut out, true).unwrap();
        assert_eq!(out, "Temp(°C)");
    }

    #[test]
    fn strips_bom_and_decodes_windows_1252() {
        let mut dec = TextDecoder::new(encoding_rs::WINDOWS_1252);
        let mut out = String::new();
        dec.decode_into(b"Temp(\xb0C)", &mut out, true).unwrap();
        assert_eq!(out, "Temp(°C)");

        let mut dec = TextDecoder::new(encoding_rs::UTF_8);
        let mut out = String::new();
        dec.decode_into(b"\xef\xbb\xbfCycle", &mut out, true).unwrap();
        assert_eq!(out, "Cycle");
    }

    #[test]
    fn reports_offset_of_malformed_input() {
        let mut dec = TextDecoder::new(encoding_rs::UTF_8);
        let mut out = String::new();
        let err = dec.decode_into(b"abc\xffdef", &mut out, true).unwrap_err();
        match err {
            IngestError::Decode { encoding, offset } => {
                assert_eq!(encoding, "UTF-8");
                assert_eq!(offset, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn transcoder_errors_unwrap_to_decode() {
        let mut transcoder = Transcoder::new(encoding_rs::UTF_8);
        let mut buf = BytesMut::from(&b"ab\xff"[..]);
        let err = transcoder.decode_eof(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(matches!(decode_error(err), IngestError::Decode { offset: 2, .. }));

        let short = io::Error::new(io::ErrorKind::UnexpectedEof, "short read");
        assert!(matches!(decode_error(short), IngestError::Io(_)));
    }
}
