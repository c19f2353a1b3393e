//! Incremental UTF-8 decoding for chunked response bodies.
//!
//! A multi-byte character may be split across chunks; the decoder carries the
//! incomplete tail into the next call. Invalid sequences become U+FFFD and
//! decoding continues.

const REPLACEMENT: char = '\u{FFFD}';

#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `chunk` (plus any carried bytes) as is complete.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(chunk);

        let mut out = String::with_capacity(input.len());
        let mut rest = input.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    if let Ok(valid) = std::str::from_utf8(valid) {
                        out.push_str(valid);
                    }
                    match e.error_len() {
                        Some(len) => {
                            out.push(REPLACEMENT);
                            rest = &after[len..];
                        }
                        None => {
                            // Incomplete sequence at the end: wait for more bytes.
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush at end of stream. A dangling partial sequence becomes one U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        self.pending.clear();
        REPLACEMENT.to_string()
    }

    /// Bytes carried over waiting for the rest of a character.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passes_through() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"4"), "4");
        assert_eq!(decoder.decode(b""), "");
        assert_eq!(decoder.decode(b"!"), "!");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn split_multibyte_character_is_carried() {
        let bytes = "h\u{e9}llo \u{1F600}".as_bytes();
        // Split inside the 2-byte e-acute and inside the 4-byte emoji.
        let mut decoder = Utf8StreamDecoder::new();
        let mut out = String::new();
        out.push_str(&decoder.decode(&bytes[..2]));
        assert_eq!(out, "h");
        assert_eq!(decoder.pending_len(), 1);
        out.push_str(&decoder.decode(&bytes[2..9]));
        out.push_str(&decoder.decode(&bytes[9..]));
        out.push_str(&decoder.finish());
        assert_eq!(out, "h\u{e9}llo \u{1F600}");
    }

    #[test]
    fn every_split_point_reassembles() {
        let text = "a\u{e9}\u{4e2d}\u{1F600}z";
        let bytes = text.as_bytes();
        for split in 0..=bytes.len() {
            let mut decoder = Utf8StreamDecoder::new();
            let mut out = decoder.decode(&bytes[..split]);
            out.push_str(&decoder.decode(&bytes[split..]));
            out.push_str(&decoder.finish());
            assert_eq!(out, text, "split at {split}");
        }
    }

    #[test]
    fn invalid_bytes_become_replacement() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{FFFD}b");
        // Lone continuation byte.
        assert_eq!(decoder.decode(b"\x80c"), "\u{FFFD}c");
    }

    #[test]
    fn truncated_tail_flushes_as_replacement() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(&[b'x', 0xE4, 0xB8]), "x");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.finish(), "");
    }
}
