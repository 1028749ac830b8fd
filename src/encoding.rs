//! Character encoding detection for text-like files
//!
//! Decoding order:
//! 1. Byte order mark (UTF-8, UTF-16LE, UTF-16BE)
//! 2. Strict UTF-8
//! 3. Configured fallback encodings, strict, in order
//! 4. Lossy UTF-8 (never fails)
//!
//! Files are sniffed from their first `SNIFF_LEN` bytes and then decoded as a
//! stream, so large logs are never held in memory.

use encoding_rs::{CoderResult, Decoder, DecoderResult, Encoding, UTF_8};
use std::io::{self, Read};

/// Bytes inspected to pick an encoding
pub const SNIFF_LEN: usize = 64 * 1024;

const CHUNK_LEN: usize = 8 * 1024;

/// Text decoded from raw bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    text: String,
    encoding: &'static str,
    lossy: bool,
}

impl DecodedText {
    /// Lazily iterate over decoded lines (without line terminators)
    pub fn lines(&self) -> std::str::Lines<'_> {
        self.text.lines()
    }

    /// Full decoded text
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Name of the encoding that produced the text
    pub fn encoding(&self) -> &'static str {
        self.encoding
    }

    /// Whether replacement characters were substituted for invalid bytes
    pub fn is_lossy(&self) -> bool {
        self.lossy
    }
}

/// Picks a decodable encoding for a byte buffer
#[derive(Debug, Clone)]
pub struct EncodingDetector {
    fallbacks: Vec<&'static Encoding>,
}

impl EncodingDetector {
    /// Build a detector from WHATWG encoding labels ("gbk", "big5", ...)
    ///
    /// Unknown labels are skipped with a warning.
    pub fn new<S: AsRef<str>>(fallback_labels: &[S]) -> Self {
        let fallbacks = fallback_labels
            .iter()
            .filter_map(|label| {
                let label = label.as_ref().trim();
                let encoding = Encoding::for_label(label.as_bytes());
                if encoding.is_none() {
                    tracing::warn!("[EncodingDetector] Unknown encoding label '{}', skipping", label);
                }
                encoding
            })
            .filter(|enc| *enc != UTF_8)
            .collect();

        Self { fallbacks }
    }

    /// Pick the encoding for `sample`
    ///
    /// `complete` is false when `sample` is only the start of the data; an
    /// incomplete character at its end is then not a decoding error. Falls
    /// back to UTF-8, which will decode lossily.
    pub fn detect(&self, sample: &[u8], complete: bool) -> &'static Encoding {
        if let Some((encoding, _)) = Encoding::for_bom(sample) {
            return encoding;
        }
        if decodes_strictly(UTF_8, sample, complete) {
            return UTF_8;
        }
        for &encoding in &self.fallbacks {
            if decodes_strictly(encoding, sample, complete) {
                tracing::debug!("[EncodingDetector] Decoded as {}", encoding.name());
                return encoding;
            }
        }

        tracing::debug!("[EncodingDetector] No strict decoding succeeded, using lossy UTF-8");
        UTF_8
    }

    /// Decode bytes, falling back through the configured encodings
    pub fn decode(&self, bytes: &[u8]) -> DecodedText {
        let encoding = self.detect(bytes, true);
        let (text, lossy) = encoding.decode_with_bom_removal(bytes);
        DecodedText {
            text: text.into_owned(),
            encoding: encoding.name(),
            lossy,
        }
    }

    /// Wrap `inner` in a reader producing UTF-8
    ///
    /// Reads up to `SNIFF_LEN` bytes to pick the encoding, then decodes
    /// the rest incrementally.
    pub fn reader<R: Read>(&self, mut inner: R) -> io::Result<DecodingReader<R>> {
        let mut sample = vec![0u8; SNIFF_LEN];
        let mut filled = 0;
        let mut eof = false;
        while filled < SNIFF_LEN {
            match inner.read(&mut sample[filled..]) {
                Ok(0) => {
                    eof = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        sample.truncate(filled);

        let encoding = self.detect(&sample, eof);
        Ok(DecodingReader {
            inner,
            decoder: encoding.new_decoder_with_bom_removal(),
            encoding,
            input: sample,
            input_pos: 0,
            output: String::new(),
            output_pos: 0,
            eof,
            finished: false,
            lossy: false,
        })
    }
}

fn decodes_strictly(encoding: &'static Encoding, bytes: &[u8], last: bool) -> bool {
    let mut decoder = encoding.new_decoder_without_bom_handling();
    let Some(capacity) = decoder.max_utf8_buffer_length_without_replacement(bytes.len()) else {
        return false;
    };
    let mut out = String::with_capacity(capacity);
    let (result, _) = decoder.decode_to_string_without_replacement(bytes, &mut out, last);
    matches!(result, DecoderResult::InputEmpty)
}

/// UTF-8 view of a byte stream in a detected encoding
///
/// Invalid sequences become U+FFFD and mark the reader lossy.
pub struct DecodingReader<R> {
    inner: R,
    decoder: Decoder,
    encoding: &'static Encoding,
    input: Vec<u8>,
    input_pos: usize,
    output: String,
    output_pos: usize,
    eof: bool,
    finished: bool,
    lossy: bool,
}

impl<R: Read> DecodingReader<R> {
    pub fn encoding(&self) -> &'static str {
        self.encoding.name()
    }

    /// Whether replacement characters were produced so far
    pub fn is_lossy(&self) -> bool {
        self.lossy
    }

    fn refill_input(&mut self) -> io::Result<()> {
        self.input.resize(CHUNK_LEN, 0);
        self.input_pos = 0;
        loop {
            match self.inner.read(&mut self.input) {
                Ok(n) => {
                    self.input.truncate(n);
                    self.eof = n == 0;
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    self.input.clear();
                    return Err(e);
                }
            }
        }
    }
}

impl<R: Read> Read for DecodingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let pending = &self.output.as_bytes()[self.output_pos..];
            if !pending.is_empty() {
                let n = pending.len().min(buf.len());
                buf[..n].copy_from_slice(&pending[..n]);
                self.output_pos += n;
                return Ok(n);
            }
            if self.finished {
                return Ok(0);
            }

            if self.input_pos >= self.input.len() && !self.eof {
                self.refill_input()?;
            }

            self.output.clear();
            self.output_pos = 0;
            let src = &self.input[self.input_pos..];
            let needed = self
                .decoder
                .max_utf8_buffer_length(src.len())
                .unwrap_or(CHUNK_LEN * 4);
            self.output.reserve(needed.max(4));

            let (result, read, replaced) = self.decoder.decode_to_string(src, &mut self.output, self.eof);
            self.input_pos += read;
            self.lossy |= replaced;
            if self.eof && result == CoderResult::InputEmpty {
                self.finished = true;
            }
        }
    }
}

impl Default for EncodingDetector {
    fn default() -> Self {
        Self::new(&["gbk", "gb18030", "big5", "utf-16le"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8() {
        let detector = EncodingDetector::default();
        let decoded = detector.decode("héllo\nwörld".as_bytes());
        assert_eq!(decoded.encoding(), "UTF-8");
        assert!(!decoded.is_lossy());
        assert_eq!(decoded.lines().collect::<Vec<_>>(), vec!["héllo", "wörld"]);
    }

    #[test]
    fn test_empty_input() {
        let detector = EncodingDetector::default();
        let decoded = detector.decode(b"");
        assert_eq!(decoded.as_str(), "");
        assert_eq!(decoded.lines().count(), 0);
        assert!(!decoded.is_lossy());
    }

    #[test]
    fn test_utf8_bom_is_stripped() {
        let detector = EncodingDetector::default();
        let decoded = detector.decode(b"\xEF\xBB\xBFhello");
        assert_eq!(decoded.as_str(), "hello");
        assert_eq!(decoded.encoding(), "UTF-8");
    }

    #[test]
    fn test_utf16le_bom() {
        let detector = EncodingDetector::default();
        let decoded = detector.decode(&[0xFF, 0xFE, b'h', 0, b'i', 0]);
        assert_eq!(decoded.as_str(), "hi");
        assert_eq!(decoded.encoding(), "UTF-16LE");
    }

    #[test]
    fn test_gbk_fallback() {
        // "中文" in GBK
        let bytes = [0xD6, 0xD0, 0xCE, 0xC4];
        let detector = EncodingDetector::default();
        let decoded = detector.decode(&bytes);
        assert_eq!(decoded.as_str(), "中文");
        assert_eq!(decoded.encoding(), "GBK");
    }

    #[test]
    fn test_lossy_last_resort() {
        // No fallbacks configured, invalid UTF-8
        let detector = EncodingDetector::new::<&str>(&[]);
        let decoded = detector.decode(&[b'a', 0xFF, b'b']);
        assert!(decoded.is_lossy());
        assert_eq!(decoded.as_str(), "a\u{FFFD}b");
    }

    #[test]
    fn test_unknown_label_is_skipped() {
        let detector = EncodingDetector::new(&["not-an-encoding", "big5"]);
        assert_eq!(detector.fallbacks.len(), 1);
    }

    #[test]
    fn test_detect_tolerates_cut_sample() {
        let detector = EncodingDetector::default();
        // "中文" in UTF-8 with the last character cut in half
        let bytes = "中文".as_bytes();
        assert_eq!(detector.detect(&bytes[..4], false), UTF_8);
        assert_ne!(detector.detect(&bytes[..4], true), UTF_8);
    }

    #[test]
    fn test_reader_streams_past_sniff_window() {
        let detector = EncodingDetector::default();
        // GBK text longer than the sniff window
        let line = [0xD6, 0xD0, 0xCE, 0xC4, b'\n'];
        let bytes: Vec<u8> = line.iter().copied().cycle().take(line.len() * 30_000).collect();
        assert!(bytes.len() > SNIFF_LEN);

        let mut reader = detector.reader(bytes.as_slice()).unwrap();
        let mut text = String::new();
        reader.read_to_string(&mut text).unwrap();

        assert_eq!(reader.encoding(), "GBK");
        assert!(!reader.is_lossy());
        assert_eq!(text.lines().count(), 30_000);
        assert!(text.lines().all(|l| l == "中文"));
    }

    #[test]
    fn test_reader_strips_bom_and_marks_lossy() {
        let detector = EncodingDetector::new::<&str>(&[]);

        let mut text = String::new();
        let mut reader = detector.reader(&b"\xEF\xBB\xBFhello"[..]).unwrap();
        reader.read_to_string(&mut text).unwrap();
        assert_eq!(text, "hello");
        assert!(!reader.is_lossy());

        let mut text = String::new();
        let mut reader = detector.reader(&[b'a', 0xFF, b'b'][..]).unwrap();
        reader.read_to_string(&mut text).unwrap();
        assert_eq!(text, "a\u{FFFD}b");
        assert!(reader.is_lossy());
    }
}
