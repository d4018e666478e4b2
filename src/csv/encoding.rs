use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};

/// What an [`EncodingDetector`] has concluded so far.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectedEncoding {
    /// Nothing fed yet, or a NUL byte was seen: binary or unknown.
    Unknown,
    /// Bytes that are no valid UTF-8, read as the configured legacy
    /// code page.
    Ansi,
    /// Only 7-bit bytes so far.
    Ascii,
    Utf8Bom,
    Utf8NoBom,
    Utf16LeBom,
    Utf16BeBom,
}

impl DetectedEncoding {
    pub fn encoding(&self, fallback: &'static Encoding) -> &'static Encoding {
        //! The decoder for this detection result, `fallback` when nothing
        //! better is known.

        match self {
            DetectedEncoding::Utf8Bom | DetectedEncoding::Utf8NoBom => UTF_8,
            DetectedEncoding::Utf16LeBom => UTF_16LE,
            DetectedEncoding::Utf16BeBom => UTF_16BE,
            DetectedEncoding::Ascii | DetectedEncoding::Ansi | DetectedEncoding::Unknown => {
                fallback
            }
        }
    }

    pub fn is_utf16(&self) -> bool {
        matches!(
            self,
            DetectedEncoding::Utf16LeBom | DetectedEncoding::Utf16BeBom
        )
    }
}

/// Guesses the text encoding of a file from its leading bytes.
///
/// The first chunk is checked for a byte order mark. Without one, chunks are
/// scanned whole for UTF-8 sequences until the answer is no longer
/// ambiguous:
/// - an invalid byte anywhere in the chunk settles on a legacy code page,
/// - a NUL byte settles on binary,
/// - otherwise a chunk holding a valid multi-byte sequence settles on UTF-8,
/// - 7-bit text stays ambiguous, more input may still decide.
///
/// Sequences may straddle chunk boundaries.
#[derive(Clone, Debug)]
pub struct EncodingDetector {
    detected: DetectedEncoding,
    ambiguous: bool,
    bom_skip: usize,
    pending_continuations: usize,
    seen_multibyte: bool,
}

impl Default for EncodingDetector {
    fn default() -> Self {
        EncodingDetector::new()
    }
}

impl EncodingDetector {
    pub fn new() -> EncodingDetector {
        EncodingDetector {
            detected: DetectedEncoding::Unknown,
            ambiguous: true,
            bom_skip: 0,
            pending_continuations: 0,
            seen_multibyte: false,
        }
    }

    pub fn detected(&self) -> DetectedEncoding {
        self.detected
    }

    pub fn is_ambiguous(&self) -> bool {
        self.ambiguous
    }

    pub fn bom_skip(&self) -> usize {
        self.bom_skip
    }

    pub fn update(&mut self, chunk: &[u8], at_beginning: bool) {
        //! Feed the next chunk. `at_beginning` restarts the detection and
        //! checks `chunk` for a byte order mark.

        if at_beginning {
            *self = EncodingDetector::new();
            if let Some((detected, skip)) = check_bom(chunk) {
                self.detected = detected;
                self.bom_skip = skip;
                self.ambiguous = false;
                return;
            }
        }

        if self.ambiguous {
            self.scan_utf8(chunk);
        }
    }

    fn resolve(&mut self, detected: DetectedEncoding) {
        self.detected = detected;
        self.ambiguous = false;
    }

    fn scan_utf8(&mut self, chunk: &[u8]) {
        for &byte in chunk {
            if self.pending_continuations > 0 {
                if !(0x80..=0xBF).contains(&byte) {
                    return self.resolve(DetectedEncoding::Ansi);
                }
                self.pending_continuations -= 1;
                if self.pending_continuations == 0 {
                    self.seen_multibyte = true;
                }
                continue;
            }

            self.pending_continuations = match byte {
                0x00 => return self.resolve(DetectedEncoding::Unknown),
                0x01..=0x7F => 0,
                0xC2..=0xDF => 1,
                0xE0..=0xEF => 2,
                0xF0..=0xF4 => 3,
                _ => return self.resolve(DetectedEncoding::Ansi),
            };
        }

        // a sequence cut by the chunk end is finished by the next chunk
        if self.pending_continuations > 0 {
            if self.seen_multibyte {
                self.detected = DetectedEncoding::Utf8NoBom;
            }
        } else if self.seen_multibyte {
            self.resolve(DetectedEncoding::Utf8NoBom);
        } else {
            self.detected = DetectedEncoding::Ascii;
        }
    }
}

fn check_bom(chunk: &[u8]) -> Option<(DetectedEncoding, usize)> {
    if chunk.starts_with(&[0xFF, 0xFE]) {
        Some((DetectedEncoding::Utf16LeBom, 2))
    } else if chunk.starts_with(&[0xFE, 0xFF]) {
        Some((DetectedEncoding::Utf16BeBom, 2))
    } else if chunk.starts_with(&[0xEF, 0xBB, 0xBF]) {
        Some((DetectedEncoding::Utf8Bom, 3))
    } else {
        None
    }
}
