//! Plain-text decoding with an ordered encoding fallback

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, WINDOWS_1252, WINDOWS_1256};

use crate::config::IngestConfig;
use crate::ingestion::extractor::{AttemptLog, Extraction, FormatExtractor};
use crate::types::SourceFile;

/// Decoded text and the encoding that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding: &'static str,
}

type Decoder = fn(&[u8]) -> Option<String>;

/// Encodings in the order they are tried. Latin-1 never fails, so anything
/// after it only matters for empty input.
const ENCODINGS: &[(&str, Decoder)] = &[
    ("utf-8", decode_utf8),
    ("utf-16", decode_utf16),
    ("latin-1", decode_latin1),
    ("windows-1252", decode_windows_1252),
    ("iso-8859-1", decode_latin1),
    ("windows-1256", decode_windows_1256),
];

/// Reads plain-text files of unknown encoding
pub struct TextDecoder;

impl TextDecoder {
    /// Names of the encodings tried, in order
    pub fn encoding_order() -> Vec<&'static str> {
        ENCODINGS.iter().map(|(name, _)| *name).collect()
    }

    /// First non-empty decode in encoding order
    pub fn decode(bytes: &[u8]) -> Option<DecodedText> {
        ENCODINGS.iter().find_map(|(name, decode)| {
            decode(bytes)
                .filter(|text| !text.is_empty())
                .map(|text| DecodedText {
                    text,
                    encoding: *name,
                })
        })
    }
}

impl FormatExtractor for TextDecoder {
    fn name(&self) -> &'static str {
        "text"
    }

    fn extract(&self, source: &SourceFile, _config: &IngestConfig) -> Extraction {
        let mut log = AttemptLog::new();
        let mut encoding = None;

        let text = log.run(&source.file_name, "text-decode", 1, || {
            let bytes = std::fs::read(&source.path)?;
            Ok(match Self::decode(&bytes) {
                Some(decoded) => {
                    encoding = Some(decoded.encoding);
                    decoded.text
                }
                None => String::new(),
            })
        });

        match (text, encoding) {
            (Some(text), Some(encoding)) => {
                tracing::debug!("[{}] Decoded as {}", source.file_name, encoding);
                Extraction::success(text, format!("text:{}", encoding), log.into_attempts())
            }
            _ => Extraction::exhausted(String::new(), log.into_attempts()),
        }
    }
}

fn decode_utf8(bytes: &[u8]) -> Option<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    std::str::from_utf8(bytes).ok().map(str::to_string)
}

/// UTF-16 is only recognised by its byte order mark. Without one almost any
/// even-length byte string would "decode".
fn decode_utf16(bytes: &[u8]) -> Option<String> {
    let (encoding, bom_len) = Encoding::for_bom(bytes)?;
    if encoding != UTF_16LE && encoding != UTF_16BE {
        return None;
    }
    strict(encoding, &bytes[bom_len..])
}

fn decode_latin1(bytes: &[u8]) -> Option<String> {
    Some(bytes.iter().map(|&b| b as char).collect())
}

fn decode_windows_1252(bytes: &[u8]) -> Option<String> {
    strict(WINDOWS_1252, bytes)
}

fn decode_windows_1256(bytes: &[u8]) -> Option<String> {
    strict(WINDOWS_1256, bytes)
}

fn strict(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
}
