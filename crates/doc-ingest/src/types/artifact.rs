//! Artifact provenance header
//!
//! Every artifact starts with a fixed, line-oriented header. It is the only
//! record of where an artifact came from and is re-parsed on each conflict
//! check, so the layout must stay byte-compatible with existing stores:
//!
//! ```text
//! Source File: <original filename>
//! File Path: <absolute source path>
//! Extraction Date: <YYYY-MM-DD HH:MM:SS>
//! File Type: <EXTENSION>
//! Text Length: <n> characters
//! ================================================================================
//!
//! <body>
//! ```

use chrono::{Local, NaiveDateTime};
use serde::Serialize;

use super::SourceFile;

pub const SOURCE_FILE_KEY: &str = "Source File:";
pub const FILE_PATH_KEY: &str = "File Path:";
pub const EXTRACTION_DATE_KEY: &str = "Extraction Date:";
pub const FILE_TYPE_KEY: &str = "File Type:";
pub const TEXT_LENGTH_KEY: &str = "Text Length:";

/// Width of the rule line separating header and body
pub const RULE_WIDTH: usize = 80;

/// Timestamp layout used in `Extraction Date:`
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parsed provenance header. Every field is optional because older or
/// hand-edited artifacts may lack some lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArtifactHeader {
    pub source_file: Option<String>,
    pub file_path: Option<String>,
    pub extraction_date: Option<String>,
    pub file_type: Option<String>,
    pub text_length: Option<usize>,
}

impl ArtifactHeader {
    /// Parse header lines from the beginning of an artifact. Stops at the rule line.
    pub fn parse(content: &str) -> Self {
        let mut header = Self::default();

        for line in content.lines() {
            if is_rule_line(line) {
                break;
            }
            if let Some(value) = field(line, SOURCE_FILE_KEY) {
                header.source_file = Some(value);
            } else if let Some(value) = field(line, FILE_PATH_KEY) {
                header.file_path = Some(value);
            } else if let Some(value) = field(line, EXTRACTION_DATE_KEY) {
                header.extraction_date = Some(value);
            } else if let Some(value) = field(line, FILE_TYPE_KEY) {
                header.file_type = Some(value);
            } else if let Some(value) = field(line, TEXT_LENGTH_KEY) {
                header.text_length = value
                    .trim_end_matches("characters")
                    .trim()
                    .parse()
                    .ok();
            }
        }

        header
    }

    /// True when no provenance line was found at all
    pub fn is_empty(&self) -> bool {
        self.source_file.is_none() && self.file_path.is_none()
    }

    /// Extraction date as a timestamp, if present and well-formed
    pub fn extracted_at(&self) -> Option<NaiveDateTime> {
        self.extraction_date
            .as_deref()
            .and_then(|d| NaiveDateTime::parse_from_str(d, DATE_FORMAT).ok())
    }
}

fn field(line: &str, key: &str) -> Option<String> {
    line.strip_prefix(key).map(|rest| rest.trim().to_string())
}

fn is_rule_line(line: &str) -> bool {
    line.len() == RULE_WIDTH && line.bytes().all(|b| b == b'=')
}

/// A complete artifact ready to be written
#[derive(Debug, Clone)]
pub struct Artifact {
    pub header: ArtifactHeader,
    pub body: String,
}

impl Artifact {
    /// Build an artifact for `source`, stamped with the current local time
    pub fn new(source: &SourceFile, body: String) -> Self {
        let header = ArtifactHeader {
            source_file: Some(source.file_name.clone()),
            file_path: Some(source.path_string()),
            extraction_date: Some(Local::now().format(DATE_FORMAT).to_string()),
            file_type: Some(source.type_tag()),
            text_length: Some(body.chars().count()),
        };
        Self { header, body }
    }

    /// Serialize header and body in the fixed layout
    pub fn render(&self) -> String {
        let h = &self.header;
        let mut out = String::with_capacity(self.body.len() + 512);
        out.push_str(&format!("{} {}\n", SOURCE_FILE_KEY, h.source_file.as_deref().unwrap_or("")));
        out.push_str(&format!("{} {}\n", FILE_PATH_KEY, h.file_path.as_deref().unwrap_or("")));
        out.push_str(&format!(
            "{} {}\n",
            EXTRACTION_DATE_KEY,
            h.extraction_date.as_deref().unwrap_or("")
        ));
        out.push_str(&format!("{} {}\n", FILE_TYPE_KEY, h.file_type.as_deref().unwrap_or("")));
        out.push_str(&format!(
            "{} {} characters\n",
            TEXT_LENGTH_KEY,
            h.text_length.unwrap_or_else(|| self.body.chars().count())
        ));
        out.push_str(&"=".repeat(RULE_WIDTH));
        out.push_str("\n\n");
        out.push_str(&self.body);
        out
    }

    /// Parse a full artifact. Content without a rule line is treated as all body.
    pub fn parse(content: &str) -> Self {
        let header = ArtifactHeader::parse(content);
        Self {
            header,
            body: body_of(content).to_string(),
        }
    }
}

/// Everything after the rule line (and the blank line that follows it)
pub fn body_of(content: &str) -> &str {
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        offset += line.len();
        if is_rule_line(line.trim_end_matches(['\n', '\r'])) {
            let rest = &content[offset..];
            return rest
                .strip_prefix("\r\n")
                .or_else(|| rest.strip_prefix('\n'))
                .unwrap_or(rest);
        }
    }
    content
}
