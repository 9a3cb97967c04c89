//! Structured Word documents

use docx_rs::{
    DocumentChild, Paragraph, ParagraphChild, RunChild, Table, TableCellContent, TableChild,
    TableRowChild,
};

use crate::config::IngestConfig;
use crate::error::{Error, Result};
use crate::ingestion::extractor::{AttemptLog, Extraction, FormatExtractor};
use crate::ingestion::legacy::LegacyDocReader;
use crate::types::SourceFile;

pub struct DocxExtractor;

impl FormatExtractor for DocxExtractor {
    fn name(&self) -> &'static str {
        "docx"
    }

    fn extract(&self, source: &SourceFile, config: &IngestConfig) -> Extraction {
        let mut log = AttemptLog::new();
        if let Some(text) = try_structured(source, &mut log) {
            return Extraction::success(text, "docx-rs", log.into_attempts());
        }
        tracing::warn!("[{}] No text from docx parser, trying legacy reader", source.file_name);
        LegacyDocReader::read_legacy(source, config, log)
    }
}

/// Run the structured parser as one tier of `log`
pub(crate) fn try_structured(source: &SourceFile, log: &mut AttemptLog) -> Option<String> {
    log.run(&source.file_name, "docx-rs", 1, || {
        let data = std::fs::read(&source.path)?;
        docx_text(&data)
    })
}

/// Paragraph text in document order, then every table row as ` | `-joined cells
pub fn docx_text(data: &[u8]) -> Result<String> {
    let doc = docx_rs::read_docx(data)
        .map_err(|e| Error::external_tool("docx-rs", e.to_string()))?;

    let mut lines = Vec::new();
    let mut tables = Vec::new();

    for child in &doc.document.children {
        match child {
            DocumentChild::Paragraph(p) => {
                let text = paragraph_text(p);
                let text = text.trim();
                if !text.is_empty() {
                    lines.push(text.to_string());
                }
            }
            DocumentChild::Table(t) => tables.push(t),
            _ => {}
        }
    }

    for table in tables {
        lines.extend(table_rows(table));
    }

    Ok(lines.join("\n"))
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    for child in &paragraph.children {
        if let ParagraphChild::Run(run) = child {
            for child in &run.children {
                match child {
                    RunChild::Text(t) => text.push_str(&t.text),
                    RunChild::Tab(_) => text.push('\t'),
                    _ => {}
                }
            }
        }
    }
    text
}

fn table_rows(table: &Table) -> Vec<String> {
    let mut rows = Vec::new();
    for TableChild::TableRow(row) in &table.rows {
        let cells: Vec<String> = row
            .cells
            .iter()
            .map(|TableRowChild::TableCell(cell)| {
                cell.children
                    .iter()
                    .filter_map(|content| match content {
                        TableCellContent::Paragraph(p) => Some(paragraph_text(p)),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
                    .trim()
                    .to_string()
            })
            .filter(|cell| !cell.is_empty())
            .collect();

        if !cells.is_empty() {
            rows.push(cells.join(" | "));
        }
    }
    rows
}
