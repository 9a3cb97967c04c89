//! PDF extraction: text layer first, OCR of rendered pages last
//!
//! Tiers, each accepted only when it yields at least `pdf.min_text_chars`
//! trimmed characters:
//!
//! 1. `pdf-extract`, page by page, on a helper thread under a deadline
//! 2. `lopdf` page text
//! 3. rasterize every page with `pdftoppm` and OCR it
//!
//! Every tier produces `--- Page N ---` blocks so artifacts look the same
//! whichever tier won.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::IngestConfig;
use crate::error::{Error, Result};
use crate::ingestion::extractor::{AttemptLog, Extraction, FormatExtractor};
use crate::ingestion::tools;
use crate::ocr::OcrEngine;
use crate::types::SourceFile;

pub struct PdfExtractor;

impl FormatExtractor for PdfExtractor {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn extract(&self, source: &SourceFile, config: &IngestConfig) -> Extraction {
        let filename = source.file_name.as_str();
        let min_chars = config.pdf.min_text_chars;
        let mut log = AttemptLog::new();

        let data = match std::fs::read(&source.path) {
            Ok(data) => data,
            Err(e) => {
                log.run(filename, "read", min_chars, || Err(e.into()));
                return Extraction::exhausted(String::new(), log.into_attempts());
            }
        };

        let timeout = config.pdf.text_layer_timeout();
        let owned = data.clone();
        if let Some(text) = log.run(filename, "pdf-extract", min_chars, move || {
            text_layer(owned, timeout)
        }) {
            return Extraction::success(text, "pdf-extract", log.into_attempts());
        }

        if let Some(text) = log.run(filename, "lopdf", min_chars, || lopdf_text(&data)) {
            return Extraction::success(text, "lopdf", log.into_attempts());
        }

        tracing::info!("[{}] PDF appears to be image-based, using OCR", filename);
        if let Some(text) = log.run(filename, "pdf-ocr", 1, || ocr_pages(&source.path, config)) {
            return Extraction::success(text, "pdf-ocr", log.into_attempts());
        }

        Extraction::exhausted(String::new(), log.into_attempts())
    }
}

/// Join non-empty pages as `--- Page N ---` blocks
pub fn format_pages<I, S>(pages: I) -> String
where
    I: IntoIterator<Item = (u32, S)>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for (number, text) in pages {
        let text = text.as_ref().trim();
        if text.is_empty() {
            continue;
        }
        out.push_str(&format!("--- Page {} ---\n{}\n\n", number, text));
    }
    out.trim().to_string()
}

/// Primary text layer. pdf-extract can spin forever on broken fonts, so it
/// runs on its own thread and is abandoned at the deadline.
fn text_layer(data: Vec<u8>, timeout: std::time::Duration) -> Result<String> {
    let pages = tools::run_with_deadline("pdf-extract", timeout, move || {
        pdf_extract::extract_text_from_mem_by_pages(&data).map_err(|e| e.to_string())
    })?
    .map_err(|e| Error::external_tool("pdf-extract", e))?;

    Ok(format_pages(
        pages
            .iter()
            .enumerate()
            .map(|(i, page)| (i as u32 + 1, clean_text(page))),
    ))
}

fn lopdf_text(data: &[u8]) -> Result<String> {
    let doc = lopdf::Document::load_mem(data)
        .map_err(|e| Error::external_tool("lopdf", format!("failed to load PDF: {}", e)))?;

    let mut pages = Vec::new();
    for page_number in doc.get_pages().keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(text) => pages.push((*page_number, clean_text(&text))),
            Err(e) => tracing::debug!("lopdf could not read page {}: {}", page_number, e),
        }
    }

    Ok(format_pages(pages))
}

/// Rasterize into a scoped temp dir and OCR page by page. The directory is
/// removed when it goes out of scope, on every exit path.
fn ocr_pages(path: &Path, config: &IngestConfig) -> Result<String> {
    let scratch = tempfile::Builder::new()
        .prefix("pdf-ocr-")
        .tempdir_in(config.temp_root())?;

    let prefix = scratch.path().join("page");
    let mut command = Command::new(&config.pdf.rasterizer);
    command
        .args(["-r", &config.pdf.render_dpi.to_string(), "-png"])
        .arg(path)
        .arg(&prefix);
    tools::run_checked(&mut command, &config.pdf.rasterizer, config.pdf.render_timeout())?;

    let images = rendered_pages(scratch.path())?;
    if images.is_empty() {
        return Err(Error::external_tool(&config.pdf.rasterizer, "rendered no pages"));
    }

    let engine = OcrEngine::new(config);
    let total = images.len();
    let mut pages = Vec::with_capacity(total);
    for (i, image) in images.iter().enumerate() {
        tracing::debug!("OCR page {}/{}", i + 1, total);
        pages.push((i as u32 + 1, engine.recognize(image)));
        if let Err(e) = std::fs::remove_file(image) {
            tracing::debug!("Could not remove {}: {}", image.display(), e);
        }
    }

    Ok(format_pages(pages))
}

/// Page images in page order. pdftoppm zero-pads page numbers, so name order is page order.
fn rendered_pages(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().map(|e| e == "png").unwrap_or(false))
        .collect();
    images.sort();
    Ok(images)
}

fn clean_text(text: &str) -> String {
    text.replace('\0', "")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    #[cfg(unix)]
    use crate::ingestion::tools::stubs;

    /// pdftoppm stand-in writing two empty page images under the output prefix
    #[cfg(unix)]
    const TWO_PAGE_RASTERIZER: &str =
        "[ -n \"$5\" ] || exit 0\n: > \"$5-1.png\"\n: > \"$5-2.png\"";

    #[cfg(unix)]
    fn ocr_config(tools_dir: &Path, scratch: &Path, ocr_body: &str) -> IngestConfig {
        let mut config = IngestConfig::default();
        config.temp_dir = Some(scratch.to_path_buf());
        config.pdf.rasterizer = stubs::script(tools_dir, "rasterizer", TWO_PAGE_RASTERIZER)
            .display()
            .to_string();
        config.ocr.binary = stubs::script(tools_dir, "ocr", ocr_body).display().to_string();
        config
    }

    #[cfg(unix)]
    fn scanned_pdf(dir: &Path) -> SourceFile {
        let path = dir.join("scan.pdf");
        std::fs::write(&path, b"%PDF-1.4 image only, no text layer").unwrap();
        SourceFile::open(&path).unwrap()
    }

    #[test]
    fn test_format_pages() {
        let text = format_pages(vec![(1, "  first page "), (2, "   "), (3, "third")]);
        assert_eq!(text, "--- Page 1 ---\nfirst page\n\n--- Page 3 ---\nthird");
        assert_eq!(format_pages(Vec::<(u32, &str)>::new()), "");
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("a\0b\n\n   c  \n"), "ab\nc");
    }

    #[test]
    fn test_rendered_pages_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["page-10.png", "page-02.png", "page-01.png", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let pages = rendered_pages(dir.path()).unwrap();
        let names: Vec<_> = pages
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["page-01.png", "page-02.png", "page-10.png"]);
    }

    #[test]
    fn test_garbage_pdf_is_exhausted_and_cleans_up() {
        let input = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let path = input.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4 this is not really a pdf").unwrap();

        let mut config = IngestConfig::default();
        config.temp_dir = Some(scratch.path().to_path_buf());

        let source = SourceFile::open(&path).unwrap();
        let extraction = PdfExtractor.extract(&source, &config);

        assert!(!extraction.ok);
        assert_eq!(extraction.attempts.len(), 3);
        assert!(extraction.attempts.iter().all(|a| !a.success));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_ocr_keeps_recognized_pages_when_one_fails() {
        let tools_dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let config = ocr_config(
            tools_dir.path(),
            scratch.path(),
            "case \"$1\" in\n  *page-1.png) echo \"Releve   de compte  janvier\" ;;\n  *) exit 1 ;;\nesac",
        );

        let extraction = PdfExtractor.extract(&scanned_pdf(tools_dir.path()), &config);

        assert!(extraction.ok);
        assert_eq!(extraction.method, "pdf-ocr");
        assert_eq!(extraction.text, "--- Page 1 ---\nReleve de compte janvier");
        assert_eq!(extraction.attempts.len(), 3);
        assert!(extraction.attempts[2].success);
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_ocr_of_every_page_failing_is_exhausted() {
        let tools_dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let config = ocr_config(tools_dir.path(), scratch.path(), "exit 1");

        let extraction = PdfExtractor.extract(&scanned_pdf(tools_dir.path()), &config);

        assert!(!extraction.ok);
        assert_eq!(extraction.attempts[2].parser_name, "pdf-ocr");
        assert!(!extraction.attempts[2].success);
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_rasterizer_failure_cleans_up_partial_pages() {
        let tools_dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let mut config = ocr_config(tools_dir.path(), scratch.path(), "echo never reached");
        config.pdf.rasterizer = stubs::script(
            tools_dir.path(),
            "broken-rasterizer",
            "[ -n \"$5\" ] || exit 0\n: > \"$5-1.png\"\necho 'Syntax Error' >&2\nexit 1",
        )
        .display()
        .to_string();

        let extraction = PdfExtractor.extract(&scanned_pdf(tools_dir.path()), &config);

        assert!(!extraction.ok);
        let error = extraction.attempts[2].error.as_deref().unwrap_or_default();
        assert!(error.contains("Syntax Error"), "{}", error);
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }
}
