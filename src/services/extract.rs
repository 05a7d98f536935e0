//! Text extraction for uploaded evidence files.

use regex::Regex;
use scraper::{Html, Node, Selector};
use std::io::{Cursor, Read};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    PlainText,
    Html,
    Pdf,
    Docx,
    Unknown,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported document format")]
    Unsupported,

    #[error("failed to read DOCX archive: {0}")]
    Docx(#[from] zip::result::ZipError),

    #[error("failed to read DOCX body: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to extract PDF text: {0}")]
    Pdf(String),
}

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Decide how to read a document from its declared type, falling back to the file extension.
pub fn detect_format(content_type: Option<&str>, file_name: &str) -> DocumentFormat {
    let mime = content_type
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
        .unwrap_or_default();

    match mime.as_str() {
        "text/html" | "application/xhtml+xml" => return DocumentFormat::Html,
        "application/pdf" => return DocumentFormat::Pdf,
        DOCX_MIME => return DocumentFormat::Docx,
        "application/json" | "application/xml" => return DocumentFormat::PlainText,
        m if m.starts_with("text/") => return DocumentFormat::PlainText,
        _ => {}
    }

    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "txt" | "md" | "csv" | "json" => DocumentFormat::PlainText,
        "html" | "htm" => DocumentFormat::Html,
        "pdf" => DocumentFormat::Pdf,
        "docx" => DocumentFormat::Docx,
        _ => DocumentFormat::Unknown,
    }
}

/// Extract readable text. CPU-bound for PDF and DOCX; call from a blocking task.
pub fn extract_text(bytes: &[u8], format: DocumentFormat) -> Result<String, ExtractError> {
    match format {
        DocumentFormat::PlainText => Ok(String::from_utf8_lossy(bytes).into_owned()),
        DocumentFormat::Html => Ok(html_text(&String::from_utf8_lossy(bytes))),
        DocumentFormat::Pdf => {
            pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
        }
        DocumentFormat::Docx => docx_text(bytes),
        DocumentFormat::Unknown => match std::str::from_utf8(bytes) {
            Ok(text) => Ok(text.to_string()),
            Err(_) => Err(ExtractError::Unsupported),
        },
    }
}

fn html_text(source: &str) -> String {
    let document = Html::parse_document(source);
    let root = Selector::parse("body")
        .ok()
        .and_then(|body| document.select(&body).next())
        .unwrap_or_else(|| document.root_element());

    let mut parts = Vec::new();
    for node in root.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name()))
            .is_some_and(|name| matches!(name, "script" | "style" | "noscript"));
        let fragment = text.trim();
        if !hidden && !fragment.is_empty() {
            parts.push(fragment.to_string());
        }
    }
    parts.join(" ")
}

fn docx_tags() -> &'static (Regex, Regex) {
    static TAGS: OnceLock<(Regex, Regex)> = OnceLock::new();
    TAGS.get_or_init(|| {
        (
            Regex::new(r"</w:p>|<w:br\s*/>|<w:tab\s*/>").expect("paragraph pattern is valid"),
            Regex::new(r"<[^>]+>").expect("tag pattern is valid"),
        )
    })
}

fn docx_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut xml = String::new();
    archive.by_name("word/document.xml")?.read_to_string(&mut xml)?;

    let (breaks, tags) = docx_tags();
    let text = breaks.replace_all(&xml, "\n");
    let text = tags.replace_all(&text, "");

    Ok(text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&"))
}

/// Collapse runs of whitespace, keeping single line breaks between paragraphs.
pub fn collapse_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Keep at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Extract, normalize and bound a document preview. `None` when nothing readable remains.
pub fn preview_text(
    bytes: &[u8],
    content_type: Option<&str>,
    file_name: &str,
    max_chars: usize,
) -> Result<Option<String>, ExtractError> {
    let format = detect_format(content_type, file_name);
    let text = collapse_whitespace(&extract_text(bytes, format)?);
    let preview = truncate_chars(&text, max_chars);
    Ok((!preview.is_empty()).then(|| preview.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn format_prefers_content_type_then_extension() {
        assert_eq!(detect_format(Some("text/plain; charset=utf-8"), "x.pdf"), DocumentFormat::PlainText);
        assert_eq!(detect_format(Some("application/octet-stream"), "cv.PDF"), DocumentFormat::Pdf);
        assert_eq!(detect_format(None, "transcript.docx"), DocumentFormat::Docx);
        assert_eq!(detect_format(None, "blob"), DocumentFormat::Unknown);
    }

    #[test]
    fn plain_text_passes_through() {
        let preview = preview_text(b"Dean's list\n\n  2019   2020", Some("text/plain"), "t.txt", 100)
            .unwrap()
            .unwrap();
        assert_eq!(preview, "Dean's list\n2019 2020");
    }

    #[test]
    fn html_drops_scripts_and_markup() {
        let html = "<html><head><title>t</title></head><body><h1>Portfolio</h1><script>track()</script><p>Rust &amp; Go</p></body></html>";
        let preview = preview_text(html.as_bytes(), Some("text/html"), "p.html", 100)
            .unwrap()
            .unwrap();
        assert!(preview.contains("Portfolio"));
        assert!(preview.contains("Rust & Go"));
        assert!(!preview.contains("track()"));
    }

    #[test]
    fn docx_body_is_extracted() {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            let options = zip::write::SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Stored);
            writer.start_file("word/document.xml", options).unwrap();
            writer
                .write_all(b"<w:document><w:body><w:p><w:r><w:t>Grade: A</w:t></w:r></w:p><w:p><w:r><w:t>Algorithms &amp; Data</w:t></w:r></w:p></w:body></w:document>")
                .unwrap();
            writer.finish().unwrap();
        }

        let preview = preview_text(buffer.get_ref(), Some(DOCX_MIME), "t.docx", 100)
            .unwrap()
            .unwrap();
        assert_eq!(preview, "Grade: A\nAlgorithms & Data");
    }

    #[test]
    fn preview_is_truncated_on_char_boundary() {
        let preview = preview_text("héllo wörld".as_bytes(), Some("text/plain"), "a.txt", 4)
            .unwrap()
            .unwrap();
        assert_eq!(preview, "héll");
    }

    #[test]
    fn binary_of_unknown_type_is_unsupported() {
        let result = preview_text(&[0xff, 0xfe, 0x00, 0x9f], None, "blob", 100);
        assert!(matches!(result, Err(ExtractError::Unsupported)));
    }

    #[test]
    fn blank_documents_have_no_preview() {
        assert!(preview_text(b"   \n ", Some("text/plain"), "a.txt", 100).unwrap().is_none());
    }
}
