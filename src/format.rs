//! Source format detection and the converters that need no package parsing.

use std::fmt;
use std::path::Path;

use crate::html::escape_text;

const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Extensions reported back when a format is not accepted.
pub const SUPPORTED_TYPES: [&str; 5] = [".docx", ".doc", ".xlsx", ".xls", ".txt"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    Docx,
    Doc,
    Xlsx,
    Xls,
    Text,
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileFormat::Docx => "docx",
            FileFormat::Doc => "doc",
            FileFormat::Xlsx => "xlsx",
            FileFormat::Xls => "xls",
            FileFormat::Text => "txt",
        };
        f.write_str(name)
    }
}

fn extension(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

fn from_extension(path: &str) -> Option<FileFormat> {
    match extension(path)?.as_str() {
        "docx" => Some(FileFormat::Docx),
        "doc" => Some(FileFormat::Doc),
        "xlsx" => Some(FileFormat::Xlsx),
        "xls" => Some(FileFormat::Xls),
        "txt" => Some(FileFormat::Text),
        _ => None,
    }
}

fn from_mime(mime: &str) -> Option<FileFormat> {
    let mime = mime.trim().to_ascii_lowercase();
    // The OOXML types contain "word"/"excel"-like fragments too; match them first.
    if mime.contains("wordprocessingml") {
        Some(FileFormat::Docx)
    } else if mime.contains("spreadsheetml") {
        Some(FileFormat::Xlsx)
    } else if mime == "application/msword" {
        Some(FileFormat::Doc)
    } else if mime == "application/vnd.ms-excel" {
        Some(FileFormat::Xls)
    } else if mime.starts_with("text/plain") {
        Some(FileFormat::Text)
    } else {
        None
    }
}

/// Classify a download by its file extension, then its MIME type, then
/// correct the claim with the container magic: OLE bytes behind a DOCX/XLSX
/// claim are the legacy format, ZIP bytes behind a DOC/XLS claim are OOXML.
pub fn detect(mime: Option<&str>, path: &str, bytes: &[u8]) -> Option<FileFormat> {
    let claimed = from_extension(path).or_else(|| mime.and_then(from_mime))?;
    let format = match claimed {
        FileFormat::Docx if bytes.starts_with(&OLE_MAGIC) => FileFormat::Doc,
        FileFormat::Xlsx if bytes.starts_with(&OLE_MAGIC) => FileFormat::Xls,
        FileFormat::Doc if bytes.starts_with(ZIP_MAGIC) => FileFormat::Docx,
        FileFormat::Xls if bytes.starts_with(ZIP_MAGIC) => FileFormat::Xlsx,
        other => other,
    };
    if format != claimed {
        log::info!("{path}: claimed {claimed}, container is {format}");
    }
    Some(format)
}

/// What the caller sent, for the unsupported-type response.
pub fn received_type(mime: Option<&str>, path: &str) -> String {
    mime.filter(|m| !m.trim().is_empty())
        .map(str::to_string)
        .or_else(|| extension(path).map(|ext| format!(".{ext}")))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Explanation shown in place of a binary Office document.
pub fn legacy_notice(format: FileFormat) -> String {
    let (kind, modern) = match format {
        FileFormat::Xls => ("Excel spreadsheet", ".xlsx"),
        _ => ("Word document", ".docx"),
    };
    format!(
        "<div class=\"legacy-format-notice\">\
         <h2>Legacy {kind}</h2>\
         <p>This file uses the older binary .{format} format, which cannot be \
         converted for editing.</p>\
         <p>Open it in its original application and save it as {modern}, then \
         upload it again to view and edit its content here.</p>\
         </div>"
    )
}

/// One escaped `<p>` per line of text.
pub fn text_to_html(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
    text.lines()
        .map(|line| format!("<p>{}</p>", escape_text(line)))
        .collect()
}
