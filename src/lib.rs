mod archive;
mod docx;
mod error;
mod format;
mod html;
mod model;
mod opc;
pub mod server;
mod xlsx;

pub use archive::Archive;
pub use error::Error;
pub use format::{
    FileFormat, SUPPORTED_TYPES, detect, legacy_notice, received_type, text_to_html,
};
pub use tokio_util::sync::CancellationToken;

use std::time::{Duration, Instant};

/// Largest inflated size accepted for a single archive member.
pub const DEFAULT_MAX_ENTRY_BYTES: usize = 256 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct ParseOptions {
    pub max_entry_bytes: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
        }
    }
}

fn log_timing(kind: &str, t_extract: Duration, t_total: Duration, members: usize, html: &str) {
    log::info!(
        "Timing ({kind}): extract={:.1}ms, convert={:.1}ms, total={:.1}ms ({members} members, output {} bytes)",
        t_extract.as_secs_f64() * 1000.0,
        (t_total - t_extract).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        html.len(),
    );
}

pub fn convert_docx_bytes(
    input: &[u8],
    options: &ParseOptions,
    cancel: &CancellationToken,
) -> Result<String, Error> {
    let t0 = Instant::now();

    let archive = Archive::read_filtered(input, options, cancel, docx::is_docx_part)?;
    let t_extract = t0.elapsed();

    let html = docx::convert(&archive)?;
    log_timing("docx", t_extract, t0.elapsed(), archive.len(), &html);
    Ok(html)
}

pub fn convert_xlsx_bytes(
    input: &[u8],
    options: &ParseOptions,
    cancel: &CancellationToken,
) -> Result<String, Error> {
    let t0 = Instant::now();

    let archive = Archive::read_filtered(input, options, cancel, xlsx::is_xlsx_part)?;
    let t_extract = t0.elapsed();

    let html = xlsx::convert(&archive)?;
    log_timing("xlsx", t_extract, t0.elapsed(), archive.len(), &html);
    Ok(html)
}

/// Convert a downloaded file of a detected format to HTML.
pub fn convert_bytes(
    input: &[u8],
    format: FileFormat,
    options: &ParseOptions,
    cancel: &CancellationToken,
) -> Result<String, Error> {
    match format {
        FileFormat::Docx => convert_docx_bytes(input, options, cancel),
        FileFormat::Xlsx => convert_xlsx_bytes(input, options, cancel),
        FileFormat::Doc | FileFormat::Xls => Ok(legacy_notice(format)),
        FileFormat::Text => Ok(text_to_html(input)),
    }
}
