#![allow(dead_code)]

use std::io::{Cursor, Write};

use parse_document::{CancellationToken, ParseOptions};
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const WP_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const A_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const MC_NS: &str = "http://schemas.openxmlformats.org/markup-compatibility/2006";
const SML_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const PKG_RELS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Smallest valid PNG: a 1x1 transparent pixel.
pub const PNG_1X1: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

pub fn options() -> ParseOptions {
    ParseOptions::default()
}

pub fn token() -> CancellationToken {
    CancellationToken::new()
}

/// In-memory ZIP package written with the `zip` crate.
#[derive(Default)]
pub struct Package {
    parts: Vec<(String, Vec<u8>)>,
    method: Option<CompressionMethod>,
}

impl Package {
    pub fn new() -> Self {
        Package::default()
    }

    pub fn stored(mut self) -> Self {
        self.method = Some(CompressionMethod::Stored);
        self
    }

    pub fn part(mut self, name: &str, content: impl AsRef<[u8]>) -> Self {
        self.parts.push((name.to_string(), content.as_ref().to_vec()));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(self.method.unwrap_or(CompressionMethod::Deflated));
        for (name, content) in &self.parts {
            writer.start_file(name.as_str(), options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }
}

/// `word/document.xml` around the given body content.
pub fn document_xml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{W_NS}" xmlns:r="{R_NS}" xmlns:wp="{WP_NS}" xmlns:a="{A_NS}" xmlns:mc="{MC_NS}"><w:body>{body}</w:body></w:document>"#
    )
}

/// Part with a WML root element, e.g. `w:hdr` or `w:numbering`.
pub fn wml_part(root: &str, content: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:{root} xmlns:w="{W_NS}" xmlns:r="{R_NS}" xmlns:wp="{WP_NS}" xmlns:a="{A_NS}">{content}</w:{root}>"#
    )
}

/// Relationship part from `(id, type suffix, target)` triples; `http`
/// targets are marked external.
pub fn rels_xml(rels: &[(&str, &str, &str)]) -> String {
    let mut xml = format!(r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="{PKG_RELS_NS}">"#);
    for (id, kind, target) in rels {
        let mode = if target.starts_with("http") {
            r#" TargetMode="External""#
        } else {
            ""
        };
        xml.push_str(&format!(
            r#"<Relationship Id="{id}" Type="{REL_TYPE}/{kind}" Target="{target}"{mode}/>"#
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

pub fn para(text: &str) -> String {
    format!("<w:p><w:r><w:t>{text}</w:t></w:r></w:p>")
}

pub fn list_para(text: &str, num_id: &str) -> String {
    format!(
        r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="{num_id}"/></w:numPr></w:pPr><w:r><w:t>{text}</w:t></w:r></w:p>"#
    )
}

/// Numbering part with abstract 0 as bullets (num 1) and abstract 1 as
/// decimal (num 2).
pub fn numbering_xml() -> String {
    wml_part(
        "numbering",
        r#"<w:abstractNum w:abstractNumId="0"><w:lvl w:ilvl="0"><w:numFmt w:val="bullet"/></w:lvl></w:abstractNum>
<w:abstractNum w:abstractNumId="1"><w:lvl w:ilvl="0"><w:numFmt w:val="decimal"/></w:lvl></w:abstractNum>
<w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num>
<w:num w:numId="2"><w:abstractNumId w:val="1"/></w:num>"#,
    )
}

/// Inline drawing referencing `rel_id` with the given EMU extent.
pub fn drawing(rel_id: &str, cx: u64, cy: u64) -> String {
    format!(
        r#"<w:r><w:drawing><wp:inline><wp:extent cx="{cx}" cy="{cy}"/><wp:docPr id="1" name="Picture 1" descr="logo"/><a:graphic><a:graphicData><a:blip r:embed="{rel_id}"/></a:graphicData></a:graphic></wp:inline></w:drawing></w:r>"#
    )
}

pub fn docx(body: &str) -> Package {
    Package::new().part("word/document.xml", document_xml(body))
}

pub fn convert_docx(package: &Package) -> String {
    parse_document::convert_docx_bytes(&package.build(), &options(), &token())
        .expect("docx conversion failed")
}

/// XLSX with a shared-string table and one worksheet built from rows of
/// `(cell reference, value)`; values starting with `#` are shared-string
/// indices.
pub fn xlsx(shared: &[&str], rows: &[&[(&str, &str)]]) -> Package {
    let mut sst = format!(r#"<sst xmlns="{SML_NS}">"#);
    for value in shared {
        sst.push_str(&format!("<si><t>{value}</t></si>"));
    }
    sst.push_str("</sst>");

    let mut sheet = format!(r#"<worksheet xmlns="{SML_NS}"><sheetData>"#);
    for (index, cells) in rows.iter().enumerate() {
        sheet.push_str(&format!(r#"<row r="{}">"#, index + 1));
        for (reference, value) in cells.iter() {
            match value.strip_prefix('#') {
                Some(idx) => sheet.push_str(&format!(r#"<c r="{reference}" t="s"><v>{idx}</v></c>"#)),
                None => sheet.push_str(&format!(r#"<c r="{reference}"><v>{value}</v></c>"#)),
            }
        }
        sheet.push_str("</row>");
    }
    sheet.push_str("</sheetData></worksheet>");

    Package::new()
        .part("xl/sharedStrings.xml", sst)
        .part("xl/worksheets/sheet1.xml", sheet)
}
