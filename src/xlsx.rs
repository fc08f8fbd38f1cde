//! First worksheet of an XLSX package as an HTML table.
//!
//! Values are taken verbatim from the sheet: no number formats, dates or
//! formulas are evaluated.

use roxmltree::Node;

use crate::archive::Archive;
use crate::error::Error;
use crate::html::escape_text;
use crate::opc::{parse_relationships, rels_path_for, resolve_target};

const SML_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const SML_STRICT_NS: &str = "http://purl.oclc.org/ooxml/spreadsheetml/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const REL_STRICT_NS: &str = "http://purl.oclc.org/ooxml/officeDocument/relationships";

const WORKBOOK_PART: &str = "xl/workbook.xml";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const FIRST_SHEET_PART: &str = "xl/worksheets/sheet1.xml";
const WORKSHEETS_DIR: &str = "xl/worksheets/";

const NO_DATA: &str = "<p>No data found</p>";

/// Members of an XLSX package the converter reads.
pub fn is_xlsx_part(name: &str) -> bool {
    name.starts_with("xl/")
}

fn is_sml(node: Node, name: &str) -> bool {
    node.tag_name().name() == name
        && matches!(node.tag_name().namespace(), Some(SML_NS | SML_STRICT_NS))
}

fn sml<'a>(node: Node<'a, 'a>, name: &str) -> Option<Node<'a, 'a>> {
    node.children().find(|n| is_sml(*n, name))
}

/// Text of a string item, rich runs concatenated and phonetic hints left out.
fn item_text(item: Node) -> String {
    item.descendants()
        .filter(|n| is_sml(*n, "t"))
        .filter(|t| !t.ancestors().any(|a| is_sml(a, "rPh")))
        .filter_map(|t| t.text())
        .collect()
}

pub(crate) fn parse_shared_strings(xml_content: &str) -> Vec<String> {
    let Ok(xml) = roxmltree::Document::parse(xml_content) else {
        log::warn!("unreadable {SHARED_STRINGS_PART}, string cells keep their indices");
        return Vec::new();
    };
    xml.root_element()
        .children()
        .filter(|n| is_sml(*n, "si"))
        .map(item_text)
        .collect()
}

/// Part path of the first sheet listed in the workbook.
fn first_sheet_part(archive: &Archive) -> Option<String> {
    let from_workbook = archive.text(WORKBOOK_PART).and_then(|xml_content| {
        let xml = roxmltree::Document::parse(&xml_content).ok()?;
        let sheet = sml(xml.root_element(), "sheets")?
            .children()
            .find(|n| is_sml(*n, "sheet"))?;
        let rel_id = sheet
            .attribute((REL_NS, "id"))
            .or_else(|| sheet.attribute((REL_STRICT_NS, "id")))?;
        let rels = parse_relationships(&archive.text(&rels_path_for(WORKBOOK_PART))?);
        let path = resolve_target(WORKBOOK_PART, &rels.get(rel_id)?.target);
        archive.contains(&path).then_some(path)
    });
    if from_workbook.is_some() {
        return from_workbook;
    }

    if archive.contains(FIRST_SHEET_PART) {
        return Some(FIRST_SHEET_PART.to_string());
    }
    let mut sheets: Vec<&str> = archive
        .names()
        .filter(|n| n.starts_with(WORKSHEETS_DIR) && n.ends_with(".xml"))
        .filter(|n| !n[WORKSHEETS_DIR.len()..].contains('/'))
        .collect();
    sheets.sort_unstable();
    sheets.first().map(|s| s.to_string())
}

/// Last column a worksheet can address (`XFD`).
const MAX_COLUMN: usize = 16_383;

/// Zero-based column of a cell reference such as `AB12`, or `None` past
/// `XFD`.
fn column_index(reference: &str) -> Option<usize> {
    let letters: &str = reference
        .split(|c: char| c.is_ascii_digit())
        .next()
        .filter(|l| !l.is_empty())?;
    letters
        .chars()
        .try_fold(0usize, |acc, c| {
            if !c.is_ascii_alphabetic() {
                return None;
            }
            let digit = c.to_ascii_uppercase() as usize - 'A' as usize + 1;
            acc.checked_mul(26)?
                .checked_add(digit)
                .filter(|n| *n <= MAX_COLUMN + 1)
        })
        .map(|n| n - 1)
}

fn cell_value(cell: Node, shared: &[String]) -> String {
    let raw = sml(cell, "v").and_then(|v| v.text()).unwrap_or("");
    match cell.attribute("t") {
        Some("s") => raw
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|idx| shared.get(idx))
            .cloned()
            .unwrap_or_else(|| raw.to_string()),
        Some("inlineStr") => sml(cell, "is").map(item_text).unwrap_or_default(),
        _ => raw.to_string(),
    }
}

/// Rows of the sheet as `(column, value)` pairs in sheet order.
fn sheet_rows(sheet: Node, shared: &[String]) -> Vec<Vec<(usize, String)>> {
    let Some(data) = sml(sheet, "sheetData") else {
        return Vec::new();
    };
    data.children()
        .filter(|n| is_sml(*n, "row"))
        .map(|row| {
            let mut cells: Vec<(usize, String)> = Vec::new();
            for cell in row.children().filter(|n| is_sml(*n, "c")) {
                let next = cells.last().map_or(0, |(column, _)| column + 1);
                let column = match cell.attribute("r") {
                    Some(reference) if reference.starts_with(|c: char| c.is_ascii_alphabetic()) => {
                        match column_index(reference) {
                            Some(column) => column,
                            None => {
                                log::warn!("skipping cell {reference:?}: column out of range");
                                continue;
                            }
                        }
                    }
                    _ => next,
                };
                if column > MAX_COLUMN {
                    log::warn!("skipping cell past column XFD");
                    continue;
                }
                cells.push((column, cell_value(cell, shared)));
            }
            cells
        })
        .collect()
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Drop blank rows and the blank columns around the data, then lay every
/// row out to the same width.
fn normalize(rows: Vec<Vec<(usize, String)>>) -> Vec<Vec<String>> {
    let rows: Vec<Vec<(usize, String)>> = rows
        .into_iter()
        .filter(|cells| cells.iter().any(|(_, v)| !is_blank(v)))
        .collect();

    let filled = || {
        rows.iter()
            .flatten()
            .filter(|(_, v)| !is_blank(v))
            .map(|(column, _)| *column)
    };
    let (Some(first_column), Some(last_column)) = (filled().min(), filled().max()) else {
        return Vec::new();
    };
    let width = last_column + 1 - first_column;

    rows.into_iter()
        .map(|cells| {
            let mut values = vec![String::new(); width];
            for (column, value) in cells {
                if (first_column..=last_column).contains(&column) {
                    values[column - first_column] = value;
                }
            }
            values
        })
        .collect()
}

fn render_table(rows: &[Vec<String>]) -> String {
    let Some((header, body)) = rows.split_first() else {
        return NO_DATA.to_string();
    };

    let mut html = String::from("<table class=\"spreadsheet-table\"><thead><tr>");
    for value in header {
        html.push_str("<th>");
        html.push_str(&escape_text(value));
        html.push_str("</th>");
    }
    html.push_str("</tr></thead><tbody>");
    for row in body {
        html.push_str("<tr>");
        for value in row {
            html.push_str("<td>");
            html.push_str(&escape_text(value));
            html.push_str("</td>");
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");
    html
}

/// Convert an extracted XLSX package to HTML.
pub fn convert(archive: &Archive) -> Result<String, Error> {
    if archive.is_empty() {
        return Err(Error::InvalidArchive("no ZIP members found".into()));
    }
    let sheet_part =
        first_sheet_part(archive).ok_or_else(|| Error::MissingPart(FIRST_SHEET_PART.into()))?;
    let sheet_content = archive
        .text(&sheet_part)
        .ok_or_else(|| Error::MissingPart(sheet_part.clone()))?;
    let shared = archive
        .text(SHARED_STRINGS_PART)
        .map(|xml| parse_shared_strings(&xml))
        .unwrap_or_default();

    let sheet = roxmltree::Document::parse(&sheet_content)?;
    let rows = normalize(sheet_rows(sheet.root_element(), &shared));
    log::debug!("{sheet_part}: {} non-blank rows", rows.len());
    Ok(render_table(&rows))
}
