mod common;

use common::*;
use parse_document::Error;

fn convert(package: &Package) -> String {
    parse_document::convert_xlsx_bytes(&package.build(), &options(), &token())
        .expect("xlsx conversion failed")
}

#[test]
fn blank_rows_do_not_count_toward_header_split() {
    let _ = env_logger::try_init();
    let package = xlsx(
        &["Name", "Qty", "Apple"],
        &[
            &[("A1", "#0"), ("B1", "#1")],
            &[("A2", ""), ("B2", " ")],
            &[("A3", "#2"), ("B3", "3")],
        ],
    );
    assert_eq!(
        convert(&package),
        "<table class=\"spreadsheet-table\">\
         <thead><tr><th>Name</th><th>Qty</th></tr></thead>\
         <tbody><tr><td>Apple</td><td>3</td></tr></tbody>\
         </table>"
    );
}

#[test]
fn sheet_without_rows_renders_placeholder() {
    let package = xlsx(&[], &[]);
    assert_eq!(convert(&package), "<p>No data found</p>");
}

#[test]
fn out_of_range_shared_index_falls_back_to_literal() {
    let package = xlsx(&["only"], &[&[("A1", "#0"), ("B1", "#9")]]);
    assert_eq!(
        convert(&package),
        "<table class=\"spreadsheet-table\"><thead><tr><th>only</th><th>9</th></tr></thead><tbody></tbody></table>"
    );
}

#[test]
fn cells_are_positioned_by_reference_and_padded() {
    let package = xlsx(
        &[],
        &[
            &[("A1", "a"), ("C1", "c")],
            &[("B2", "b")],
        ],
    );
    assert_eq!(
        convert(&package),
        "<table class=\"spreadsheet-table\">\
         <thead><tr><th>a</th><th></th><th>c</th></tr></thead>\
         <tbody><tr><td></td><td>b</td><td></td></tr></tbody>\
         </table>"
    );
}

#[test]
fn first_sheet_comes_from_the_workbook() {
    let sml = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
    let workbook = format!(
        r#"<workbook xmlns="{sml}" xmlns:r="{R_NS}"><sheets><sheet name="Summary" sheetId="2" r:id="rId2"/><sheet name="Raw" sheetId="1" r:id="rId1"/></sheets></workbook>"#
    );
    let sheet = |text: &str| {
        format!(
            r#"<worksheet xmlns="{sml}"><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>{text}</t></is></c></row></sheetData></worksheet>"#
        )
    };
    let package = Package::new()
        .part("xl/workbook.xml", workbook)
        .part(
            "xl/_rels/workbook.xml.rels",
            rels_xml(&[
                ("rId1", "worksheet", "worksheets/sheet1.xml"),
                ("rId2", "worksheet", "worksheets/summary.xml"),
            ]),
        )
        .part("xl/worksheets/sheet1.xml", sheet("raw"))
        .part("xl/worksheets/summary.xml", sheet("summary &amp; totals"));
    assert_eq!(
        convert(&package),
        "<table class=\"spreadsheet-table\"><thead><tr><th>summary &amp; totals</th></tr></thead><tbody></tbody></table>"
    );
}

#[test]
fn package_without_worksheet_is_an_error() {
    let package = Package::new().part("xl/workbook.xml", "<workbook/>");
    let result = parse_document::convert_xlsx_bytes(&package.build(), &options(), &token());
    assert!(matches!(result, Err(Error::MissingPart(_))), "{result:?}");
}

#[test]
fn cells_past_the_last_column_are_skipped() {
    let package = xlsx(
        &[],
        &[&[
            ("A1", "a"),
            ("AAAAAAAAAAAAAAA1", "overflow"),
            ("ZZZZZ1", "far"),
            ("B1", "b"),
        ]],
    );
    assert_eq!(
        convert(&package),
        "<table class=\"spreadsheet-table\"><thead><tr><th>a</th><th>b</th></tr></thead><tbody></tbody></table>"
    );
}

#[test]
fn blank_cell_in_the_last_column_keeps_the_table_narrow() {
    let package = xlsx(&[], &[&[("A1", "a"), ("XFD1", "")], &[("A2", "b")]]);
    assert_eq!(
        convert(&package),
        "<table class=\"spreadsheet-table\"><thead><tr><th>a</th></tr></thead><tbody><tr><td>b</td></tr></tbody></table>"
    );
}
