use roxmltree::Node;

use crate::html::{has_visible_content, style_attr};

use super::context::ParseContext;
use super::paragraph::format_paragraph;
use super::styles::{css_alignment, css_color};
use super::{WML_NS, flatten_sdt, is_wml, wml, wml_attr, wml_bool};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum VMerge {
    None,
    Restart,
    Continue,
}

struct Cell<'a> {
    node: Node<'a, 'a>,
    column: usize,
    span: usize,
    merge: VMerge,
}

fn on_off(value: &str) -> bool {
    matches!(value, "1" | "true" | "on")
}

fn cell_merge(tc_pr: Option<Node>) -> VMerge {
    match tc_pr.and_then(|p| wml(p, "vMerge")) {
        None => VMerge::None,
        Some(v) => match v.attribute((WML_NS, "val")) {
            Some("restart") => VMerge::Restart,
            _ => VMerge::Continue,
        },
    }
}

/// Widest grid a table can declare.
const MAX_GRID_COLUMNS: usize = 63;

fn grid_count(props: Option<Node>, name: &str) -> Option<usize> {
    props
        .and_then(|p| wml_attr(p, name))
        .and_then(|v| v.parse::<u64>().ok())
        .map(|n| n.min(MAX_GRID_COLUMNS as u64) as usize)
}

/// Cells of each row with their starting grid column.
fn grid_rows<'a>(table: Node<'a, 'a>) -> Vec<Vec<Cell<'a>>> {
    flatten_sdt(table)
        .into_iter()
        .filter(|n| is_wml(*n, "tr"))
        .map(|row| {
            let mut column = grid_count(wml(row, "trPr"), "gridBefore").unwrap_or(0);
            let mut cells = Vec::new();
            for node in flatten_sdt(row).into_iter().filter(|n| is_wml(*n, "tc")) {
                let tc_pr = wml(node, "tcPr");
                let span = grid_count(tc_pr, "gridSpan").unwrap_or(1).max(1);
                cells.push(Cell {
                    node,
                    column,
                    span,
                    merge: cell_merge(tc_pr),
                });
                column = column.saturating_add(span);
            }
            cells
        })
        .collect()
}

/// Rows covered by a `restart` cell: itself plus the continuation cells
/// directly below it in the same grid column.
fn row_span(rows: &[Vec<Cell>], row: usize, column: usize) -> usize {
    1 + rows[row + 1..]
        .iter()
        .take_while(|cells| {
            cells
                .iter()
                .any(|c| c.column == column && c.merge == VMerge::Continue)
        })
        .count()
}

fn header_row(table: Node, first_row: Option<Node>, ctx: &ParseContext) -> bool {
    let flagged = first_row
        .and_then(|row| wml(row, "trPr"))
        .and_then(|p| wml_bool(p, "tblHeader"))
        == Some(true);
    if flagged {
        return true;
    }

    let Some(tbl_pr) = wml(table, "tblPr") else {
        return false;
    };
    let Some(style_id) = wml_attr(tbl_pr, "tblStyle") else {
        return false;
    };
    let first_row_look = wml(tbl_pr, "tblLook").is_some_and(|look| {
        match look.attribute((WML_NS, "firstRow")) {
            Some(v) => on_off(v),
            // Older documents pack the flags into a hex bitmask.
            None => look
                .attribute((WML_NS, "val"))
                .and_then(|v| u16::from_str_radix(v, 16).ok())
                .is_some_and(|bits| bits & 0x0020 != 0),
        }
    });
    first_row_look && ctx.styles.formats_header_row(style_id)
}

fn cell_css(cell: Node) -> Vec<String> {
    let mut css = Vec::new();
    let tc_pr = wml(cell, "tcPr");

    let fill = tc_pr
        .and_then(|p| wml(p, "shd"))
        .and_then(|shd| shd.attribute((WML_NS, "fill")))
        .and_then(css_color);
    if let Some(fill) = fill {
        css.push(format!("background-color: {fill}"));
    }

    let valign = tc_pr.and_then(|p| wml_attr(p, "vAlign")).and_then(|v| match v {
        "top" => Some("top"),
        "center" => Some("middle"),
        "bottom" => Some("bottom"),
        _ => None,
    });
    if let Some(valign) = valign {
        css.push(format!("vertical-align: {valign}"));
    }

    let align = flatten_sdt(cell)
        .into_iter()
        .find(|n| is_wml(*n, "p"))
        .and_then(|p| wml(p, "pPr"))
        .and_then(|p| wml_attr(p, "jc"))
        .and_then(css_alignment);
    if let Some(align) = align {
        css.push(format!("text-align: {align}"));
    }

    css
}

/// Paragraph contents of a cell without their block tags, joined by `<br>`.
fn cell_content(cell: Node, ctx: &ParseContext) -> String {
    let parts: Vec<String> = flatten_sdt(cell)
        .into_iter()
        .filter(|n| is_wml(*n, "p"))
        .map(|p| format_paragraph(p, ctx).content)
        .filter(|content| has_visible_content(content))
        .collect();
    if parts.is_empty() {
        "&nbsp;".to_string()
    } else {
        parts.join("<br>")
    }
}

/// Convert one `w:tbl` into an HTML table.
pub(super) fn format_table(table: Node, ctx: &ParseContext) -> String {
    let rows = grid_rows(table);
    let first_row = flatten_sdt(table).into_iter().find(|n| is_wml(*n, "tr"));
    let header = header_row(table, first_row, ctx);

    let mut html = String::from("<table class=\"document-table\">");
    for (index, cells) in rows.iter().enumerate() {
        let tag = if index == 0 && header { "th" } else { "td" };
        html.push_str("<tr>");
        for cell in cells {
            if cell.merge == VMerge::Continue {
                continue;
            }
            html.push('<');
            html.push_str(tag);
            if cell.span > 1 {
                html.push_str(&format!(" colspan=\"{}\"", cell.span));
            }
            if cell.merge == VMerge::Restart {
                let rowspan = row_span(&rows, index, cell.column);
                if rowspan > 1 {
                    html.push_str(&format!(" rowspan=\"{rowspan}\""));
                }
            }
            html.push_str(&style_attr(&cell_css(cell.node)));
            html.push('>');
            html.push_str(&cell_content(cell.node, ctx));
            html.push_str("</");
            html.push_str(tag);
            html.push('>');
        }
        html.push_str("</tr>");
    }
    html.push_str("</table>");
    html
}
