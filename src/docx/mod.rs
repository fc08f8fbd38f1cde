mod context;
mod paragraph;
mod styles;
mod table;

use roxmltree::Node;

use crate::archive::Archive;
use crate::error::Error;
use crate::html::has_visible_content;
use crate::model::ListKind;

use context::ParseContext;

pub(crate) const DOCUMENT_PART: &str = "word/document.xml";

pub(super) const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub(super) const DML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub(super) const WPD_NS: &str =
    "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
pub(super) const REL_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub(super) const VML_NS: &str = "urn:schemas-microsoft-com:vml";

const PAGE_BREAK: &str = "<hr class=\"page-break\" />";

/// Members of a DOCX package the converter reads.
pub fn is_docx_part(name: &str) -> bool {
    name.starts_with("word/")
}

pub(super) fn is_wml(node: Node, name: &str) -> bool {
    node.tag_name().name() == name && node.tag_name().namespace() == Some(WML_NS)
}

pub(super) fn wml<'a>(node: Node<'a, 'a>, name: &str) -> Option<Node<'a, 'a>> {
    node.children().find(|n| is_wml(*n, name))
}

pub(super) fn wml_attr<'a>(node: Node<'a, 'a>, child: &str) -> Option<&'a str> {
    wml(node, child).and_then(|n| n.attribute((WML_NS, "val")))
}

/// Parse a WML boolean toggle element (e.g., w:b, w:i, w:strike).
/// Present with no val or val != "0"/"false" means true.
pub(super) fn wml_bool(parent: Node, name: &str) -> Option<bool> {
    wml(parent, name).map(|n| {
        n.attribute((WML_NS, "val"))
            .is_none_or(|v| v != "0" && v != "false" && v != "off")
    })
}

/// Paragraphs and tables inside a content control are treated as if the
/// control were not there.
pub(super) fn flatten_sdt<'a>(parent: Node<'a, 'a>) -> Vec<Node<'a, 'a>> {
    let mut nodes = Vec::new();
    for child in parent.children() {
        if is_wml(child, "sdt") {
            if let Some(content) = wml(child, "sdtContent") {
                nodes.extend(flatten_sdt(content));
            }
        } else {
            nodes.push(child);
        }
    }
    nodes
}

enum Block<'a> {
    Paragraph(Node<'a, 'a>),
    Table(Node<'a, 'a>),
}

/// True when `node` sits inside a paragraph or table below `container`.
fn is_nested<'a>(node: Node<'a, 'a>, container: Node<'a, 'a>) -> bool {
    node.ancestors()
        .skip(1)
        .take_while(|a| *a != container)
        .any(|a| is_wml(a, "p") || is_wml(a, "tbl"))
}

/// Top-level paragraphs and tables of `container` in document order.
///
/// Both kinds are located by separate scans and tagged with their byte
/// offset in the part; the merged list is stable-sorted on that offset.
fn collect_blocks<'a>(container: Node<'a, 'a>) -> Vec<Block<'a>> {
    let paragraphs = container
        .descendants()
        .filter(|n| is_wml(*n, "p") && !is_nested(*n, container))
        .map(|n| (n.range().start, Block::Paragraph(n)));
    let tables = container
        .descendants()
        .filter(|n| is_wml(*n, "tbl") && !is_nested(*n, container))
        .map(|n| (n.range().start, Block::Table(n)));

    let mut blocks: Vec<(usize, Block)> = paragraphs.chain(tables).collect();
    blocks.sort_by_key(|(offset, _)| *offset);
    blocks.into_iter().map(|(_, block)| block).collect()
}

fn close_list(html: &mut String, open: &mut Option<ListKind>) {
    if let Some(kind) = open.take() {
        html.push_str("</");
        html.push_str(kind.tag());
        html.push('>');
    }
}

/// Render the paragraphs and tables of a body, header or footer.
pub(crate) fn assemble(container: Node, ctx: &ParseContext) -> String {
    let mut html = String::new();
    let mut open_list: Option<ListKind> = None;

    for block in collect_blocks(container) {
        match block {
            Block::Table(node) => {
                close_list(&mut html, &mut open_list);
                html.push_str(&table::format_table(node, ctx));
            }
            Block::Paragraph(node) => {
                let para = paragraph::format_paragraph(node, ctx);
                if para.page_break {
                    close_list(&mut html, &mut open_list);
                    html.push_str(PAGE_BREAK);
                }
                match para.list {
                    Some(kind) => {
                        if open_list != Some(kind) {
                            close_list(&mut html, &mut open_list);
                            html.push('<');
                            html.push_str(kind.tag());
                            html.push('>');
                            open_list = Some(kind);
                        }
                        html.push_str("<li>");
                        html.push_str(&para.content);
                        html.push_str("</li>");
                    }
                    None => {
                        close_list(&mut html, &mut open_list);
                        if has_visible_content(&para.content) {
                            html.push_str(&para.to_html());
                        }
                    }
                }
            }
        }
    }

    close_list(&mut html, &mut open_list);
    html
}

/// Convert an extracted DOCX package to HTML.
pub fn convert(archive: &Archive) -> Result<String, Error> {
    if archive.is_empty() {
        return Err(Error::InvalidArchive("no ZIP members found".into()));
    }
    let xml_content = archive
        .text(DOCUMENT_PART)
        .ok_or_else(|| Error::MissingPart(DOCUMENT_PART.into()))?;
    let xml = roxmltree::Document::parse(&xml_content)?;
    let body = wml(xml.root_element(), "body")
        .ok_or_else(|| Error::malformed(DOCUMENT_PART, "missing w:body"))?;

    let ctx = ParseContext::build(archive, body);
    let body_html = assemble(body, &ctx);

    let mut html = String::with_capacity(
        body_html.len() + ctx.header_html.len() + ctx.footer_html.len() + 64,
    );
    if !ctx.header_html.is_empty() {
        html.push_str("<div class=\"document-header\">");
        html.push_str(&ctx.header_html);
        html.push_str("</div>");
    }
    html.push_str(&body_html);
    if !ctx.footer_html.is_empty() {
        html.push_str("<div class=\"document-footer\">");
        html.push_str(&ctx.footer_html);
        html.push_str("</div>");
    }
    Ok(html)
}
