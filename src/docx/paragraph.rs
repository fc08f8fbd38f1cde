use std::ops::Range;

use roxmltree::Node;

use crate::html::{css_number, escape_attr, escape_text, style_attr};
use crate::model::ParagraphResult;

use super::context::{ParseContext, numbering_reference};
use super::styles::{css_color, emu_to_px, highlight_color, paragraph_css};
use super::{DML_NS, REL_NS, VML_NS, WML_NS, WPD_NS, is_wml, wml, wml_attr, wml_bool};

const MC_NS: &str = "http://schemas.openxmlformats.org/markup-compatibility/2006";

/// Schemes a converted hyperlink may point at.
const SAFE_SCHEMES: &[&str] = &["http", "https", "mailto", "tel", "ftp"];

/// Sizes the body text usually has; spans only carry other sizes.
const DEFAULT_FONT_SIZES: [f32; 2] = [11.0, 12.0];

enum Inline<'a> {
    Hyperlink(Node<'a, 'a>),
    Image(Node<'a, 'a>),
    Run(Node<'a, 'a>),
}

fn owning_paragraph<'a>(node: Node<'a, 'a>) -> Option<Node<'a, 'a>> {
    node.ancestors().skip(1).find(|a| is_wml(*a, "p"))
}

fn owned_by(node: Node, para: Node) -> bool {
    owning_paragraph(node) == Some(para)
}

fn within(node: Node, spans: &[Range<usize>]) -> bool {
    let range = node.range();
    spans
        .iter()
        .any(|outer| outer.start <= range.start && range.end <= outer.end)
}

/// `mc:Fallback` repeats the `mc:Choice` content for older readers.
fn in_fallback(node: Node) -> bool {
    node.ancestors().any(|a| {
        a.tag_name().name() == "Fallback" && a.tag_name().namespace() == Some(MC_NS)
    })
}

fn is_image_node(node: Node) -> bool {
    is_wml(node, "drawing") || is_wml(node, "pict")
}

/// Hyperlinks, images and runs of `para` found under `scope`, in document
/// order.
///
/// Each kind is found by its own scan and tagged with its byte offset;
/// runs falling inside a hyperlink or image span are dropped before the
/// offset sort.
fn collect_inlines<'a>(
    scope: Node<'a, 'a>,
    para: Node<'a, 'a>,
    with_links: bool,
) -> Vec<Inline<'a>> {
    let hyperlinks: Vec<Node> = if with_links {
        scope
            .descendants()
            .filter(|n| is_wml(*n, "hyperlink") && owned_by(*n, para))
            .filter(|n| {
                !n.ancestors()
                    .skip(1)
                    .take_while(|a| *a != scope)
                    .any(|a| is_wml(a, "hyperlink"))
            })
            .collect()
    } else {
        Vec::new()
    };
    let link_spans: Vec<Range<usize>> = hyperlinks.iter().map(|n| n.range()).collect();

    let images: Vec<Node> = scope
        .descendants()
        .filter(|n| is_image_node(*n) && owned_by(*n, para) && !in_fallback(*n))
        .filter(|n| !within(*n, &link_spans))
        .collect();
    let image_spans: Vec<Range<usize>> = images.iter().map(|n| n.range()).collect();

    let runs = scope.descendants().filter(|n| {
        is_wml(*n, "r")
            && owned_by(*n, para)
            && !within(*n, &link_spans)
            && !within(*n, &image_spans)
    });

    let mut inlines: Vec<(usize, Inline)> = hyperlinks
        .into_iter()
        .map(|n| (n.range().start, Inline::Hyperlink(n)))
        .chain(images.into_iter().map(|n| (n.range().start, Inline::Image(n))))
        .chain(runs.map(|n| (n.range().start, Inline::Run(n))))
        .collect();
    inlines.sort_by_key(|(offset, _)| *offset);
    inlines.into_iter().map(|(_, inline)| inline).collect()
}

fn render_inlines(scope: Node, para: Node, ctx: &ParseContext, with_links: bool) -> String {
    collect_inlines(scope, para, with_links)
        .into_iter()
        .map(|inline| match inline {
            Inline::Hyperlink(node) => render_hyperlink(node, para, ctx),
            Inline::Image(node) => render_image(node, ctx),
            Inline::Run(node) => render_run(node),
        })
        .collect()
}

fn is_safe_href(href: &str) -> bool {
    let href = href.trim();
    if href.is_empty() {
        return false;
    }
    let scheme_end = href.find(|c: char| matches!(c, ':' | '/' | '?' | '#'));
    match scheme_end {
        Some(idx) if href[idx..].starts_with(':') => {
            let scheme = href[..idx].to_ascii_lowercase();
            SAFE_SCHEMES.contains(&scheme.as_str())
        }
        _ => true,
    }
}

fn render_hyperlink(link: Node, para: Node, ctx: &ParseContext) -> String {
    let content = render_inlines(link, para, ctx, false);
    let target = link
        .attribute((REL_NS, "id"))
        .and_then(|id| ctx.hyperlink_target(id));
    let anchor = link.attribute((WML_NS, "anchor"));
    let href = match (target, anchor) {
        (Some(target), Some(anchor)) => Some(format!("{target}#{anchor}")),
        (Some(target), None) => Some(target.to_string()),
        (None, Some(anchor)) => Some(format!("#{anchor}")),
        (None, None) => None,
    };

    match href {
        Some(href) if is_safe_href(&href) => format!(
            "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{content}</a>",
            escape_attr(href.trim())
        ),
        Some(href) => {
            log::debug!("rendering hyperlink to {href:?} as text");
            content
        }
        None => content,
    }
}

/// Length from a VML `style` value such as `width:96pt` in pixels.
fn vml_length_px(value: &str) -> Option<i64> {
    let value = value.trim();
    let (number, factor) = if let Some(v) = value.strip_suffix("pt") {
        (v, 96.0 / 72.0)
    } else if let Some(v) = value.strip_suffix("px") {
        (v, 1.0)
    } else if let Some(v) = value.strip_suffix("in") {
        (v, 96.0)
    } else if let Some(v) = value.strip_suffix("cm") {
        (v, 96.0 / 2.54)
    } else {
        (value, 1.0)
    };
    number
        .trim()
        .parse::<f64>()
        .ok()
        .map(|n| (n * factor).round() as i64)
}

struct ImageRef<'a> {
    rel_id: &'a str,
    size: Option<(i64, i64)>,
    alt: &'a str,
}

fn drawing_ref<'a>(drawing: Node<'a, 'a>) -> Option<ImageRef<'a>> {
    let container = drawing.children().find(|n| {
        matches!(n.tag_name().name(), "inline" | "anchor")
            && n.tag_name().namespace() == Some(WPD_NS)
    })?;
    let rel_id = container
        .descendants()
        .find(|n| n.tag_name().name() == "blip" && n.tag_name().namespace() == Some(DML_NS))
        .and_then(|n| n.attribute((REL_NS, "embed")))?;

    let extent = container.children().find(|n| {
        n.tag_name().name() == "extent" && n.tag_name().namespace() == Some(WPD_NS)
    });
    let emu = |attr: &str| {
        extent
            .and_then(|n| n.attribute(attr))
            .and_then(|v| v.parse::<f64>().ok())
    };
    let size = emu("cx").zip(emu("cy")).map(|(cx, cy)| (emu_to_px(cx), emu_to_px(cy)));

    let alt = container
        .children()
        .find(|n| n.tag_name().name() == "docPr" && n.tag_name().namespace() == Some(WPD_NS))
        .and_then(|n| n.attribute("descr"))
        .unwrap_or("");

    Some(ImageRef { rel_id, size, alt })
}

fn pict_ref<'a>(pict: Node<'a, 'a>) -> Option<ImageRef<'a>> {
    let image_data = pict.descendants().find(|n| {
        n.tag_name().name() == "imagedata" && n.tag_name().namespace() == Some(VML_NS)
    })?;
    let rel_id = image_data.attribute((REL_NS, "id"))?;

    let shape_style = image_data
        .parent()
        .and_then(|shape| shape.attribute("style"))
        .unwrap_or("");
    let mut width = None;
    let mut height = None;
    for declaration in shape_style.split(';') {
        let Some((key, value)) = declaration.split_once(':') else {
            continue;
        };
        match key.trim() {
            "width" => width = vml_length_px(value),
            "height" => height = vml_length_px(value),
            _ => {}
        }
    }

    let alt = image_data.attribute("title").unwrap_or("");
    Some(ImageRef {
        rel_id,
        size: width.zip(height),
        alt,
    })
}

fn render_image(node: Node, ctx: &ParseContext) -> String {
    let image = if is_wml(node, "drawing") {
        drawing_ref(node)
    } else {
        pict_ref(node)
    };
    let Some(image) = image else {
        return String::new();
    };
    let Some(src) = ctx.image(image.rel_id) else {
        log::debug!("no media for image relationship {}", image.rel_id);
        return String::new();
    };

    let css: Vec<String> = image
        .size
        .map(|(w, h)| vec![format!("width: {w}px"), format!("height: {h}px")])
        .unwrap_or_default();
    format!(
        "<img src=\"{src}\" alt=\"{}\"{} />",
        escape_attr(image.alt),
        style_attr(&css)
    )
}

fn span_css(rpr: Node) -> Vec<String> {
    let mut css = Vec::new();

    if let Some(color) = wml_attr(rpr, "color").and_then(css_color) {
        css.push(format!("color: {color}"));
    }

    if let Some(half_points) = wml_attr(rpr, "sz").and_then(|v| v.parse::<f32>().ok()) {
        let points = half_points / 2.0;
        if !DEFAULT_FONT_SIZES.contains(&points) {
            css.push(format!("font-size: {}pt", css_number(points)));
        }
    }

    let font = wml(rpr, "rFonts").and_then(|fonts| {
        fonts
            .attribute((WML_NS, "ascii"))
            .or_else(|| fonts.attribute((WML_NS, "hAnsi")))
    });
    if let Some(font) = font {
        let name: String = font.chars().filter(|c| *c != '\'').collect();
        css.push(format!("font-family: '{name}'"));
    }

    let highlight = wml_attr(rpr, "highlight").and_then(highlight_color);
    let shading = wml(rpr, "shd")
        .and_then(|shd| shd.attribute((WML_NS, "fill")))
        .and_then(css_color);
    if let Some(background) = highlight.map(str::to_string).or(shading) {
        css.push(format!("background-color: {background}"));
    }

    css
}

fn wrap(tag: &str, inner: String) -> String {
    format!("<{tag}>{inner}</{tag}>")
}

fn render_run(run: Node) -> String {
    let mut text = String::new();
    for child in run.children() {
        if child.tag_name().namespace() != Some(WML_NS) {
            continue;
        }
        match child.tag_name().name() {
            "t" => text.push_str(&escape_text(child.text().unwrap_or(""))),
            "tab" => text.push_str("&emsp;"),
            "br" if child.attribute((WML_NS, "type")) != Some("page") => text.push_str("<br/>"),
            "cr" => text.push_str("<br/>"),
            "noBreakHyphen" => text.push('-'),
            _ => {}
        }
    }
    if text.is_empty() {
        return text;
    }
    let Some(rpr) = wml(run, "rPr") else {
        return text;
    };

    let css = span_css(rpr);
    let mut html = if css.is_empty() {
        text
    } else {
        format!("<span{}>{text}</span>", style_attr(&css))
    };

    match wml_attr(rpr, "vertAlign") {
        Some("superscript") => html = wrap("sup", html),
        Some("subscript") => html = wrap("sub", html),
        _ => {}
    }
    if wml_bool(rpr, "b") == Some(true) {
        html = wrap("strong", html);
    }
    if wml_bool(rpr, "i") == Some(true) {
        html = wrap("em", html);
    }
    let underline = wml(rpr, "u").is_some_and(|u| {
        u.attribute((WML_NS, "val"))
            .is_none_or(|v| !matches!(v, "none" | "0" | "false"))
    });
    if underline {
        html = wrap("u", html);
    }
    if wml_bool(rpr, "strike") == Some(true) || wml_bool(rpr, "dstrike") == Some(true) {
        html = wrap("s", html);
    }
    html
}

fn has_page_break(para: Node, ppr: Option<Node>) -> bool {
    if ppr.and_then(|p| wml_bool(p, "pageBreakBefore")) == Some(true) {
        return true;
    }
    para.descendants().any(|n| {
        is_wml(n, "br")
            && n.attribute((WML_NS, "type")) == Some("page")
            && owned_by(n, para)
    })
}

/// Convert one `w:p` into its block tag, style and inner HTML.
pub(super) fn format_paragraph(para: Node, ctx: &ParseContext) -> ParagraphResult {
    let ppr = wml(para, "pPr");
    let style_id = ppr.and_then(|p| wml_attr(p, "pStyle"));
    let tag = style_id
        .map(|id| ctx.styles.heading_tag(id))
        .unwrap_or("p");

    // Outline numbering on heading styles does not make headings list items.
    let numbering = match ppr.and_then(numbering_reference) {
        Some(direct) => Some(direct),
        None if tag == "p" => style_id.and_then(|id| ctx.styles.numbering(id)),
        None => None,
    };
    let list = numbering
        .filter(|(num_id, _)| *num_id != "0")
        .map(|(num_id, level)| ctx.list_kind(num_id, level));

    let style = ppr
        .map(|p| style_attr(&paragraph_css(p)))
        .unwrap_or_default();

    ParagraphResult {
        tag,
        style,
        content: render_inlines(para, para, ctx, true),
        list,
        page_break: has_page_break(para, ppr),
    }
}
