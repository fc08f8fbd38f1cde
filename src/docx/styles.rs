use std::collections::{HashMap, HashSet};

use roxmltree::Node;

use crate::html::css_number;

use super::context::numbering_reference;
use super::{WML_NS, is_wml, wml, wml_attr};

pub(super) const STYLES_PART: &str = "word/styles.xml";

const MAX_BASED_ON_DEPTH: usize = 8;

pub(super) fn twips_to_px(twips: f32) -> i64 {
    (twips / 20.0).round() as i64
}

pub(super) fn twips_to_pt(twips: f32) -> f32 {
    twips / 20.0
}

pub(super) fn emu_to_px(emu: f64) -> i64 {
    (emu / 914_400.0 * 96.0).round() as i64
}

pub(super) fn twips_attr(node: Node, attr: &str) -> Option<f32> {
    node.attribute((WML_NS, attr))
        .and_then(|v| v.parse::<f32>().ok())
}

/// `FF0000` → `#FF0000`; `auto` and malformed values yield nothing.
pub(super) fn css_color(val: &str) -> Option<String> {
    if val == "auto" || val.len() != 6 || !val.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("#{val}"))
}

pub(super) fn highlight_color(name: &str) -> Option<&'static str> {
    match name {
        "yellow" => Some("#FFFF00"),
        "green" => Some("#00FF00"),
        "cyan" => Some("#00FFFF"),
        "magenta" => Some("#FF00FF"),
        "red" => Some("#FF0000"),
        "blue" => Some("#0000FF"),
        "darkYellow" => Some("#808000"),
        "darkGreen" => Some("#008000"),
        "darkCyan" => Some("#008080"),
        "darkMagenta" => Some("#800080"),
        "darkRed" => Some("#800000"),
        "darkBlue" => Some("#000080"),
        "lightGray" => Some("#C0C0C0"),
        "darkGray" => Some("#808080"),
        "black" => Some("#000000"),
        "white" => Some("#FFFFFF"),
        _ => None,
    }
}

pub(super) fn css_alignment(val: &str) -> Option<&'static str> {
    match val {
        "left" | "start" => Some("left"),
        "center" => Some("center"),
        "right" | "end" => Some("right"),
        "both" | "distribute" => Some("justify"),
        _ => None,
    }
}

/// Block tag for a style id or name: `Heading1`/`Title` → `h1`,
/// `Heading2`/`Subtitle` → `h2`, … `Heading6` → `h6`.
pub(super) fn heading_tag(style: &str) -> Option<&'static str> {
    let normalized: String = style
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    match normalized.as_str() {
        "title" => return Some("h1"),
        "subtitle" => return Some("h2"),
        _ => {}
    }
    match normalized.strip_prefix("heading")? {
        "1" => Some("h1"),
        "2" => Some("h2"),
        "3" => Some("h3"),
        "4" => Some("h4"),
        "5" => Some("h5"),
        "6" => Some("h6"),
        _ => None,
    }
}

/// Inline CSS for a paragraph's alignment, indentation and spacing.
pub(super) fn paragraph_css(ppr: Node) -> Vec<String> {
    let mut css = Vec::new();

    if let Some(align) = wml_attr(ppr, "jc").and_then(css_alignment) {
        css.push(format!("text-align: {align}"));
    }

    if let Some(ind) = wml(ppr, "ind") {
        if let Some(left) = twips_attr(ind, "left").or_else(|| twips_attr(ind, "start")) {
            css.push(format!("margin-left: {}px", twips_to_px(left)));
        }
        if let Some(right) = twips_attr(ind, "right").or_else(|| twips_attr(ind, "end")) {
            css.push(format!("margin-right: {}px", twips_to_px(right)));
        }
        if let Some(first) = twips_attr(ind, "firstLine") {
            css.push(format!("text-indent: {}px", twips_to_px(first)));
        } else if let Some(hanging) = twips_attr(ind, "hanging") {
            css.push(format!("text-indent: {}px", -twips_to_px(hanging)));
        }
    }

    if let Some(spacing) = wml(ppr, "spacing") {
        if let Some(line) = twips_attr(spacing, "line") {
            match spacing.attribute((WML_NS, "lineRule")).unwrap_or("auto") {
                "exact" | "atLeast" => {
                    css.push(format!("line-height: {}pt", css_number(twips_to_pt(line))));
                }
                _ => css.push(format!("line-height: {}", css_number(line / 240.0))),
            }
        }
        if let Some(before) = twips_attr(spacing, "before") {
            css.push(format!("margin-top: {}pt", css_number(twips_to_pt(before))));
        }
        if let Some(after) = twips_attr(spacing, "after") {
            css.push(format!("margin-bottom: {}pt", css_number(twips_to_pt(after))));
        }
    }

    css
}

/// What the converter needs from `word/styles.xml`.
#[derive(Clone, Debug, Default)]
pub struct StyleIndex {
    names: HashMap<String, String>,
    based_on: HashMap<String, String>,
    numbering: HashMap<String, (String, u8)>,
    /// Table styles that format their first row differently.
    header_row_styles: HashSet<String>,
}

impl StyleIndex {
    pub fn parse(xml_content: &str) -> Self {
        let mut index = StyleIndex::default();
        let Ok(xml) = roxmltree::Document::parse(xml_content) else {
            log::warn!("unreadable {STYLES_PART}, using style ids only");
            return index;
        };

        for style in xml.root_element().children().filter(|n| is_wml(*n, "style")) {
            let Some(style_id) = style.attribute((WML_NS, "styleId")) else {
                continue;
            };
            if let Some(name) = wml_attr(style, "name") {
                index.names.insert(style_id.to_string(), name.to_string());
            }
            if let Some(parent) = wml_attr(style, "basedOn") {
                index.based_on.insert(style_id.to_string(), parent.to_string());
            }
            match style.attribute((WML_NS, "type")) {
                Some("paragraph") => {
                    if let Some((num_id, level)) = wml(style, "pPr").and_then(numbering_reference)
                    {
                        index
                            .numbering
                            .insert(style_id.to_string(), (num_id.to_string(), level));
                    }
                }
                Some("table") => {
                    let formats_first_row = style.children().any(|n| {
                        is_wml(n, "tblStylePr") && n.attribute((WML_NS, "type")) == Some("firstRow")
                    });
                    if formats_first_row {
                        index.header_row_styles.insert(style_id.to_string());
                    }
                }
                _ => {}
            }
        }
        index
    }

    /// The style followed by its `basedOn` ancestors.
    fn lineage<'s>(&'s self, style_id: &'s str) -> impl Iterator<Item = &'s str> + 's {
        std::iter::successors(Some(style_id), |id| {
            self.based_on.get(*id).map(String::as_str)
        })
        .take(MAX_BASED_ON_DEPTH)
    }

    pub fn heading_tag(&self, style_id: &str) -> &'static str {
        self.lineage(style_id)
            .find_map(|id| {
                heading_tag(id).or_else(|| self.names.get(id).and_then(|n| heading_tag(n)))
            })
            .unwrap_or("p")
    }

    /// Numbering inherited from a paragraph style.
    pub fn numbering(&self, style_id: &str) -> Option<(&str, u8)> {
        self.lineage(style_id)
            .find_map(|id| self.numbering.get(id))
            .map(|(num_id, level)| (num_id.as_str(), *level))
    }

    pub fn formats_header_row(&self, style_id: &str) -> bool {
        self.lineage(style_id)
            .any(|id| self.header_row_styles.contains(id))
    }
}
