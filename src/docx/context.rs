use std::collections::HashMap;
use std::rc::Rc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use roxmltree::Node;

use crate::archive::Archive;
use crate::model::{ListKind, Relationship};
use crate::opc::{file_name, parse_relationships, rels_path_for, resolve_target};

use super::styles::StyleIndex;
use super::{DOCUMENT_PART, REL_NS, WML_NS, assemble, is_wml, wml, wml_attr};

const NUMBERING_PART: &str = "word/numbering.xml";
const MEDIA_DIR: &str = "word/media/";

/// Numbering definitions from `word/numbering.xml`.
#[derive(Clone, Debug, Default)]
pub struct NumberingIndex {
    /// List kind keyed `"{abstractNumId}-{ilvl}"`.
    pub formats: HashMap<String, ListKind>,
    /// `w:num` instance id → abstract numbering id.
    pub instances: HashMap<String, String>,
}

impl NumberingIndex {
    pub fn parse(xml_content: &str) -> Self {
        let mut index = NumberingIndex::default();
        let Ok(xml) = roxmltree::Document::parse(xml_content) else {
            log::warn!("unreadable {NUMBERING_PART}, list paragraphs fall back to bullets");
            return index;
        };

        for node in xml.root_element().children() {
            if node.tag_name().namespace() != Some(WML_NS) {
                continue;
            }
            match node.tag_name().name() {
                "abstractNum" => {
                    let Some(abs_id) = node.attribute((WML_NS, "abstractNumId")) else {
                        continue;
                    };
                    for lvl in node.children().filter(|n| is_wml(*n, "lvl")) {
                        let Some(level) = lvl
                            .attribute((WML_NS, "ilvl"))
                            .and_then(|v| v.parse::<u8>().ok())
                        else {
                            continue;
                        };
                        let Some(num_fmt) = wml_attr(lvl, "numFmt") else {
                            continue;
                        };
                        let kind = if num_fmt == "bullet" {
                            ListKind::Bullet
                        } else {
                            ListKind::Ordered
                        };
                        index.formats.insert(format!("{abs_id}-{level}"), kind);
                    }
                }
                "num" => {
                    let Some(num_id) = node.attribute((WML_NS, "numId")) else {
                        continue;
                    };
                    let Some(abs_id) = wml_attr(node, "abstractNumId") else {
                        continue;
                    };
                    index.instances.insert(num_id.to_string(), abs_id.to_string());
                }
                _ => {}
            }
        }
        index
    }

    /// List kind for a paragraph's `numId`/`ilvl`. An instance id that has no
    /// `w:num` entry is tried as an abstract id.
    pub fn resolve(&self, num_id: &str, level: u8) -> Option<ListKind> {
        let abs_id = self.instances.get(num_id).map(String::as_str).unwrap_or(num_id);
        self.formats.get(&format!("{abs_id}-{level}")).copied()
    }
}

fn sniff_mime(name: &str, data: &[u8]) -> &'static str {
    if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        return "image/png";
    }
    if data.starts_with(&[0xFF, 0xD8]) {
        return "image/jpeg";
    }
    if data.starts_with(b"GIF8") {
        return "image/gif";
    }
    let ext = name.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "tif" | "tiff" => "image/tiff",
        "webp" => "image/webp",
        "emf" => "image/x-emf",
        "wmf" => "image/x-wmf",
        _ => "application/octet-stream",
    }
}

/// Every file under `word/media/` as a data URI keyed by its file name.
fn collect_media(archive: &Archive) -> HashMap<String, String> {
    let mut media = HashMap::new();
    for name in archive.names().filter(|n| n.starts_with(MEDIA_DIR)) {
        let Some(data) = archive.get(name) else {
            continue;
        };
        let uri = format!(
            "data:{};base64,{}",
            sniff_mime(name, data),
            STANDARD.encode(data)
        );
        media.insert(file_name(name).to_string(), uri);
    }
    media
}

/// Lookup tables shared by every formatting call for one part.
///
/// Built once per request before any paragraph is converted, then only
/// read.
#[derive(Debug, Default)]
pub struct ParseContext {
    /// Image data URIs keyed by media file name, shared with the header and
    /// footer contexts.
    pub media: Rc<HashMap<String, String>>,
    pub relationships: HashMap<String, Relationship>,
    pub numbering: NumberingIndex,
    pub styles: StyleIndex,
    pub header_html: String,
    pub footer_html: String,
}

impl ParseContext {
    /// Context for `word/document.xml`, including its rendered header and
    /// footer.
    pub fn build(archive: &Archive, body: Node) -> Self {
        let media = Rc::new(collect_media(archive));
        let numbering = archive
            .text(NUMBERING_PART)
            .map(|xml| NumberingIndex::parse(&xml))
            .unwrap_or_default();
        let styles = archive
            .text(super::styles::STYLES_PART)
            .map(|xml| StyleIndex::parse(&xml))
            .unwrap_or_default();

        let mut ctx = Self::for_part(archive, DOCUMENT_PART, &media, numbering, styles);

        let section = body.children().filter(|n| is_wml(*n, "sectPr")).last();
        let header_part = ctx.section_part(section, "headerReference", "word/header1.xml", archive);
        let footer_part = ctx.section_part(section, "footerReference", "word/footer1.xml", archive);
        ctx.header_html = header_part
            .map(|part| ctx.render_part(archive, &part, &media))
            .unwrap_or_default();
        ctx.footer_html = footer_part
            .map(|part| ctx.render_part(archive, &part, &media))
            .unwrap_or_default();
        ctx
    }

    fn for_part(
        archive: &Archive,
        part_path: &str,
        media: &Rc<HashMap<String, String>>,
        numbering: NumberingIndex,
        styles: StyleIndex,
    ) -> Self {
        let relationships = archive
            .text(&rels_path_for(part_path))
            .map(|xml| parse_relationships(&xml))
            .unwrap_or_default();

        ParseContext {
            media: Rc::clone(media),
            relationships,
            numbering,
            styles,
            header_html: String::new(),
            footer_html: String::new(),
        }
    }

    /// Part path of the section's `default` header or footer, falling back to
    /// its first reference and then to the conventional part name.
    fn section_part(
        &self,
        section: Option<Node>,
        reference: &str,
        conventional: &str,
        archive: &Archive,
    ) -> Option<String> {
        let references: Vec<Node> = section
            .map(|s| s.children().filter(|n| is_wml(*n, reference)).collect())
            .unwrap_or_default();
        let chosen = references
            .iter()
            .find(|n| n.attribute((WML_NS, "type")) == Some("default"))
            .or(references.first());

        if let Some(rel) = chosen
            .and_then(|n| n.attribute((REL_NS, "id")))
            .and_then(|id| self.relationships.get(id))
        {
            let path = resolve_target(DOCUMENT_PART, &rel.target);
            if archive.contains(&path) {
                return Some(path);
            }
        }
        archive.contains(conventional).then(|| conventional.to_string())
    }

    fn render_part(
        &self,
        archive: &Archive,
        part_path: &str,
        media: &Rc<HashMap<String, String>>,
    ) -> String {
        let Some(xml_content) = archive.text(part_path) else {
            return String::new();
        };
        let xml = match roxmltree::Document::parse(&xml_content) {
            Ok(xml) => xml,
            Err(e) => {
                log::warn!("skipping {part_path}: {e}");
                return String::new();
            }
        };
        let part_ctx = Self::for_part(
            archive,
            part_path,
            media,
            self.numbering.clone(),
            self.styles.clone(),
        );
        assemble(xml.root_element(), &part_ctx)
    }

    /// Data URI for a drawing's embed id: the media file its relationship
    /// points at, or a media file named like the id itself.
    pub fn image(&self, rel_id: &str) -> Option<&str> {
        let by_relationship = self
            .relationships
            .get(rel_id)
            .filter(|rel| !rel.external)
            .and_then(|rel| self.media.get(file_name(&rel.target)));
        by_relationship
            .or_else(|| self.media.get(rel_id))
            .map(String::as_str)
    }

    pub fn hyperlink_target(&self, rel_id: &str) -> Option<&str> {
        self.relationships.get(rel_id).map(|rel| rel.target.as_str())
    }

    /// List kind for a numbered paragraph; unknown definitions render as
    /// bullets.
    pub fn list_kind(&self, num_id: &str, level: u8) -> ListKind {
        self.numbering
            .resolve(num_id, level)
            .unwrap_or(ListKind::Bullet)
    }
}

pub(super) fn numbering_reference<'a>(ppr: Node<'a, 'a>) -> Option<(&'a str, u8)> {
    let num_pr = wml(ppr, "numPr")?;
    let num_id = wml_attr(num_pr, "numId")?;
    let level = wml_attr(num_pr, "ilvl")
        .and_then(|v| v.parse::<u8>().ok())
        .unwrap_or(0);
    Some((num_id, level))
}
