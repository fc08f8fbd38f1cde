//! Package relationship parts shared by the DOCX and XLSX converters.

use std::collections::HashMap;

use crate::model::Relationship;

/// `word/document.xml` → `word/_rels/document.xml.rels`
pub(crate) fn rels_path_for(part_path: &str) -> String {
    match part_path.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part_path}.rels"),
    }
}

/// Resolve a relationship target against the part that declares it.
pub(crate) fn resolve_target(part_path: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = match part_path.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

pub(crate) fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

pub(crate) fn parse_relationships(xml_content: &str) -> HashMap<String, Relationship> {
    let mut rels = HashMap::new();
    let Ok(xml) = roxmltree::Document::parse(xml_content) else {
        log::warn!("unreadable relationship part");
        return rels;
    };
    for node in xml.root_element().children() {
        if node.tag_name().name() != "Relationship" {
            continue;
        }
        let (Some(id), Some(target)) = (node.attribute("Id"), node.attribute("Target")) else {
            continue;
        };
        let kind = node
            .attribute("Type")
            .and_then(|t| t.rsplit('/').next())
            .unwrap_or("")
            .to_string();
        let external = node
            .attribute("TargetMode")
            .is_some_and(|mode| mode.eq_ignore_ascii_case("External"));
        rels.insert(
            id.to_string(),
            Relationship {
                target: target.to_string(),
                kind,
                external,
            },
        );
    }
    rels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_and_absolute_targets() {
        assert_eq!(resolve_target("word/document.xml", "media/image1.png"), "word/media/image1.png");
        assert_eq!(resolve_target("word/document.xml", "/word/header1.xml"), "word/header1.xml");
        assert_eq!(
            resolve_target("xl/workbook.xml", "../xl/worksheets/sheet1.xml"),
            "xl/worksheets/sheet1.xml"
        );
    }

    #[test]
    fn rels_path_sits_next_to_the_part() {
        assert_eq!(rels_path_for("word/header2.xml"), "word/_rels/header2.xml.rels");
    }

    #[test]
    fn relationship_kind_is_the_type_suffix() {
        let rels = parse_relationships(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
                <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com" TargetMode="External"/>
            </Relationships>"#,
        );
        let link = &rels["rId1"];
        assert_eq!(link.kind, "hyperlink");
        assert!(link.external);
    }
}
