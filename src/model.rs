#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListKind {
    Bullet,
    Ordered,
}

impl ListKind {
    pub fn tag(self) -> &'static str {
        match self {
            ListKind::Bullet => "ul",
            ListKind::Ordered => "ol",
        }
    }
}

/// One `<Relationship>` of a package part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relationship {
    pub target: String,
    /// Last segment of the relationship type URI, e.g. `image` or `hyperlink`.
    pub kind: String,
    pub external: bool,
}

/// A converted paragraph before the assembler decides how to wrap it.
#[derive(Clone, Debug, Default)]
pub struct ParagraphResult {
    /// `p` or `h1`..`h6`.
    pub tag: &'static str,
    /// Inline `style` attribute (leading space included) or empty.
    pub style: String,
    /// Rendered runs without the block element.
    pub content: String,
    pub list: Option<ListKind>,
    pub page_break: bool,
}

impl ParagraphResult {
    pub fn to_html(&self) -> String {
        format!("<{tag}{}>{}</{tag}>", self.style, self.content, tag = self.tag)
    }
}
