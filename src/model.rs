//! In-memory container tree of a decoded DOCX template.
//!
//! Document → {body, headers, footers} → nodes. Paragraphs and table
//! structure are modelled; everything else is kept as verbatim XML so that a
//! part re-serializes byte-identically when nothing inside it changed.

use quick_xml::escape::escape;

use crate::error::EngineError;
use crate::package::{self, DocxPackage};
use crate::xml;

const REL_HEADER_SUFFIX: &str = "/header";
const REL_FOOTER_SUFFIX: &str = "/footer";

/// Run formatting attributes the engine reads and re-emits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Formatting {
    pub bold: bool,
    pub italic: bool,
    /// Underline pattern (`single`, `double`, ...); `None` when not underlined.
    pub underline: Option<String>,
    pub font_family: Option<String>,
    /// Size in half-points, as stored in `w:sz`.
    pub font_size: Option<u32>,
}

impl Formatting {
    pub fn with_bold(&self, bold: bool) -> Self {
        Self {
            bold,
            ..self.clone()
        }
    }

    /// `<w:rPr>` element, or an empty string when there is nothing to emit.
    pub fn to_xml(&self) -> String {
        let mut props = String::new();
        if let Some(font) = &self.font_family {
            let font = escape(font.as_str());
            props.push_str(&format!(
                r#"<w:rFonts w:ascii="{0}" w:hAnsi="{0}" w:cs="{0}"/>"#,
                font
            ));
        }
        if self.bold {
            props.push_str("<w:b/><w:bCs/>");
        }
        if self.italic {
            props.push_str("<w:i/><w:iCs/>");
        }
        if let Some(size) = self.font_size {
            props.push_str(&format!(
                r#"<w:sz w:val="{0}"/><w:szCs w:val="{0}"/>"#,
                size
            ));
        }
        if let Some(pattern) = &self.underline {
            props.push_str(&format!(r#"<w:u w:val="{}"/>"#, escape(pattern.as_str())));
        }
        if props.is_empty() {
            props
        } else {
            format!("<w:rPr>{}</w:rPr>", props)
        }
    }
}

/// Smallest formatted text unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    /// Serialized `<w:r>` element.
    pub xml: String,
    pub format: Formatting,
    /// Visible text; tabs and breaks appear as `\t` and `\n`.
    pub text: String,
}

impl Run {
    /// Build a text run carrying `format`.
    pub fn text(text: &str, format: &Formatting) -> Self {
        let mut body = String::new();
        let mut pending = String::new();
        let flush = |pending: &mut String, body: &mut String| {
            if !pending.is_empty() {
                body.push_str(&format!(
                    r#"<w:t xml:space="preserve">{}</w:t>"#,
                    escape(pending.as_str())
                ));
                pending.clear();
            }
        };
        for ch in text.chars() {
            match ch {
                '\t' => {
                    flush(&mut pending, &mut body);
                    body.push_str("<w:tab/>");
                }
                '\n' => {
                    flush(&mut pending, &mut body);
                    body.push_str("<w:br/>");
                }
                c => pending.push(c),
            }
        }
        flush(&mut pending, &mut body);
        Self {
            xml: format!("<w:r>{}{}</w:r>", format.to_xml(), body),
            format: format.clone(),
            text: text.to_string(),
        }
    }

    /// A run holding pre-built content (e.g. an inline drawing); no text.
    pub fn raw(xml: String) -> Self {
        Self {
            xml,
            format: Formatting::default(),
            text: String::new(),
        }
    }
}

/// Inline content of a paragraph.
#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Run(Run),
    /// Bookmarks, hyperlinks, proofing marks and anything else kept verbatim.
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    /// Original XML, emitted unchanged while the paragraph is clean.
    source: String,
    /// Opening `<w:p ...>` tag.
    open: String,
    /// Raw `<w:pPr>` element.
    properties: Option<String>,
    content: Vec<Inline>,
    dirty: bool,
}

impl Paragraph {
    pub(crate) fn from_parts(
        source: String,
        open: String,
        properties: Option<String>,
        content: Vec<Inline>,
    ) -> Self {
        Self {
            source,
            open,
            properties,
            content,
            dirty: false,
        }
    }

    pub fn runs(&self) -> impl Iterator<Item = &Run> {
        self.content.iter().filter_map(|inline| match inline {
            Inline::Run(run) => Some(run),
            Inline::Other(_) => None,
        })
    }

    pub fn run_count(&self) -> usize {
        self.runs().count()
    }

    pub fn content(&self) -> &[Inline] {
        &self.content
    }

    /// Concatenated text of all runs, in run order.
    pub fn text(&self) -> String {
        self.runs().map(|run| run.text.as_str()).collect()
    }

    pub fn is_modified(&self) -> bool {
        self.dirty
    }

    /// Discard every run and put `runs` where the first run used to be.
    /// Non-run content keeps its place.
    pub fn replace_runs(&mut self, runs: Vec<Run>) {
        let anchor = self
            .content
            .iter()
            .position(|inline| matches!(inline, Inline::Run(_)));
        self.content.retain(|inline| !matches!(inline, Inline::Run(_)));
        let at = anchor.unwrap_or(self.content.len());
        let tail = self.content.split_off(at);
        self.content.extend(runs.into_iter().map(Inline::Run));
        self.content.extend(tail);
        self.dirty = true;
    }

    pub fn to_xml(&self) -> String {
        if !self.dirty {
            return self.source.clone();
        }
        let mut out = self.open.clone();
        if let Some(props) = &self.properties {
            out.push_str(props);
        }
        for inline in &self.content {
            match inline {
                Inline::Run(run) => out.push_str(&run.xml),
                Inline::Other(raw) => out.push_str(raw),
            }
        }
        out.push_str(&closing_tag(&self.open));
        out
    }
}

/// Kinds of structural elements that own nested containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Table,
    Row,
    Cell,
}

impl ElementKind {
    pub(crate) fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"tbl" => Some(ElementKind::Table),
            b"tr" => Some(ElementKind::Row),
            b"tc" => Some(ElementKind::Cell),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub kind: ElementKind,
    pub open: String,
    pub children: Vec<Node>,
    pub close: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Raw(String),
    Paragraph(Paragraph),
    Element(Element),
}

/// Serialize a node sequence. Uses an explicit stack so deeply nested
/// tables do not grow the call stack.
pub fn nodes_to_xml(nodes: &[Node]) -> String {
    enum Step<'a> {
        Node(&'a Node),
        Text(&'a str),
    }

    let mut out = String::new();
    let mut stack: Vec<Step> = nodes.iter().rev().map(Step::Node).collect();
    while let Some(step) = stack.pop() {
        match step {
            Step::Text(text) => out.push_str(text),
            Step::Node(Node::Raw(raw)) => out.push_str(raw),
            Step::Node(Node::Paragraph(p)) => out.push_str(&p.to_xml()),
            Step::Node(Node::Element(e)) => {
                out.push_str(&e.open);
                stack.push(Step::Text(&e.close));
                stack.extend(e.children.iter().rev().map(Step::Node));
            }
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    Body,
    Header,
    Footer,
}

/// One XML part of the package that holds paragraphs.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub name: String,
    pub kind: PartKind,
    pub nodes: Vec<Node>,
}

impl Part {
    pub fn parse(name: &str, kind: PartKind, xml: &str) -> Result<Self, EngineError> {
        Ok(Self {
            name: name.to_string(),
            kind,
            nodes: xml::parse_part(name, xml)?,
        })
    }

    pub fn to_xml(&self) -> String {
        nodes_to_xml(&self.nodes)
    }

    pub fn is_modified(&self) -> bool {
        crate::walker::ParagraphWalk::new(&self.nodes).any(|(_, p)| p.is_modified())
    }
}

/// A decoded template. Each render owns its own instance.
#[derive(Debug, Clone)]
pub struct Document {
    pub package: DocxPackage,
    pub body: Part,
    pub headers: Vec<Part>,
    pub footers: Vec<Part>,
}

impl Document {
    /// Decode a DOCX byte buffer into a fresh mutable tree.
    pub fn decode(bytes: &[u8]) -> Result<Self, EngineError> {
        let package = DocxPackage::from_bytes(bytes)?;
        let main = package.main_part_name()?;
        let body = load_part(&package, &main, PartKind::Body)?;

        let mut headers = Vec::new();
        let mut footers = Vec::new();
        let base = package::part_dir(&main);
        for rel in package.relationships(&package::rels_part_name(&main))? {
            if rel.external {
                continue;
            }
            let kind = if rel.rel_type.ends_with(REL_HEADER_SUFFIX) {
                PartKind::Header
            } else if rel.rel_type.ends_with(REL_FOOTER_SUFFIX) {
                PartKind::Footer
            } else {
                continue;
            };
            let name = package::resolve_target(base, &rel.target);
            let part = load_part(&package, &name, kind)?;
            match kind {
                PartKind::Header => headers.push(part),
                _ => footers.push(part),
            }
        }

        log::debug!(
            "Decoded {} ({} header(s), {} footer(s))",
            main,
            headers.len(),
            footers.len()
        );
        Ok(Self {
            package,
            body,
            headers,
            footers,
        })
    }

    /// Write modified parts back into the package and zip it.
    pub fn encode(mut self) -> Result<Vec<u8>, EngineError> {
        let parts = std::iter::once(&self.body)
            .chain(self.headers.iter())
            .chain(self.footers.iter());
        let mut updates = Vec::new();
        for part in parts {
            if part.is_modified() {
                updates.push((part.name.clone(), part.to_xml().into_bytes()));
            }
        }
        for (name, data) in updates {
            self.package.set(&name, data);
        }
        self.package.to_bytes()
    }

    /// Parts in traversal order: body, headers, footers.
    pub fn parts(&self) -> impl Iterator<Item = &Part> {
        std::iter::once(&self.body)
            .chain(self.headers.iter())
            .chain(self.footers.iter())
    }

    pub fn parts_mut(&mut self) -> impl Iterator<Item = &mut Part> {
        std::iter::once(&mut self.body)
            .chain(self.headers.iter_mut())
            .chain(self.footers.iter_mut())
    }

    /// Split borrow of the package and one part, by traversal index.
    pub fn package_and_part_mut(&mut self, index: usize) -> Option<(&mut DocxPackage, &mut Part)> {
        let part = std::iter::once(&mut self.body)
            .chain(self.headers.iter_mut())
            .chain(self.footers.iter_mut())
            .nth(index)?;
        Some((&mut self.package, part))
    }
}

fn load_part(package: &DocxPackage, name: &str, kind: PartKind) -> Result<Part, EngineError> {
    let xml = package
        .get_str(name)?
        .ok_or_else(|| EngineError::MissingPart(name.to_string()))?;
    Part::parse(name, kind, &xml)
}

/// `<w:p w:rsidR="1">` -> `</w:p>`
fn closing_tag(open: &str) -> String {
    let name: String = open
        .trim_start_matches('<')
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != '>' && *c != '/')
        .collect();
    format!("</{}>", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatting_xml_order() {
        let f = Formatting {
            bold: true,
            italic: true,
            underline: Some("single".to_string()),
            font_family: Some("Arial".to_string()),
            font_size: Some(24),
        };
        assert_eq!(
            f.to_xml(),
            concat!(
                r#"<w:rPr><w:rFonts w:ascii="Arial" w:hAnsi="Arial" w:cs="Arial"/>"#,
                r#"<w:b/><w:bCs/><w:i/><w:iCs/><w:sz w:val="24"/><w:szCs w:val="24"/>"#,
                r#"<w:u w:val="single"/></w:rPr>"#
            )
        );
        assert_eq!(Formatting::default().to_xml(), "");
    }

    #[test]
    fn test_text_run_escapes_and_maps_tabs() {
        let run = Run::text("A & B\tC\nD", &Formatting::default());
        assert_eq!(
            run.xml,
            concat!(
                r#"<w:r><w:t xml:space="preserve">A &amp; B</w:t><w:tab/>"#,
                r#"<w:t xml:space="preserve">C</w:t><w:br/>"#,
                r#"<w:t xml:space="preserve">D</w:t></w:r>"#
            )
        );
        assert_eq!(run.text, "A & B\tC\nD");
    }

    #[test]
    fn test_closing_tag() {
        assert_eq!(closing_tag(r#"<w:p w:rsidR="00A1">"#), "</w:p>");
        assert_eq!(closing_tag("<w:p>"), "</w:p>");
    }

    #[test]
    fn test_replace_runs_keeps_other_content_in_place() {
        let mut p = Paragraph::from_parts(
            "<w:p><w:bookmarkStart/><w:r/><w:r/><w:bookmarkEnd/></w:p>".to_string(),
            "<w:p>".to_string(),
            None,
            vec![
                Inline::Other("<w:bookmarkStart/>".to_string()),
                Inline::Run(Run::raw("<w:r/>".to_string())),
                Inline::Run(Run::raw("<w:r/>".to_string())),
                Inline::Other("<w:bookmarkEnd/>".to_string()),
            ],
        );
        assert!(!p.is_modified());
        p.replace_runs(vec![Run::raw("<w:r>X</w:r>".to_string())]);
        assert!(p.is_modified());
        assert_eq!(
            p.to_xml(),
            "<w:p><w:bookmarkStart/><w:r>X</w:r><w:bookmarkEnd/></w:p>"
        );
    }
}
