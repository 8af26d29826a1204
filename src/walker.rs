//! Traversal of every paragraph-bearing container.
//!
//! Order inside a container: its own paragraphs first, then its nested
//! elements depth-first (table → row → cell), each handled by the same rule.
//! Parts are taken body, headers, footers. The walk uses an explicit work
//! stack, so arbitrarily nested tables do not recurse.

use std::collections::{BTreeSet, VecDeque};

use crate::model::{Document, Node, Paragraph};
use crate::rebuild;
use crate::substitute::{self, ForcedBoldSet, VariableMap};

/// Index path from a part's top-level nodes down to a paragraph.
pub type NodePath = Vec<usize>;

/// Lazy, ordered iterator over the paragraphs of a node tree.
pub struct ParagraphWalk<'a> {
    pending: VecDeque<(NodePath, &'a Paragraph)>,
    stack: Vec<(NodePath, &'a [Node])>,
}

impl<'a> ParagraphWalk<'a> {
    pub fn new(nodes: &'a [Node]) -> Self {
        Self {
            pending: VecDeque::new(),
            stack: vec![(Vec::new(), nodes)],
        }
    }
}

impl<'a> Iterator for ParagraphWalk<'a> {
    type Item = (NodePath, &'a Paragraph);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            let (prefix, nodes) = self.stack.pop()?;
            let mut nested = Vec::new();
            for (i, node) in nodes.iter().enumerate() {
                let mut path = prefix.clone();
                path.push(i);
                match node {
                    Node::Paragraph(p) => self.pending.push_back((path, p)),
                    Node::Element(e) => nested.push((path, e.children.as_slice())),
                    Node::Raw(_) => {}
                }
            }
            self.stack.extend(nested.into_iter().rev());
        }
    }
}

/// Mutable access to the paragraph at `path`.
pub fn paragraph_mut<'a>(nodes: &'a mut [Node], path: &[usize]) -> Option<&'a mut Paragraph> {
    let (last, parents) = path.split_last()?;
    let mut current = nodes;
    for &i in parents {
        current = match current.get_mut(i)? {
            Node::Element(e) => e.children.as_mut_slice(),
            _ => return None,
        };
    }
    match current.get_mut(*last)? {
        Node::Paragraph(p) => Some(p),
        _ => None,
    }
}

/// Where a paragraph lives: part index (traversal order) and node path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParagraphLocation {
    pub part: usize,
    pub path: NodePath,
}

/// Summary of one `transform` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformReport {
    pub paragraphs_visited: usize,
    pub paragraphs_changed: usize,
    /// Distinct tokens applied anywhere in the document.
    pub tokens_applied: BTreeSet<String>,
}

/// Substitute and rebuild one paragraph. Returns the applied pairs, empty
/// when nothing matched (the paragraph is then left untouched).
pub fn process_paragraph(
    paragraph: &mut Paragraph,
    variables: &VariableMap,
    forced_bold: &ForcedBoldSet,
) -> Vec<(String, String)> {
    let text = substitute::reconcile(paragraph);
    let sub = substitute::substitute(&text, variables);
    if !sub.changed() {
        return Vec::new();
    }
    rebuild::rebuild_paragraph(paragraph, &sub.text, &sub.applied, forced_bold);
    sub.applied
}

/// Apply the variable map to every paragraph of the document.
pub fn transform(
    document: &mut Document,
    variables: &VariableMap,
    forced_bold: &ForcedBoldSet,
) -> TransformReport {
    let mut report = TransformReport::default();
    for part in document.parts_mut() {
        let paths: Vec<NodePath> = ParagraphWalk::new(&part.nodes)
            .map(|(path, _)| path)
            .collect();
        let mut changed_here = 0usize;
        for path in paths {
            let Some(paragraph) = paragraph_mut(&mut part.nodes, &path) else {
                continue;
            };
            report.paragraphs_visited += 1;
            let applied = process_paragraph(paragraph, variables, forced_bold);
            if !applied.is_empty() {
                changed_here += 1;
                report
                    .tokens_applied
                    .extend(applied.into_iter().map(|(token, _)| token));
            }
        }
        if changed_here > 0 {
            log::debug!("{}: {} paragraph(s) rewritten", part.name, changed_here);
        }
        report.paragraphs_changed += changed_here;
    }
    report
}

/// First paragraph, in search order, whose text contains `needle`.
pub fn find_paragraph(document: &Document, needle: &str) -> Option<ParagraphLocation> {
    document.parts().enumerate().find_map(|(part, p)| {
        ParagraphWalk::new(&p.nodes)
            .find(|(_, paragraph)| paragraph.text().contains(needle))
            .map(|(path, _)| ParagraphLocation { part, path })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_part;

    const NESTED: &str = concat!(
        r#"<w:body>"#,
        r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>t1</w:t></w:r></w:p>"#,
        r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>deep</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#,
        r#"<w:p><w:r><w:t>t1b</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#,
        r#"<w:p><w:r><w:t>p1</w:t></w:r></w:p>"#,
        r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>t2</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#,
        r#"<w:p><w:r><w:t>p2</w:t></w:r></w:p>"#,
        r#"</w:body>"#
    );

    #[test]
    fn test_walk_order_paragraphs_then_tables_depth_first() {
        let nodes = parse_part("word/document.xml", NESTED).unwrap();
        let texts: Vec<String> = ParagraphWalk::new(&nodes).map(|(_, p)| p.text()).collect();
        assert_eq!(texts, vec!["p1", "p2", "t1", "t1b", "deep", "t2"]);
    }

    #[test]
    fn test_paths_resolve_to_same_paragraph() {
        let mut nodes = parse_part("word/document.xml", NESTED).unwrap();
        let walked: Vec<(NodePath, String)> = ParagraphWalk::new(&nodes)
            .map(|(path, p)| (path, p.text()))
            .collect();
        for (path, text) in walked {
            assert_eq!(paragraph_mut(&mut nodes, &path).unwrap().text(), text);
        }
    }

    #[test]
    fn test_paragraph_mut_rejects_bad_paths() {
        let mut nodes = parse_part("word/document.xml", NESTED).unwrap();
        assert!(paragraph_mut(&mut nodes, &[]).is_none());
        assert!(paragraph_mut(&mut nodes, &[999]).is_none());
    }

    #[test]
    fn test_process_paragraph_untouched_without_match() {
        let mut nodes = parse_part(
            "word/document.xml",
            r#"<w:body><w:p><w:r><w:t>rien</w:t></w:r></w:p></w:body>"#,
        )
        .unwrap();
        let path = ParagraphWalk::new(&nodes).next().unwrap().0;
        let p = paragraph_mut(&mut nodes, &path).unwrap();
        let vars: VariableMap = [("{{NOM}}", "X")].into_iter().collect();
        assert!(process_paragraph(p, &vars, &ForcedBoldSet::new()).is_empty());
        assert!(!p.is_modified());
    }
}
