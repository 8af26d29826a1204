//! Re-emitting runs for a paragraph whose text changed.
//!
//! The original run boundaries no longer mean anything once a token spanning
//! them has been replaced, so the paragraph is rebuilt from its final text:
//! one formatting baseline (taken from the first original run) and bold
//! overrides on the character ranges that hold forced-bold values.

use crate::model::{Formatting, Paragraph, Run};
use crate::substitute::ForcedBoldSet;

/// A slice of the rebuilt text and whether it renders bold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSegment {
    pub text: String,
    pub bold: bool,
}

/// Formatting of the paragraph's first run, or the default when it has none.
pub fn baseline(paragraph: &Paragraph) -> Formatting {
    paragraph
        .runs()
        .next()
        .map(|run| run.format.clone())
        .unwrap_or_default()
}

/// Byte ranges of `text` to render bold.
///
/// Every occurrence of every qualifying value is a candidate. Candidates are
/// claimed longest first (ties: lower offset first) and a candidate that
/// overlaps an already claimed range is dropped, so when one value contains
/// another the longer one owns the shared characters. The result is sorted
/// by offset and non-overlapping.
pub fn bold_spans(
    text: &str,
    applied: &[(String, String)],
    forced_bold: &ForcedBoldSet,
    baseline_bold: bool,
) -> Vec<(usize, usize)> {
    let mut candidates: Vec<(usize, usize)> = applied
        .iter()
        .filter(|(token, value)| {
            !value.is_empty() && (baseline_bold || forced_bold.contains(token))
        })
        .flat_map(|(_, value)| {
            text.match_indices(value.as_str())
                .map(|(offset, m)| (offset, offset + m.len()))
                .collect::<Vec<_>>()
        })
        .collect();
    candidates.sort_by(|a, b| (b.1 - b.0).cmp(&(a.1 - a.0)).then(a.0.cmp(&b.0)));
    candidates.dedup();

    let mut claimed: Vec<(usize, usize)> = Vec::new();
    for (start, end) in candidates {
        if claimed.iter().all(|&(s, e)| end <= s || start >= e) {
            claimed.push((start, end));
        }
    }
    claimed.sort_unstable();
    claimed
}

/// Slice `text` into alternating plain and bold segments.
/// Zero-length segments are dropped.
pub fn segment(text: &str, spans: &[(usize, usize)]) -> Vec<TextSegment> {
    let mut segments = Vec::new();
    let mut cursor = 0usize;
    let mut push = |slice: &str, bold: bool| {
        if !slice.is_empty() {
            segments.push(TextSegment {
                text: slice.to_string(),
                bold,
            });
        }
    };
    for &(start, end) in spans {
        push(&text[cursor..start], false);
        push(&text[start..end], true);
        cursor = end;
    }
    push(&text[cursor..], false);
    segments
}

/// Replace the runs of `paragraph` with runs for `text`.
///
/// Every new run inherits the baseline's italic, underline, font and size;
/// bold is the segment's flag or the baseline's, never less than baseline.
pub fn rebuild_paragraph(
    paragraph: &mut Paragraph,
    text: &str,
    applied: &[(String, String)],
    forced_bold: &ForcedBoldSet,
) {
    let base = baseline(paragraph);
    let spans = bold_spans(text, applied, forced_bold, base.bold);
    let runs: Vec<Run> = segment(text, &spans)
        .into_iter()
        .map(|seg| Run::text(&seg.text, &base.with_bold(seg.bold || base.bold)))
        .collect();
    paragraph.replace_runs(runs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_paragraph;

    fn applied(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(t, v)| (t.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_segment_alternates() {
        let segs = segment("Salle B12 à 09:00", &[(6, 9), (13, 18)]);
        let texts: Vec<(&str, bool)> = segs.iter().map(|s| (s.text.as_str(), s.bold)).collect();
        assert_eq!(
            texts,
            vec![("Salle ", false), ("B12", true), (" à ", false), ("09:00", true)]
        );
    }

    #[test]
    fn test_segment_drops_empty_pieces() {
        let segs = segment("B12", &[(0, 3)]);
        assert_eq!(segs.len(), 1);
        assert!(segs[0].bold);
        assert!(segment("", &[]).is_empty());
    }

    #[test]
    fn test_bold_spans_every_occurrence() {
        let forced: ForcedBoldSet = ["{{SALLE}}"].into_iter().collect();
        let spans = bold_spans(
            "B12 puis B12",
            &applied(&[("{{SALLE}}", "B12")]),
            &forced,
            false,
        );
        assert_eq!(spans, vec![(0, 3), (9, 12)]);
    }

    #[test]
    fn test_bold_spans_ignore_unforced_tokens() {
        let forced: ForcedBoldSet = ["{{SALLE}}"].into_iter().collect();
        let spans = bold_spans("DUPONT", &applied(&[("{{NOM}}", "DUPONT")]), &forced, false);
        assert!(spans.is_empty());
    }

    #[test]
    fn test_bold_spans_longest_value_wins_overlap() {
        let forced: ForcedBoldSet = ["{{A}}", "{{B}}"].into_iter().collect();
        // "12" is inside "B12": the longer value claims the shared characters.
        let spans = bold_spans(
            "B12 et 12",
            &applied(&[("{{A}}", "12"), ("{{B}}", "B12")]),
            &forced,
            false,
        );
        assert_eq!(spans, vec![(0, 3), (7, 9)]);
    }

    #[test]
    fn test_bold_spans_multibyte_text() {
        let forced: ForcedBoldSet = ["{{VILLE}}"].into_iter().collect();
        let text = "À Besançon, été";
        let spans = bold_spans(text, &applied(&[("{{VILLE}}", "Besançon")]), &forced, false);
        assert_eq!(spans.len(), 1);
        let (s, e) = spans[0];
        assert_eq!(&text[s..e], "Besançon");
    }

    const SPLIT_FORMATTED: &str = concat!(
        r#"<w:p><w:r><w:rPr><w:rFonts w:ascii="Arial" w:hAnsi="Arial"/><w:i/><w:sz w:val="24"/><w:u w:val="double"/></w:rPr>"#,
        r#"<w:t xml:space="preserve">Salle {{SAL</w:t></w:r>"#,
        r#"<w:r><w:rPr><w:rFonts w:ascii="Times New Roman"/><w:b/><w:sz w:val="40"/></w:rPr>"#,
        r#"<w:t>LE}} bis</w:t></w:r></w:p>"#
    );

    fn first_run_format() -> Formatting {
        Formatting {
            bold: false,
            italic: true,
            underline: Some("double".to_string()),
            font_family: Some("Arial".to_string()),
            font_size: Some(24),
        }
    }

    #[test]
    fn test_rebuilt_runs_take_first_run_formatting() {
        let mut p = parse_paragraph("p", SPLIT_FORMATTED).unwrap();
        assert_eq!(baseline(&p), first_run_format());

        rebuild_paragraph(
            &mut p,
            "Salle B12 bis",
            &applied(&[("{{SALLE}}", "B12")]),
            &ForcedBoldSet::new(),
        );
        let formats: Vec<&Formatting> = p.runs().map(|r| &r.format).collect();
        assert_eq!(formats, vec![&first_run_format()]);

        // The emitted XML carries the same formatting once parsed again.
        let reparsed = parse_paragraph("p", &p.to_xml()).unwrap();
        assert_eq!(reparsed.text(), "Salle B12 bis");
        assert!(reparsed.runs().all(|r| r.format == first_run_format()));
    }

    #[test]
    fn test_forced_bold_runs_keep_the_rest_of_the_baseline() {
        let mut p = parse_paragraph("p", SPLIT_FORMATTED).unwrap();
        let forced: ForcedBoldSet = ["{{SALLE}}"].into_iter().collect();
        rebuild_paragraph(
            &mut p,
            "Salle B12 bis",
            &applied(&[("{{SALLE}}", "B12")]),
            &forced,
        );
        let runs: Vec<(&str, &Formatting)> =
            p.runs().map(|r| (r.text.as_str(), &r.format)).collect();
        assert_eq!(
            runs,
            vec![
                ("Salle ", &first_run_format()),
                ("B12", &first_run_format().with_bold(true)),
                (" bis", &first_run_format()),
            ]
        );
    }
}
