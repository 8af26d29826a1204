//! WordprocessingML part parsing.
//!
//! The parser never re-serializes what it reads: every node keeps the exact
//! byte span it came from. Events are consumed contiguously, so the slice
//! between the previous event end and the current one is the event's raw
//! text. Paragraphs, runs and run properties are cut out with
//! `read_to_end` and parsed again on their own slice.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Reader;

use crate::error::EngineError;
use crate::model::{Element, ElementKind, Formatting, Inline, Node, Paragraph, Run};

struct Frame {
    kind: ElementKind,
    open: String,
    children: Vec<Node>,
}

/// Parse a part (document body, header, footer) into nodes.
pub fn parse_part(part: &str, xml: &str) -> Result<Vec<Node>, EngineError> {
    let mut reader = Reader::from_str(xml);
    let mut root: Vec<Node> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut raw = String::new();
    let mut last = 0usize;

    loop {
        let event = reader.read_event().map_err(|e| EngineError::xml(part, e))?;
        match event {
            Event::Start(e) if e.local_name().as_ref() == b"p" => {
                skip_element(&mut reader, &e, part)?;
                let end = reader.buffer_position();
                flush_raw(&mut raw, current(&mut root, &mut stack));
                let paragraph = parse_paragraph(part, &xml[last..end])?;
                current(&mut root, &mut stack).push(Node::Paragraph(paragraph));
                last = end;
                continue;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"p" => {
                let end = reader.buffer_position();
                flush_raw(&mut raw, current(&mut root, &mut stack));
                let paragraph = parse_paragraph(part, &xml[last..end])?;
                current(&mut root, &mut stack).push(Node::Paragraph(paragraph));
                last = end;
                continue;
            }
            Event::Start(e) => {
                if let Some(kind) = ElementKind::from_local_name(e.local_name().as_ref()) {
                    let end = reader.buffer_position();
                    flush_raw(&mut raw, current(&mut root, &mut stack));
                    stack.push(Frame {
                        kind,
                        open: xml[last..end].to_string(),
                        children: Vec::new(),
                    });
                    last = end;
                    continue;
                }
            }
            Event::End(e) => {
                if let Some(kind) = ElementKind::from_local_name(e.local_name().as_ref()) {
                    let end = reader.buffer_position();
                    let mut frame = match stack.pop() {
                        Some(frame) if frame.kind == kind => frame,
                        _ => {
                            return Err(EngineError::xml(
                                part,
                                format!("unexpected closing tag at byte {}", last),
                            ))
                        }
                    };
                    flush_raw(&mut raw, &mut frame.children);
                    let element = Element {
                        kind: frame.kind,
                        open: frame.open,
                        children: frame.children,
                        close: xml[last..end].to_string(),
                    };
                    current(&mut root, &mut stack).push(Node::Element(element));
                    last = end;
                    continue;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        let end = reader.buffer_position();
        raw.push_str(&xml[last..end]);
        last = end;
    }

    if let Some(frame) = stack.last() {
        return Err(EngineError::xml(
            part,
            format!("unclosed {:?} element", frame.kind),
        ));
    }
    // Trailing bytes after the last event (normally none).
    raw.push_str(&xml[last..]);
    flush_raw(&mut raw, &mut root);
    Ok(root)
}

/// Parse one `<w:p>` element from its exact source slice.
pub fn parse_paragraph(part: &str, src: &str) -> Result<Paragraph, EngineError> {
    let mut reader = Reader::from_str(src);
    let mut last = 0usize;
    let mut open: Option<String> = None;
    let mut properties: Option<String> = None;
    let mut content: Vec<Inline> = Vec::new();
    // Open `w:ins` / `w:smartTag` elements around the current position.
    let mut wrappers = 0usize;

    loop {
        let event = reader.read_event().map_err(|e| EngineError::xml(part, e))?;
        match event {
            Event::Start(_) if open.is_none() => {
                open = Some(src[last..reader.buffer_position()].to_string());
            }
            Event::Empty(_) if open.is_none() => {
                // <w:p/>: keep an opening tag so the paragraph can still be rebuilt.
                let tag = &src[last..reader.buffer_position()];
                let trimmed = tag.strip_suffix("/>").unwrap_or(tag).trim_end();
                open = Some(format!("{}>", trimmed));
                break;
            }
            Event::Start(e) if is_run_wrapper(e.local_name().as_ref()) => {
                content.push(Inline::Other(src[last..reader.buffer_position()].to_string()));
                wrappers += 1;
            }
            Event::Start(e) => {
                let local = e.local_name().as_ref().to_vec();
                skip_element(&mut reader, &e, part)?;
                let slice = &src[last..reader.buffer_position()];
                match local.as_slice() {
                    b"pPr" => properties = Some(slice.to_string()),
                    b"r" => content.push(Inline::Run(parse_run(part, slice)?)),
                    _ => content.push(Inline::Other(slice.to_string())),
                }
            }
            Event::Empty(e) => {
                let slice = &src[last..reader.buffer_position()];
                match e.local_name().as_ref() {
                    b"r" => content.push(Inline::Run(Run {
                        xml: slice.to_string(),
                        format: Formatting::default(),
                        text: String::new(),
                    })),
                    b"pPr" => properties = Some(slice.to_string()),
                    _ => content.push(Inline::Other(slice.to_string())),
                }
            }
            Event::End(_) if wrappers > 0 => {
                content.push(Inline::Other(src[last..reader.buffer_position()].to_string()));
                wrappers -= 1;
            }
            Event::End(_) | Event::Eof => break,
            _ => {
                let slice = &src[last..reader.buffer_position()];
                if !slice.is_empty() {
                    content.push(Inline::Other(slice.to_string()));
                }
            }
        }
        last = reader.buffer_position();
    }

    let open = open.ok_or_else(|| EngineError::xml(part, "empty paragraph slice"))?;
    Ok(Paragraph::from_parts(
        src.to_string(),
        open,
        properties,
        content,
    ))
}

/// Parse one `<w:r>` element: its formatting and visible text.
pub fn parse_run(part: &str, src: &str) -> Result<Run, EngineError> {
    let mut reader = Reader::from_str(src);
    let mut last = 0usize;
    let mut opened = false;
    let mut in_text = false;
    let mut format = Formatting::default();
    let mut text = String::new();

    loop {
        let event = reader.read_event().map_err(|e| EngineError::xml(part, e))?;
        match event {
            Event::Start(_) if !opened => opened = true,
            Event::Start(e) => match e.local_name().as_ref() {
                b"rPr" => {
                    skip_element(&mut reader, &e, part)?;
                    format = parse_formatting(part, &src[last..reader.buffer_position()])?;
                }
                b"t" => in_text = true,
                // drawings, field codes, deleted text: not visible run text
                _ => skip_element(&mut reader, &e, part)?,
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" => text.push('\t'),
                b"br" | b"cr" => text.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => {
                let unescaped = t.unescape().map_err(|e| EngineError::xml(part, e))?;
                text.push_str(&unescaped);
            }
            Event::CData(c) if in_text => {
                text.push_str(&String::from_utf8_lossy(&c));
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = false;
                } else {
                    break;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        last = reader.buffer_position();
    }

    Ok(Run {
        xml: src.to_string(),
        format,
        text,
    })
}

/// Read the attributes the engine cares about from a `<w:rPr>` slice.
pub fn parse_formatting(part: &str, src: &str) -> Result<Formatting, EngineError> {
    let mut reader = Reader::from_str(src);
    let mut format = Formatting::default();
    let mut opened = false;

    loop {
        let event = reader.read_event().map_err(|e| EngineError::xml(part, e))?;
        let e = match event {
            Event::Start(_) if !opened => {
                opened = true;
                continue;
            }
            Event::Start(e) => {
                // rPrChange holds the pre-revision formatting; it must not win.
                if e.local_name().as_ref() == b"rPrChange" {
                    skip_element(&mut reader, &e, part)?;
                    continue;
                }
                e
            }
            Event::Empty(e) => e,
            Event::Eof => break,
            _ => continue,
        };
        match e.local_name().as_ref() {
            b"b" => format.bold = toggle_on(&e),
            b"i" => format.italic = toggle_on(&e),
            b"u" => {
                format.underline = match attr(&e, b"val") {
                    None => Some("single".to_string()),
                    Some(v) if v == "none" => None,
                    Some(v) => Some(v),
                }
            }
            b"rFonts" => {
                format.font_family = attr(&e, b"ascii").or_else(|| attr(&e, b"hAnsi"));
            }
            b"sz" => {
                format.font_size = attr(&e, b"val")
                    .and_then(|v| v.parse::<u32>().ok())
                    .filter(|size| *size > 0);
            }
            _ => {}
        }
    }
    Ok(format)
}

/// Inline wrappers whose runs are visible paragraph text: tracked
/// insertions and smart tags. Their tags stay in place as non-run content.
fn is_run_wrapper(local_name: &[u8]) -> bool {
    matches!(local_name, b"ins" | b"smartTag")
}

fn current<'s>(root: &'s mut Vec<Node>, stack: &'s mut [Frame]) -> &'s mut Vec<Node> {
    match stack.last_mut() {
        Some(frame) => &mut frame.children,
        None => root,
    }
}

fn flush_raw(raw: &mut String, into: &mut Vec<Node>) {
    if !raw.is_empty() {
        into.push(Node::Raw(std::mem::take(raw)));
    }
}

/// Advance past the end tag matching `start`.
fn skip_element(
    reader: &mut Reader<&[u8]>,
    start: &BytesStart<'_>,
    part: &str,
) -> Result<(), EngineError> {
    let name = start.name().as_ref().to_vec();
    reader
        .read_to_end(QName(&name))
        .map_err(|e| EngineError::xml(part, e))?;
    Ok(())
}

fn attr(e: &BytesStart<'_>, key_local: &[u8]) -> Option<String> {
    e.attributes()
        .with_checks(false)
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key_local)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// OOXML toggle properties: present means on unless `w:val` says otherwise.
fn toggle_on(e: &BytesStart<'_>) -> bool {
    !matches!(
        attr(e, b"val").as_deref(),
        Some("0") | Some("false") | Some("off")
    )
}
