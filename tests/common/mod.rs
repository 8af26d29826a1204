//! Small DOCX packages built in memory for integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Read, Write};

pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// A paragraph from `(text, bold)` runs.
pub fn para(runs: &[(&str, bool)]) -> String {
    let mut xml = String::from("<w:p>");
    for (text, bold) in runs {
        xml.push_str("<w:r>");
        if *bold {
            xml.push_str("<w:rPr><w:b/></w:rPr>");
        }
        xml.push_str(&format!(r#"<w:t xml:space="preserve">{}</w:t>"#, text));
        xml.push_str("</w:r>");
    }
    xml.push_str("</w:p>");
    xml
}

pub fn table(cells: &[String]) -> String {
    let mut xml = String::from("<w:tbl><w:tblPr/><w:tr>");
    for cell in cells {
        xml.push_str(&format!("<w:tc><w:tcPr/>{}</w:tc>", cell));
    }
    xml.push_str("</w:tr></w:tbl>");
    xml
}

pub fn document_xml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{}"><w:body>{}<w:sectPr/></w:body></w:document>"#,
        W_NS, body
    )
}

fn header_xml(root: &str, content: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:{root} xmlns:w="{ns}">{content}</w:{root}>"#,
        root = root,
        ns = W_NS,
        content = content
    )
}

#[derive(Default)]
pub struct TemplateBuilder {
    body: String,
    header: Option<String>,
    footer: Option<String>,
}

impl TemplateBuilder {
    pub fn new(body: &str) -> Self {
        Self {
            body: body.to_string(),
            ..Default::default()
        }
    }

    pub fn header(mut self, content: &str) -> Self {
        self.header = Some(content.to_string());
        self
    }

    pub fn footer(mut self, content: &str) -> Self {
        self.footer = Some(content.to_string());
        self
    }

    pub fn build(&self) -> Vec<u8> {
        zip_entries(&self.entries())
    }

    /// The package parts, for tests that need to alter one before zipping.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut rels = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        let mut overrides = String::new();
        let mut entries: Vec<(String, String)> = Vec::new();
        if let Some(ref h) = self.header {
            rels.push_str(r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/header" Target="header1.xml"/>"#);
            overrides.push_str(r#"<Override PartName="/word/header1.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml"/>"#);
            entries.push(("word/header1.xml".to_string(), header_xml("hdr", h)));
        }
        if let Some(ref f) = self.footer {
            rels.push_str(r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer" Target="footer1.xml"/>"#);
            overrides.push_str(r#"<Override PartName="/word/footer1.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.footer+xml"/>"#);
            entries.push(("word/footer1.xml".to_string(), header_xml("ftr", f)));
        }
        rels.push_str("</Relationships>");

        let content_types = format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
                r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
                r#"<Default Extension="xml" ContentType="application/xml"/>"#,
                r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
                "{}</Types>"
            ),
            overrides
        );
        let package_rels = concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
            r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
            r#"</Relationships>"#
        );

        let mut all = vec![
            ("[Content_Types].xml".to_string(), content_types),
            ("_rels/.rels".to_string(), package_rels.to_string()),
            ("word/document.xml".to_string(), document_xml(&self.body)),
            ("word/_rels/document.xml.rels".to_string(), rels),
        ];
        all.extend(entries);
        all
    }
}

/// Replace the content of entry `name`, or drop it when `content` is `None`.
pub fn with_entry(
    mut entries: Vec<(String, String)>,
    name: &str,
    content: Option<&str>,
) -> Vec<(String, String)> {
    match content {
        Some(content) => {
            for (n, data) in entries.iter_mut() {
                if n == name {
                    *data = content.to_string();
                }
            }
        }
        None => entries.retain(|(n, _)| n != name),
    }
    entries
}

pub fn zip_entries(entries: &[(String, String)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, data) in entries {
        zip.start_file(name.as_str(), options).unwrap();
        zip.write_all(data.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Read one entry of a zip as text.
pub fn entry(bytes: &[u8], name: &str) -> Option<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).ok()?;
    let mut file = archive.by_name(name).ok()?;
    let mut out = String::new();
    file.read_to_string(&mut out).ok()?;
    Some(out)
}

pub fn entry_names(bytes: &[u8]) -> Vec<String> {
    let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    archive.file_names().map(str::to_string).collect()
}

pub fn tiny_png() -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, 1, 1);
        encoder.set_color(png::ColorType::Grayscale);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&[0]).unwrap();
    }
    out
}
