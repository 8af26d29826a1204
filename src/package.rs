//! DOCX package I/O.
//!
//! A DOCX file is a zip archive of XML parts. The package keeps every entry
//! as raw bytes in archive order so untouched parts round-trip unchanged, and
//! offers the small amount of OPC plumbing the engine needs: relationship
//! lookup, relationship insertion and content-type registration.

use lazy_static::lazy_static;
use regex::Regex;
use std::io::{Cursor, Read, Write};

use crate::error::EngineError;

pub const CONTENT_TYPES: &str = "[Content_Types].xml";
pub const PACKAGE_RELS: &str = "_rels/.rels";
pub const DEFAULT_MAIN_PART: &str = "word/document.xml";

pub const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub const REL_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

const EMPTY_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"></Relationships>"#
);

lazy_static! {
    static ref RELATIONSHIP: Regex = Regex::new(r#"<Relationship\s+([^>]+?)/?>"#).unwrap();
    static ref REL_ID: Regex = Regex::new(r#"\bId="([^"]+)""#).unwrap();
    static ref REL_TYPE: Regex = Regex::new(r#"\bType="([^"]+)""#).unwrap();
    static ref REL_TARGET: Regex = Regex::new(r#"\bTarget="([^"]+)""#).unwrap();
    static ref REL_MODE: Regex = Regex::new(r#"\bTargetMode="([^"]+)""#).unwrap();
    static ref NUMBERED_ID: Regex = Regex::new(r"^rId(\d+)$").unwrap();
}

/// One `<Relationship>` entry of a `.rels` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

/// A rewritten part, computed but not yet stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartUpdate {
    pub name: String,
    pub xml: String,
}

/// An opened DOCX archive: ordered `(entry_name, bytes)` pairs.
#[derive(Debug, Clone, Default)]
pub struct DocxPackage {
    entries: Vec<(String, Vec<u8>)>,
}

impl DocxPackage {
    /// Read a DOCX zip from memory, preserving entry order.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EngineError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            entries.push((name, data));
        }
        Ok(Self { entries })
    }

    /// Write the entries back to a zip archive.
    /// Media files are STORED and everything else DEFLATED, matching the
    /// layout Word produces.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EngineError> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let deflated = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        let stored = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, data) in &self.entries {
            let opts = if name.starts_with("word/media/") {
                stored
            } else {
                deflated
            };
            zip.start_file(name.as_str(), opts)
                .map_err(|e| EngineError::Encode(format!("{}: {}", name, e)))?;
            zip.write_all(data)
                .map_err(|e| EngineError::Encode(format!("{}: {}", name, e)))?;
        }
        let cursor = zip
            .finish()
            .map_err(|e| EngineError::Encode(e.to_string()))?;
        Ok(cursor.into_inner())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| data.as_slice())
    }

    /// Entry contents as UTF-8 text.
    pub fn get_str(&self, name: &str) -> Result<Option<String>, EngineError> {
        match self.get(name) {
            Some(data) => String::from_utf8(data.to_vec())
                .map(Some)
                .map_err(|e| EngineError::xml(name, e)),
            None => Ok(None),
        }
    }

    /// Replace an entry, or append it when absent.
    pub fn set(&mut self, name: &str, data: Vec<u8>) {
        if let Some((_, existing)) = self.entries.iter_mut().find(|(n, _)| n == name) {
            *existing = data;
        } else {
            self.entries.push((name.to_string(), data));
        }
    }

    /// Relationships declared in a `.rels` part, in file order.
    pub fn relationships(&self, rels_name: &str) -> Result<Vec<Relationship>, EngineError> {
        Ok(self
            .get_str(rels_name)?
            .map(|xml| parse_relationships(&xml))
            .unwrap_or_default())
    }

    /// Locate the main document part through the package relationships.
    pub fn main_part_name(&self) -> Result<String, EngineError> {
        let from_rels = self
            .relationships(PACKAGE_RELS)?
            .into_iter()
            .find(|rel| rel.rel_type == REL_OFFICE_DOCUMENT)
            .map(|rel| resolve_target("", &rel.target));
        let name = from_rels.unwrap_or_else(|| DEFAULT_MAIN_PART.to_string());
        if self.contains(&name) {
            Ok(name)
        } else {
            Err(EngineError::MissingPart(name))
        }
    }

    /// Store a staged part rewrite.
    pub fn apply(&mut self, update: PartUpdate) {
        self.set(&update.name, update.xml.into_bytes());
    }

    /// Append a relationship to the `.rels` of `part_name`, creating the rels
    /// part when it does not exist. Returns the new relationship id.
    pub fn add_relationship(
        &mut self,
        part_name: &str,
        rel_type: &str,
        target: &str,
    ) -> Result<String, EngineError> {
        let (id, update) = self.relationship_update(part_name, rel_type, target)?;
        self.apply(update);
        Ok(id)
    }

    /// The rels part of `part_name` with one more relationship, without
    /// storing it. Returns the new id and the rewritten part.
    pub fn relationship_update(
        &self,
        part_name: &str,
        rel_type: &str,
        target: &str,
    ) -> Result<(String, PartUpdate), EngineError> {
        let rels_name = rels_part_name(part_name);
        let xml = self
            .get_str(&rels_name)?
            .unwrap_or_else(|| EMPTY_RELS.to_string());
        let id = next_relationship_id(&parse_relationships(&xml));
        let entry = format!(
            r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
            id,
            rel_type,
            quick_xml::escape::escape(target)
        );
        let updated = append_to_root(&xml, "Relationships", &entry)
            .ok_or_else(|| EngineError::xml(&rels_name, "no <Relationships> root"))?;
        Ok((
            id,
            PartUpdate {
                name: rels_name,
                xml: updated,
            },
        ))
    }

    /// Make sure `[Content_Types].xml` declares a default type for `extension`.
    pub fn ensure_default_content_type(
        &mut self,
        extension: &str,
        content_type: &str,
    ) -> Result<(), EngineError> {
        if let Some(update) = self.content_type_update(extension, content_type)? {
            self.apply(update);
        }
        Ok(())
    }

    /// `[Content_Types].xml` with a `Default` for `extension`, or `None` when
    /// one is already declared.
    pub fn content_type_update(
        &self,
        extension: &str,
        content_type: &str,
    ) -> Result<Option<PartUpdate>, EngineError> {
        let xml = self
            .get_str(CONTENT_TYPES)?
            .ok_or_else(|| EngineError::MissingPart(CONTENT_TYPES.to_string()))?;
        let pattern = format!(r#"(?i)<Default\s[^>]*Extension="{}""#, regex::escape(extension));
        let already = Regex::new(&pattern)
            .map(|re| re.is_match(&xml))
            .unwrap_or(false);
        if already {
            return Ok(None);
        }
        let entry = format!(
            r#"<Default Extension="{}" ContentType="{}"/>"#,
            extension, content_type
        );
        let updated = append_to_root(&xml, "Types", &entry)
            .ok_or_else(|| EngineError::xml(CONTENT_TYPES, "no <Types> root"))?;
        Ok(Some(PartUpdate {
            name: CONTENT_TYPES.to_string(),
            xml: updated,
        }))
    }

    /// First free `word/media/{stem}{N}.{ext}` entry name, N starting at 1.
    pub fn next_media_name(&self, stem: &str, extension: &str) -> String {
        (1..)
            .map(|n| format!("word/media/{}{}.{}", stem, n, extension))
            .find(|name| !self.contains(name))
            .unwrap_or_default()
    }
}

/// Parse relationship XML. Attribute order inside `<Relationship>` varies
/// between producers, so each attribute is matched on its own.
pub fn parse_relationships(xml: &str) -> Vec<Relationship> {
    RELATIONSHIP
        .captures_iter(xml)
        .filter_map(|caps| {
            let attrs = &caps[1];
            let id = REL_ID.captures(attrs).map(|c| c[1].to_string())?;
            let rel_type = REL_TYPE.captures(attrs).map(|c| c[1].to_string())?;
            let target = REL_TARGET
                .captures(attrs)
                .map(|c| c[1].replace("&amp;", "&"))?;
            let external = REL_MODE
                .captures(attrs)
                .is_some_and(|c| c[1].eq_ignore_ascii_case("External"));
            Some(Relationship {
                id,
                rel_type,
                target,
                external,
            })
        })
        .collect()
}

/// `word/document.xml` -> `word/_rels/document.xml.rels`
pub fn rels_part_name(part_name: &str) -> String {
    match part_name.rfind('/') {
        Some(pos) => format!("{}/_rels/{}.rels", &part_name[..pos], &part_name[pos + 1..]),
        None => format!("_rels/{}.rels", part_name),
    }
}

/// Directory of a part, without trailing slash (`""` at package root).
pub fn part_dir(part_name: &str) -> &str {
    part_name.rfind('/').map(|pos| &part_name[..pos]).unwrap_or("")
}

/// Resolve a relationship target against the directory of its source part.
pub fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Insert `entry` as the last child of the root element `root`. A
/// self-closing root (`<Relationships .../>`) is expanded first.
fn append_to_root(xml: &str, root: &str, entry: &str) -> Option<String> {
    if let Some(pos) = xml.rfind(&format!("</{}>", root)) {
        let mut out = xml.to_string();
        out.insert_str(pos, entry);
        return Some(out);
    }
    let open = format!("<{}", root);
    let start = xml.match_indices(&open).map(|(i, _)| i).find(|&i| {
        xml[i + open.len()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_whitespace() || c == '/' || c == '>')
    })?;
    let end = start + xml[start..].find('>')?;
    let head = xml[..end].strip_suffix('/')?.trim_end();
    Some(format!("{}>{}</{}>{}", head, entry, root, &xml[end + 1..]))
}

fn next_relationship_id(existing: &[Relationship]) -> String {
    let max = existing
        .iter()
        .filter_map(|rel| NUMBERED_ID.captures(&rel.id))
        .filter_map(|c| c[1].parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    let mut n = max + 1;
    // Non-numeric ids can still collide with the generated form.
    while existing.iter().any(|rel| rel.id == format!("rId{}", n)) {
        n += 1;
    }
    format!("rId{}", n)
}
