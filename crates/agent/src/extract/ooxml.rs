//! Word, PowerPoint and Excel (Office Open XML) packages.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use zip::ZipArchive;

use super::{ExtractError, Section};

type Package<'a> = ZipArchive<Cursor<&'a [u8]>>;

fn open(bytes: &[u8]) -> Result<Package<'_>, ExtractError> {
    Ok(ZipArchive::new(Cursor::new(bytes))?)
}

fn read_part(pkg: &mut Package<'_>, name: &str) -> Result<Vec<u8>, ExtractError> {
    let mut part = pkg.by_name(name)?;
    let mut buf = Vec::with_capacity(part.size() as usize);
    part.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Paragraphs joined by newlines.
pub(super) fn docx(bytes: &[u8]) -> Result<Vec<Section>, ExtractError> {
    let mut pkg = open(bytes)?;
    let xml = read_part(&mut pkg, "word/document.xml")?;
    let paragraphs = blocks(&xml, b"p", b"t")?;
    Ok(vec![Section::new(None, paragraphs.join("\n"))])
}

/// One section per slide, numbered from 1 in presentation order.
pub(super) fn pptx(bytes: &[u8]) -> Result<Vec<Section>, ExtractError> {
    let mut pkg = open(bytes)?;
    let rels = relationships(&read_part(&mut pkg, "ppt/_rels/presentation.xml.rels")?)?;
    let presentation = read_part(&mut pkg, "ppt/presentation.xml")?;

    let mut sections = Vec::new();
    for (i, rid) in ordered_refs(&presentation, b"sldId")?.iter().enumerate() {
        let Some(target) = rels.get(rid) else {
            continue;
        };
        let slide = read_part(&mut pkg, &part_path("ppt", target))?;
        let text = blocks(&slide, b"p", b"t")?
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        sections.push(Section::new(Some((i + 1).to_string()), text));
    }
    Ok(sections)
}

/// One section per sheet holding its non-empty cell values.
pub(super) fn xlsx(bytes: &[u8]) -> Result<Vec<Section>, ExtractError> {
    let mut pkg = open(bytes)?;
    let rels = relationships(&read_part(&mut pkg, "xl/_rels/workbook.xml.rels")?)?;
    let workbook = read_part(&mut pkg, "xl/workbook.xml")?;
    let shared = match read_part(&mut pkg, "xl/sharedStrings.xml") {
        Ok(xml) => blocks(&xml, b"si", b"t")?,
        Err(ExtractError::Archive(zip::result::ZipError::FileNotFound)) => Vec::new(),
        Err(e) => return Err(e),
    };

    let mut sections = Vec::new();
    for (name, rid) in sheets(&workbook)? {
        let Some(target) = rels.get(&rid) else {
            continue;
        };
        let sheet = read_part(&mut pkg, &part_path("xl", target))?;
        let cells = sheet_cells(&sheet, &shared)?;
        if !cells.is_empty() {
            sections.push(Section::new(Some(name), cells.join("\n")));
        }
    }
    Ok(sections)
}

fn part_path(base: &str, target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("{}/{}", base, target),
    }
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| unescape(&String::from_utf8_lossy(&a.value)))
}

/// The relationship id (`r:id`) of an element, whatever the prefix.
fn rel_id(e: &BytesStart<'_>) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.prefix().is_some() && a.key.local_name().as_ref() == b"id")
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn unescape(raw: &str) -> String {
    quick_xml::escape::unescape(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

fn push_entity(out: &mut String, name: &[u8]) {
    let resolved = match name {
        b"amp" => Some('&'),
        b"lt" => Some('<'),
        b"gt" => Some('>'),
        b"quot" => Some('"'),
        b"apos" => Some('\''),
        [b'#', b'x' | b'X', hex @ ..] => std::str::from_utf8(hex)
            .ok()
            .and_then(|h| u32::from_str_radix(h, 16).ok())
            .and_then(char::from_u32),
        [b'#', dec @ ..] => std::str::from_utf8(dec)
            .ok()
            .and_then(|d| d.parse().ok())
            .and_then(char::from_u32),
        _ => None,
    };
    if let Some(c) = resolved {
        out.push(c);
    }
}

/// `Id → Target` of a `.rels` part.
fn relationships(xml: &[u8]) -> Result<HashMap<String, String>, ExtractError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut rels = HashMap::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attr(&e, b"Id"), attr(&e, b"Target")) {
                    rels.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(rels)
}

/// Relationship ids of `tag` elements in document order.
fn ordered_refs(xml: &[u8], tag: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut ids = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == tag => {
                ids.extend(rel_id(&e));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(ids)
}

/// `(name, r:id)` of each sheet in workbook order.
fn sheets(xml: &[u8]) -> Result<Vec<(String, String)>, ExtractError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                if let (Some(name), Some(rid)) = (attr(&e, b"name"), rel_id(&e)) {
                    sheets.push((name, rid));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(sheets)
}

/// Concatenated `text_tag` runs of every `block_tag` element.
fn blocks(xml: &[u8], block_tag: &[u8], text_tag: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut blocks = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = e.local_name();
                if name.as_ref() == block_tag {
                    current.clear();
                } else if name.as_ref() == text_tag {
                    in_text = true;
                }
            }
            Event::Empty(e) if e.local_name().as_ref() == block_tag => blocks.push(String::new()),
            Event::End(e) => {
                let name = e.local_name();
                if name.as_ref() == text_tag {
                    in_text = false;
                } else if name.as_ref() == block_tag {
                    blocks.push(std::mem::take(&mut current));
                }
            }
            Event::Text(t) if in_text => current.push_str(&String::from_utf8_lossy(&t)),
            Event::CData(t) if in_text => current.push_str(&String::from_utf8_lossy(&t)),
            Event::GeneralRef(r) if in_text => push_entity(&mut current, &r),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(blocks)
}

fn sheet_cells(xml: &[u8], shared: &[String]) -> Result<Vec<String>, ExtractError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut cells = Vec::new();
    let mut cell_type: Option<String> = None;
    let mut value = String::new();
    let mut in_value = false;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"c" => {
                    cell_type = attr(&e, b"t");
                    value.clear();
                }
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    let resolved = if cell_type.as_deref() == Some("s") {
                        value
                            .trim()
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| shared.get(i))
                            .cloned()
                            .unwrap_or_default()
                    } else {
                        std::mem::take(&mut value)
                    };
                    if !resolved.trim().is_empty() {
                        cells.push(resolved);
                    }
                }
                _ => {}
            },
            Event::Text(t) if in_value => value.push_str(&String::from_utf8_lossy(&t)),
            Event::GeneralRef(r) if in_value => push_entity(&mut value, &r),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(cells)
}
