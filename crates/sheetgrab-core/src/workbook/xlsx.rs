//! `.xlsx` load and save.
//!
//! Values are read with calamine. calamine does not expose hyperlinks, so
//! external hyperlink targets are read from the package directly: sheet name
//! to sheet part via `xl/workbook.xml` and its relationships, then the
//! `<hyperlink ref r:id>` nodes of each sheet resolved through the sheet's
//! own relationships.
//!
//! A loaded workbook is saved by copying its package entry by entry. Only
//! the worksheet parts holding rewritten cells are re-serialized, and in
//! them only the rewritten `<c>` nodes (written as inline strings that keep
//! their style) and their `<hyperlink>` nodes change. A workbook built in
//! memory has no package to patch and is written with rust_xlsxwriter.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, Read, Seek, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use calamine::{open_workbook, Data, Reader, Xlsx};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader as XmlReader, Writer as XmlWriter};
use rust_xlsxwriter::{Url, Worksheet};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{Cell, CellPos, CellValue, Sheet, Workbook};
use crate::storage::temp_path;

/// Worksheet part of one sheet and its external hyperlinks.
#[derive(Debug)]
struct SheetPart {
    path: String,
    links: Vec<(CellPos, String)>,
}

/// Reads values and external hyperlinks of every sheet, in workbook order.
pub fn load(path: &Path) -> Result<Workbook> {
    let mut book: Xlsx<_> =
        open_workbook(path).with_context(|| format!("open workbook {}", path.display()))?;
    let mut parts = read_sheet_parts(path)
        .with_context(|| format!("read hyperlinks of {}", path.display()))?;

    let mut sheets = Vec::new();
    for name in book.sheet_names() {
        let range = book
            .worksheet_range(&name)
            .with_context(|| format!("read sheet {name:?}"))?;
        let mut sheet = Sheet::new(name.as_str());

        if let Some((row0, col0)) = range.start() {
            for (r, c, data) in range.cells() {
                let Some(value) = cell_value(data) else {
                    continue;
                };
                let row = row0 + r as u32;
                let col = u16::try_from(col0 as usize + c)
                    .with_context(|| format!("column out of range in sheet {name:?}"))?;
                sheet.set_value((row, col), value);
            }
        }

        if let Some(part) = parts.remove(&name) {
            for (pos, target) in part.links {
                sheet.set_hyperlink(pos, target);
            }
            sheet.part = Some(part.path);
        }
        sheets.push(sheet);
    }

    Ok(Workbook {
        sheets,
        source: Some(path.to_path_buf()),
    })
}

/// Writes `book` to `path` through a `.part` file renamed into place.
pub fn save(book: &Workbook, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(path);
    match book.source() {
        Some(source) => patch_package(book, source, &tmp)
            .with_context(|| format!("patch {} into {}", source.display(), tmp.display()))?,
        None => write_new(book, &tmp)?,
    }
    fs::rename(&tmp, path).with_context(|| format!("rename into {}", path.display()))?;
    Ok(())
}

fn patch_package(book: &Workbook, source: &Path, out: &Path) -> Result<()> {
    let mut archive = ZipArchive::new(BufReader::new(File::open(source)?))?;

    let mut patched: HashMap<String, String> = HashMap::new();
    for sheet in &book.sheets {
        let edits: BTreeMap<CellPos, String> = sheet
            .rewritten()
            .filter_map(|pos| {
                let value = sheet.cell(pos)?.value.as_ref()?;
                Some((pos, value.to_string()))
            })
            .collect();
        if edits.is_empty() {
            continue;
        }
        let Some(part) = &sheet.part else {
            bail!("sheet {:?} has no worksheet part", sheet.name);
        };
        let Some(xml) = read_part(&mut archive, part)? else {
            bail!("worksheet part {part} missing from package");
        };
        let xml = patch_sheet_xml(&xml, &edits)
            .with_context(|| format!("rewrite cells of sheet {:?}", sheet.name))?;
        patched.insert(part.clone(), xml);
    }

    let mut writer = ZipWriter::new(File::create(out)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index)?;
        let name = entry.name().to_string();
        match patched.remove(&name) {
            Some(xml) => {
                writer.start_file(name, options)?;
                writer.write_all(xml.as_bytes())?;
            }
            None => writer.raw_copy_file(entry)?,
        }
    }
    writer.finish()?;
    Ok(())
}

fn write_new(book: &Workbook, out_path: &Path) -> Result<()> {
    let mut out = rust_xlsxwriter::Workbook::new();
    for sheet in &book.sheets {
        let worksheet = out.add_worksheet();
        worksheet
            .set_name(&sheet.name)
            .with_context(|| format!("sheet name {:?}", sheet.name))?;
        for ((row, col), cell) in sheet.cells() {
            write_cell(worksheet, row, col, cell)
                .with_context(|| format!("write cell ({row}, {col}) of sheet {:?}", sheet.name))?;
        }
    }
    out.save(out_path)
        .with_context(|| format!("save workbook {}", out_path.display()))?;
    Ok(())
}

type XmlOut = XmlWriter<Vec<u8>>;

/// Rewrites the cells in `edits` of one worksheet part and leaves every
/// other node as it was. A rewritten cell keeps its `s` style attribute;
/// cells and rows missing from `<sheetData>` are inserted in order.
/// `<hyperlink>` nodes whose whole range was rewritten are removed, and
/// `<hyperlinks>` with them when nothing is left.
fn patch_sheet_xml(xml: &str, edits: &BTreeMap<CellPos, String>) -> Result<String> {
    let mut reader = XmlReader::from_str(xml);
    let mut writer = XmlWriter::new(Vec::new());
    let mut pending = edits.clone();

    // Namespace prefix of `<sheetData>` children, `""` or `"x:"`.
    let mut prefix = String::new();
    let mut row: Option<u32> = None;
    let mut last_row: Option<u32> = None;
    let mut last_col: Option<u16> = None;
    let mut links: Option<(BytesStart<'static>, Vec<Event<'static>>)> = None;

    loop {
        let event = reader.read_event()?;

        if let Some((start, buffered)) = links.as_mut() {
            if matches!(&event, Event::End(e) if e.local_name().as_ref() == b"hyperlinks") {
                if buffered.iter().any(|ev| is_element(ev, b"hyperlink")) {
                    writer.write_event(Event::Start(start.clone()))?;
                    for ev in buffered.drain(..) {
                        writer.write_event(ev)?;
                    }
                    writer.write_event(event)?;
                }
                links = None;
                continue;
            }
            match event {
                Event::Start(e) if link_rewritten(&e, edits) => {
                    reader.read_to_end(e.name())?;
                }
                Event::Empty(e) if link_rewritten(&e, edits) => {}
                Event::Eof => bail!("unterminated <hyperlinks>"),
                other => buffered.push(other.into_owned()),
            }
            continue;
        }

        match event {
            Event::Eof => break,
            Event::Start(e) if e.local_name().as_ref() == b"hyperlinks" => {
                links = Some((e.into_owned(), Vec::new()));
            }
            Event::Empty(e) if e.local_name().as_ref() == b"sheetData" => {
                prefix = element_prefix(&e);
                if pending.is_empty() {
                    writer.write_event(Event::Empty(e))?;
                } else {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    writer.write_event(Event::Start(e))?;
                    flush_rows(&mut writer, &mut pending, None, &prefix)?;
                    writer.write_event(Event::End(BytesEnd::new(name)))?;
                }
            }
            Event::Start(e) if e.local_name().as_ref() == b"sheetData" => {
                prefix = element_prefix(&e);
                writer.write_event(Event::Start(e))?;
            }
            Event::End(e) if e.local_name().as_ref() == b"sheetData" => {
                flush_rows(&mut writer, &mut pending, None, &prefix)?;
                writer.write_event(Event::End(e))?;
            }
            Event::Start(e) if e.local_name().as_ref() == b"row" => {
                let r = row_number(&e, last_row);
                flush_rows(&mut writer, &mut pending, Some(r), &prefix)?;
                row = Some(r);
                last_row = Some(r);
                last_col = None;
                writer.write_event(Event::Start(e))?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                let r = row_number(&e, last_row);
                flush_rows(&mut writer, &mut pending, Some(r), &prefix)?;
                last_row = Some(r);
                if pending.range((r, 0)..=(r, u16::MAX)).next().is_some() {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    writer.write_event(Event::Start(e))?;
                    flush_cells(&mut writer, &mut pending, r, None, &prefix)?;
                    writer.write_event(Event::End(BytesEnd::new(name)))?;
                } else {
                    writer.write_event(Event::Empty(e))?;
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"row" => {
                if let Some(r) = row.take() {
                    flush_cells(&mut writer, &mut pending, r, None, &prefix)?;
                }
                writer.write_event(Event::End(e))?;
            }
            Event::Start(e) if row.is_some() && e.local_name().as_ref() == b"c" => {
                let pos = cell_position(&e, row.unwrap_or_default(), last_col);
                last_col = Some(pos.1);
                flush_cells(&mut writer, &mut pending, pos.0, Some(pos.1), &prefix)?;
                match pending.remove(&pos) {
                    Some(text) => {
                        reader.read_to_end(e.name())?;
                        write_inline_cell(&mut writer, pos, &text, attr_value(&e, b"s"), &prefix)?;
                    }
                    None => writer.write_event(Event::Start(e))?,
                }
            }
            Event::Empty(e) if row.is_some() && e.local_name().as_ref() == b"c" => {
                let pos = cell_position(&e, row.unwrap_or_default(), last_col);
                last_col = Some(pos.1);
                flush_cells(&mut writer, &mut pending, pos.0, Some(pos.1), &prefix)?;
                match pending.remove(&pos) {
                    Some(text) => {
                        write_inline_cell(&mut writer, pos, &text, attr_value(&e, b"s"), &prefix)?
                    }
                    None => writer.write_event(Event::Empty(e))?,
                }
            }
            other => writer.write_event(other)?,
        }
    }

    if !pending.is_empty() {
        bail!("worksheet has no <sheetData> for {} rewritten cells", pending.len());
    }
    Ok(String::from_utf8(writer.into_inner())?)
}

fn is_element(event: &Event<'_>, local: &[u8]) -> bool {
    matches!(event, Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == local)
}

/// A `<hyperlink>` whose every covered cell is being rewritten.
fn link_rewritten(e: &BytesStart<'_>, edits: &BTreeMap<CellPos, String>) -> bool {
    if e.local_name().as_ref() != b"hyperlink" {
        return false;
    }
    let cells = attr_value(e, b"ref")
        .map(|cell_ref| expand_ref(&cell_ref))
        .unwrap_or_default();
    !cells.is_empty() && cells.iter().all(|pos| edits.contains_key(pos))
}

/// `"x:"` for `<x:sheetData>`, empty for the default namespace.
fn element_prefix(e: &BytesStart<'_>) -> String {
    e.name()
        .prefix()
        .map(|p| format!("{}:", String::from_utf8_lossy(p.as_ref())))
        .unwrap_or_default()
}

/// Zero-based row of a `<row>`; rows without `r` follow the previous one.
fn row_number(e: &BytesStart<'_>, last_row: Option<u32>) -> u32 {
    attr_value(e, b"r")
        .and_then(|r| r.parse::<u32>().ok())
        .and_then(|r| r.checked_sub(1))
        .unwrap_or_else(|| last_row.map_or(0, |r| r + 1))
}

/// Position of a `<c>`; cells without `r` follow the previous one in the row.
fn cell_position(e: &BytesStart<'_>, row: u32, last_col: Option<u16>) -> CellPos {
    attr_value(e, b"r")
        .and_then(|cell_ref| parse_cell_ref(&cell_ref))
        .unwrap_or((row, last_col.map_or(0, |c| c.saturating_add(1))))
}

/// Writes new rows for pending cells in rows before `before`, or all of them.
fn flush_rows(
    writer: &mut XmlOut,
    pending: &mut BTreeMap<CellPos, String>,
    before: Option<u32>,
    prefix: &str,
) -> Result<()> {
    loop {
        let Some(&(row, _)) = pending.keys().next() else {
            break;
        };
        if before.is_some_and(|b| row >= b) {
            break;
        }
        let name = format!("{prefix}row");
        let mut start = BytesStart::new(name.as_str());
        start.push_attribute(("r", (row + 1).to_string().as_str()));
        writer.write_event(Event::Start(start))?;
        flush_cells(writer, pending, row, None, prefix)?;
        writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
    }
    Ok(())
}

/// Writes pending cells of `row` left of column `before`, or all of them.
fn flush_cells(
    writer: &mut XmlOut,
    pending: &mut BTreeMap<CellPos, String>,
    row: u32,
    before: Option<u16>,
    prefix: &str,
) -> Result<()> {
    let end = before.map_or((row, u16::MAX), |col| (row, col));
    let due: Vec<CellPos> = pending
        .range((row, 0)..=end)
        .map(|(pos, _)| *pos)
        .filter(|&(_, col)| before.map_or(true, |b| col < b))
        .collect();
    for pos in due {
        if let Some(text) = pending.remove(&pos) {
            write_inline_cell(writer, pos, &text, None, prefix)?;
        }
    }
    Ok(())
}

/// `<c r=.. s=.. t="inlineStr"><is><t>text</t></is></c>`
fn write_inline_cell(
    writer: &mut XmlOut,
    pos: CellPos,
    text: &str,
    style: Option<String>,
    prefix: &str,
) -> Result<()> {
    let c = format!("{prefix}c");
    let is = format!("{prefix}is");
    let t = format!("{prefix}t");

    let mut cell = BytesStart::new(c.as_str());
    cell.push_attribute(("r", cell_ref(pos).as_str()));
    if let Some(style) = &style {
        cell.push_attribute(("s", style.as_str()));
    }
    cell.push_attribute(("t", "inlineStr"));
    let mut text_start = BytesStart::new(t.as_str());
    text_start.push_attribute(("xml:space", "preserve"));

    writer.write_event(Event::Start(cell))?;
    writer.write_event(Event::Start(BytesStart::new(is.as_str())))?;
    writer.write_event(Event::Start(text_start))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(t.as_str())))?;
    writer.write_event(Event::End(BytesEnd::new(is.as_str())))?;
    writer.write_event(Event::End(BytesEnd::new(c.as_str())))?;
    Ok(())
}
fn cell_value(data: &Data) -> Option<CellValue> {
    match data {
        Data::Empty => None,
        Data::String(s) => Some(CellValue::Text(s.clone())),
        Data::Float(f) => Some(CellValue::Number(*f)),
        Data::Int(i) => Some(CellValue::Number(*i as f64)),
        Data::Bool(b) => Some(CellValue::Bool(*b)),
        Data::DateTime(dt) => Some(CellValue::Number(dt.as_f64())),
        other => Some(CellValue::Text(other.to_string())),
    }
}

fn write_cell(worksheet: &mut Worksheet, row: u32, col: u16, cell: &Cell) -> Result<()> {
    if let Some(link) = &cell.hyperlink {
        let text = cell
            .value
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| link.clone());
        match worksheet.write_url_with_text(row, col, Url::new(link.as_str()), text) {
            Ok(_) => return Ok(()),
            Err(e) => tracing::warn!(row, col, link = %link, error = %e, "hyperlink dropped"),
        }
    }

    match &cell.value {
        Some(CellValue::Text(s)) => {
            worksheet.write_string(row, col, s)?;
        }
        Some(CellValue::Number(n)) => {
            worksheet.write_number(row, col, *n)?;
        }
        Some(CellValue::Bool(b)) => {
            worksheet.write_boolean(row, col, *b)?;
        }
        None => {}
    }
    Ok(())
}

/// Sheet name → worksheet part and external hyperlinks of that sheet.
fn read_sheet_parts(path: &Path) -> Result<HashMap<String, SheetPart>> {
    let mut zip = ZipArchive::new(BufReader::new(File::open(path)?))?;
    let workbook_xml = read_part(&mut zip, "xl/workbook.xml")?.unwrap_or_default();
    let workbook_rels = read_part(&mut zip, "xl/_rels/workbook.xml.rels")?.unwrap_or_default();

    let rel_targets = parse_relationship_targets(&workbook_rels)?;
    let mut out = HashMap::new();

    for (name, rid) in parse_sheet_rids(&workbook_xml)? {
        let Some(target) = rel_targets.get(&rid) else {
            continue;
        };
        let sheet_path = join_part_path("xl/", target);
        let Some(sheet_xml) = read_part(&mut zip, &sheet_path)? else {
            continue;
        };
        let mut part = SheetPart {
            links: Vec::new(),
            path: sheet_path,
        };
        let nodes = parse_hyperlink_nodes(&sheet_xml)?;
        if !nodes.is_empty() {
            let sheet_rels = read_part(&mut zip, &sheet_rels_path(&part.path))?.unwrap_or_default();
            let targets = parse_relationship_targets(&sheet_rels)?;
            for (cell_ref, rid) in nodes {
                let Some(target) = targets.get(&rid) else {
                    continue;
                };
                for pos in expand_ref(&cell_ref) {
                    part.links.push((pos, target.clone()));
                }
            }
        }
        out.insert(name, part);
    }
    Ok(out)
}

fn read_part<R: Read + Seek>(
    zip: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>> {
    let mut entry = match zip.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut xml = String::new();
    entry.read_to_string(&mut xml)?;
    Ok(Some(xml))
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

/// Relationship id attribute (`r:id`, whatever the namespace prefix).
fn rel_id(e: &BytesStart<'_>) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == b"id" && a.key.prefix().is_some())
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

/// Walks every start/empty element of `xml`.
fn for_each_element(xml: &str, mut f: impl FnMut(&BytesStart<'_>)) -> Result<()> {
    let mut reader = XmlReader::from_str(xml);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => f(&e),
            Event::Eof => return Ok(()),
            _ => {}
        }
    }
}

fn parse_relationship_targets(xml: &str) -> Result<HashMap<String, String>> {
    let mut out = HashMap::new();
    for_each_element(xml, |e| {
        if e.local_name().as_ref() == b"Relationship" {
            if let (Some(id), Some(target)) = (attr_value(e, b"Id"), attr_value(e, b"Target")) {
                out.insert(id, target);
            }
        }
    })?;
    Ok(out)
}

/// `(sheet name, relationship id)` in workbook order.
fn parse_sheet_rids(xml: &str) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for_each_element(xml, |e| {
        if e.local_name().as_ref() == b"sheet" {
            if let (Some(name), Some(rid)) = (attr_value(e, b"name"), rel_id(e)) {
                out.push((name, rid));
            }
        }
    })?;
    Ok(out)
}

/// `(ref, relationship id)` of external hyperlinks; internal links carry no id and are skipped.
fn parse_hyperlink_nodes(xml: &str) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for_each_element(xml, |e| {
        if e.local_name().as_ref() == b"hyperlink" {
            if let (Some(cell_ref), Some(rid)) = (attr_value(e, b"ref"), rel_id(e)) {
                out.push((cell_ref, rid));
            }
        }
    })?;
    Ok(out)
}

/// `xl/worksheets/sheet1.xml` → `xl/worksheets/_rels/sheet1.xml.rels`.
fn sheet_rels_path(sheet_path: &str) -> String {
    match sheet_path.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{sheet_path}.rels"),
    }
}

/// Resolves a relationship target against `base_dir`; absolute targets start at the package root.
fn join_part_path(base_dir: &str, target: &str) -> String {
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("{base_dir}{target}"),
    };
    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    parts.join("/")
}

/// `B3` → `(2, 1)`.
fn parse_cell_ref(cell_ref: &str) -> Option<CellPos> {
    let cell_ref = cell_ref.replace('$', "");
    let split = cell_ref.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cell_ref.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let col = letters
        .chars()
        .try_fold(0u32, |acc, c| {
            acc.checked_mul(26)?
                .checked_add(c.to_ascii_uppercase() as u32 - 'A' as u32 + 1)
        })?
        .checked_sub(1)?;
    let row = digits.parse::<u32>().ok()?.checked_sub(1)?;
    Some((row, u16::try_from(col).ok()?))
}

/// `(2, 1)` → `B3`.
fn cell_ref((row, col): CellPos) -> String {
    let mut letters = Vec::new();
    let mut n = u32::from(col) + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect::<String>() + &(row + 1).to_string()
}

/// Cells covered by `A1` or `A1:B3`.
fn expand_ref(cell_ref: &str) -> Vec<CellPos> {
    let (first, last) = match cell_ref.split_once(':') {
        Some((a, b)) => (parse_cell_ref(a), parse_cell_ref(b)),
        None => {
            let pos = parse_cell_ref(cell_ref);
            (pos, pos)
        }
    };
    let (Some((r0, c0)), Some((r1, c1))) = (first, last) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for row in r0.min(r1)..=r0.max(r1) {
        for col in c0.min(c1)..=c0.max(c1) {
            out.push((row, col));
        }
    }
    out
}
