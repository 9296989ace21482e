//! SpreadsheetML output.
//!
//! Each Markdown table becomes a worksheet named after the nearest preceding
//! heading. A document without tables becomes a single "Document" sheet with
//! one line of text per row.

use std::{collections::BTreeSet, fmt::Write as _, io};

use super::{
    document::{Block, plain},
    package::{Package, escape_xml},
};

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="2"><font><sz val="11"/><name val="Calibri"/></font><font><b/><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="3"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1"/><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0" applyAlignment="1"><alignment wrapText="1" vertical="top"/></xf></cellXfs></styleSheet>"#;

const SHEET_NAME_LIMIT: usize = 31;
const LETTERS: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

struct Sheet {
    name: String,
    rows: Vec<Vec<String>>,
    header: bool,
}

pub(super) fn write(blocks: &[Block]) -> io::Result<Vec<u8>> {
    let sheets = sheets(blocks);

    let mut package = Package::default();
    package.add("[Content_Types].xml", content_types(sheets.len()).as_bytes())?;
    package.add("_rels/.rels", PACKAGE_RELS.as_bytes())?;
    package.add("xl/workbook.xml", workbook(&sheets).as_bytes())?;
    package.add("xl/_rels/workbook.xml.rels", workbook_rels(sheets.len()).as_bytes())?;
    package.add("xl/styles.xml", STYLES.as_bytes())?;
    for (index, sheet) in sheets.iter().enumerate() {
        let name = format!("xl/worksheets/sheet{}.xml", index + 1);
        package.add(&name, worksheet(sheet).as_bytes())?;
    }
    package.finish()
}

fn sheets(blocks: &[Block]) -> Vec<Sheet> {
    let mut sheets = Vec::new();
    let mut used = BTreeSet::new();
    let mut heading = None;

    for block in blocks {
        match block {
            Block::Heading { runs, .. } => heading = Some(plain(runs)),
            Block::Table { header, rows } => {
                let base = heading
                    .clone()
                    .unwrap_or_else(|| format!("Table {}", sheets.len() + 1));
                let mut table = Vec::with_capacity(rows.len() + 1);
                table.push(header.clone());
                table.extend(rows.iter().cloned());
                sheets.push(Sheet {
                    name: unique_name(&base, &mut used),
                    rows: table,
                    header: true,
                });
            }
            _ => {}
        }
    }

    if sheets.is_empty() {
        let rows = blocks
            .iter()
            .flat_map(Block::lines)
            .map(|line| vec![line])
            .collect();
        sheets.push(Sheet {
            name: "Document".to_string(),
            rows,
            header: false,
        });
    }
    sheets
}

/// A sheet name Excel accepts that has not been used yet.
fn unique_name(base: &str, used: &mut BTreeSet<String>) -> String {
    let cleaned: String = base
        .chars()
        .map(|c| if matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\') { ' ' } else { c })
        .collect();
    let cleaned = cleaned.trim().trim_matches('\'');
    let cleaned = if cleaned.is_empty() { "Sheet" } else { cleaned };

    let mut suffix = 1;
    loop {
        let tail = if suffix == 1 {
            String::new()
        } else {
            format!(" ({suffix})")
        };
        let stem: String = cleaned
            .chars()
            .take(SHEET_NAME_LIMIT - tail.chars().count())
            .collect();
        let candidate = format!("{}{tail}", stem.trim_end());
        if used.insert(candidate.to_lowercase()) {
            return candidate;
        }
        suffix += 1;
    }
}

fn content_types(sheets: usize) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
    );
    for number in 1..=sheets {
        let _ = write!(
            xml,
            r#"<Override PartName="/xl/worksheets/sheet{number}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        );
    }
    xml.push_str("</Types>");
    xml
}

fn workbook(sheets: &[Sheet]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    );
    for (index, sheet) in sheets.iter().enumerate() {
        let number = index + 1;
        let _ = write!(
            xml,
            r#"<sheet name="{}" sheetId="{number}" r:id="rId{number}"/>"#,
            escape_xml(&sheet.name)
        );
    }
    xml.push_str("</sheets></workbook>");
    xml
}

fn workbook_rels(sheets: usize) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for number in 1..=sheets {
        let _ = write!(
            xml,
            r#"<Relationship Id="rId{number}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{number}.xml"/>"#
        );
    }
    let styles = sheets + 1;
    let _ = write!(
        xml,
        r#"<Relationship Id="rId{styles}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#
    );
    xml.push_str("</Relationships>");
    xml
}

fn worksheet(sheet: &Sheet) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    );
    if sheet.header {
        xml.push_str(r#"<sheetViews><sheetView workbookViewId="0"><pane ySplit="1" topLeftCell="A2" activePane="bottomLeft" state="frozen"/></sheetView></sheetViews>"#);
    }
    xml.push_str("<sheetData>");
    for (index, row) in sheet.rows.iter().enumerate() {
        let number = index + 1;
        let style = if sheet.header && index == 0 { 1 } else { 2 };
        let _ = write!(xml, r#"<row r="{number}">"#);
        for (column, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let _ = write!(
                xml,
                r#"<c r="{}{number}" t="inlineStr" s="{style}"><is><t xml:space="preserve">{}</t></is></c>"#,
                column_name(column),
                escape_xml(value)
            );
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Spreadsheet column letters for a zero-based index: `A`, ..., `Z`, `AA`, ...
fn column_name(index: usize) -> String {
    let mut name = Vec::new();
    let mut remaining = index + 1;
    while remaining > 0 {
        name.push(LETTERS[(remaining - 1) % 26]);
        remaining = (remaining - 1) / 26;
    }
    name.reverse();
    String::from_utf8(name).unwrap_or_default()
}
