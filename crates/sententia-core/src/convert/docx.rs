//! WordprocessingML output.

use std::{fmt::Write as _, io};

use super::{
    document::{Block, Run},
    package::{Package, escape_xml},
};

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

const STYLES_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="Calibri" w:hAnsi="Calibri" w:cs="Calibri"/><w:sz w:val="22"/></w:rPr></w:rPrDefault><w:pPrDefault><w:pPr><w:spacing w:after="120"/></w:pPr></w:pPrDefault></w:docDefaults><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style><w:style w:type="paragraph" w:styleId="Code"><w:name w:val="Code"/><w:basedOn w:val="Normal"/><w:pPr><w:spacing w:after="0"/></w:pPr><w:rPr><w:rFonts w:ascii="Courier New" w:hAnsi="Courier New"/><w:sz w:val="18"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="ListParagraph"><w:name w:val="List Paragraph"/><w:basedOn w:val="Normal"/></w:style><w:style w:type="table" w:styleId="TableGrid"><w:name w:val="Table Grid"/><w:tblPr><w:tblBorders><w:top w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:left w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:bottom w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:right w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:insideH w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:insideV w:val="single" w:sz="4" w:space="0" w:color="auto"/></w:tblBorders></w:tblPr></w:style>"#;

/// Half-point sizes of heading levels 1 to 6.
const HEADING_SIZES: [u32; 6] = [36, 30, 26, 24, 22, 22];

pub(super) fn write(blocks: &[Block]) -> io::Result<Vec<u8>> {
    let mut package = Package::default();
    package.add("[Content_Types].xml", CONTENT_TYPES.as_bytes())?;
    package.add("_rels/.rels", PACKAGE_RELS.as_bytes())?;
    package.add("word/_rels/document.xml.rels", DOCUMENT_RELS.as_bytes())?;
    package.add("word/styles.xml", styles().as_bytes())?;
    package.add("word/document.xml", document(blocks).as_bytes())?;
    package.finish()
}

fn styles() -> String {
    let mut xml = String::from(STYLES_HEAD);
    for (index, size) in HEADING_SIZES.iter().enumerate() {
        let level = index + 1;
        let _ = write!(
            xml,
            r#"<w:style w:type="paragraph" w:styleId="Heading{level}"><w:name w:val="heading {level}"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:keepNext/><w:spacing w:before="240" w:after="120"/><w:outlineLvl w:val="{index}"/></w:pPr><w:rPr><w:b/><w:sz w:val="{size}"/></w:rPr></w:style>"#
        );
    }
    xml.push_str("</w:styles>");
    xml
}

fn document(blocks: &[Block]) -> String {
    let mut body = String::new();
    for block in blocks {
        match block {
            Block::Heading { level, runs } => {
                let level = (*level).clamp(1, 6);
                paragraph(&mut body, &format!(r#"<w:pStyle w:val="Heading{level}"/>"#), runs);
            }
            Block::Paragraph(runs) => paragraph(&mut body, "", runs),
            Block::ListItem {
                depth,
                marker,
                runs,
            } => {
                let left = 360 * (depth + 1);
                let properties = format!(
                    r#"<w:pStyle w:val="ListParagraph"/><w:ind w:left="{left}" w:hanging="360"/>"#
                );
                let mut runs = runs.clone();
                if !marker.is_empty() {
                    runs.insert(
                        0,
                        Run {
                            text: format!("{marker}\t"),
                            ..Run::default()
                        },
                    );
                }
                paragraph(&mut body, &properties, &runs);
            }
            Block::Table { header, rows } => table(&mut body, header, rows),
            Block::Code(code) => {
                for line in code.lines() {
                    let run = Run {
                        text: line.to_string(),
                        ..Run::default()
                    };
                    paragraph(&mut body, r#"<w:pStyle w:val="Code"/>"#, &[run]);
                }
            }
            Block::Rule => body.push_str(
                r#"<w:p><w:pPr><w:pBdr><w:bottom w:val="single" w:sz="6" w:space="1" w:color="auto"/></w:pBdr></w:pPr></w:p>"#,
            ),
        }
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr></w:body></w:document>"#
    )
}

fn paragraph(out: &mut String, properties: &str, runs: &[Run]) {
    out.push_str("<w:p>");
    if !properties.is_empty() {
        let _ = write!(out, "<w:pPr>{properties}</w:pPr>");
    }
    for run in runs {
        write_run(out, run);
    }
    out.push_str("</w:p>");
}

fn write_run(out: &mut String, run: &Run) {
    out.push_str("<w:r>");
    if run.strong || run.emphasis || run.code {
        out.push_str("<w:rPr>");
        if run.code {
            out.push_str(r#"<w:rFonts w:ascii="Courier New" w:hAnsi="Courier New"/>"#);
        }
        if run.strong {
            out.push_str("<w:b/>");
        }
        if run.emphasis {
            out.push_str("<w:i/>");
        }
        out.push_str("</w:rPr>");
    }
    for (index, line) in run.text.split('\n').enumerate() {
        if index > 0 {
            out.push_str("<w:br/>");
        }
        for (index, piece) in line.split('\t').enumerate() {
            if index > 0 {
                out.push_str("<w:tab/>");
            }
            if !piece.is_empty() {
                let _ = write!(out, r#"<w:t xml:space="preserve">{}</w:t>"#, escape_xml(piece));
            }
        }
    }
    out.push_str("</w:r>");
}

fn table(out: &mut String, header: &[String], rows: &[Vec<String>]) {
    let columns = std::iter::once(header)
        .chain(rows.iter().map(Vec::as_slice))
        .map(<[String]>::len)
        .max()
        .unwrap_or_default();

    out.push_str(
        r#"<w:tbl><w:tblPr><w:tblStyle w:val="TableGrid"/><w:tblW w:w="0" w:type="auto"/></w:tblPr><w:tblGrid>"#,
    );
    for _ in 0..columns {
        out.push_str("<w:gridCol/>");
    }
    out.push_str("</w:tblGrid>");

    table_row(out, header, columns, true);
    for row in rows {
        table_row(out, row, columns, false);
    }
    out.push_str("</w:tbl>");
    // Word requires a paragraph between adjacent tables
    out.push_str("<w:p/>");
}

fn table_row(out: &mut String, cells: &[String], columns: usize, heading: bool) {
    out.push_str("<w:tr>");
    if heading {
        out.push_str("<w:trPr><w:tblHeader/></w:trPr>");
    }
    for index in 0..columns {
        let run = Run {
            text: cells.get(index).cloned().unwrap_or_default(),
            strong: heading,
            ..Run::default()
        };
        out.push_str("<w:tc>");
        paragraph(out, "", &[run]);
        out.push_str("</w:tc>");
    }
    out.push_str("</w:tr>");
}
