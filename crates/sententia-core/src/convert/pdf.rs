//! PDF output: A4 pages of word-wrapped Helvetica text.

use lopdf::{
    Dictionary, Document, Object, Stream,
    content::{Content, Operation},
    dictionary,
};

use super::{
    ConvertError,
    document::{Block, plain},
};

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 56;
const BODY_SIZE: i64 = 10;
const INDENT: i64 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Font {
    Regular,
    Bold,
    Mono,
}

impl Font {
    const fn resource(self) -> &'static str {
        match self {
            Self::Regular => "F1",
            Self::Bold => "F2",
            Self::Mono => "F3",
        }
    }

    /// Average glyph width in thousandths of the font size.
    const fn average_width(self) -> i64 {
        match self {
            Self::Regular => 500,
            Self::Bold => 560,
            Self::Mono => 600,
        }
    }
}

/// Lays out lines top to bottom, starting a new page when one fills up.
struct Pages {
    pages: Vec<Vec<Operation>>,
    y: i64,
}

impl Pages {
    fn new() -> Self {
        Self {
            pages: vec![Vec::new()],
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn current(&mut self) -> &mut Vec<Operation> {
        if self.pages.is_empty() {
            self.pages.push(Vec::new());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn reserve(&mut self, height: i64) {
        if self.y - height < MARGIN {
            self.pages.push(Vec::new());
            self.y = PAGE_HEIGHT - MARGIN;
        }
    }

    fn gap(&mut self, height: i64) {
        self.y -= height;
    }

    /// Write `text`, wrapped to the available width.
    fn text(&mut self, text: &str, font: Font, size: i64, indent: i64) {
        let width = PAGE_WIDTH - 2 * MARGIN - indent;
        let columns = usize::try_from(width * 1000 / (size * font.average_width())).unwrap_or(1);
        let leading = size * 14 / 10;

        for line in text.split('\n').flat_map(|line| wrap(line, columns.max(1))) {
            self.reserve(leading);
            self.y -= leading;
            let y = self.y;
            self.current().extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![font.resource().into(), size.into()]),
                Operation::new("Td", vec![(MARGIN + indent).into(), y.into()]),
                Operation::new("Tj", vec![Object::string_literal(encode(&line))]),
                Operation::new("ET", vec![]),
            ]);
        }
    }

    fn rule(&mut self) {
        self.reserve(12);
        self.y -= 6;
        let y = self.y;
        self.current().extend([
            Operation::new("w", vec![Object::Real(0.5)]),
            Operation::new("m", vec![MARGIN.into(), y.into()]),
            Operation::new("l", vec![(PAGE_WIDTH - MARGIN).into(), y.into()]),
            Operation::new("S", vec![]),
        ]);
        self.y -= 6;
    }
}

/// Greedy word wrap to at most `columns` characters per line. Words longer
/// than a line are split.
fn wrap(text: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > columns {
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            lines.push(word.drain(..columns).collect());
        }
        let word: String = word.into_iter().collect();
        if line.is_empty() {
            line = word;
        } else if line.chars().count() + 1 + word.chars().count() <= columns {
            line.push(' ');
            line.push_str(&word);
        } else {
            lines.push(std::mem::replace(&mut line, word));
        }
    }
    if !line.is_empty() || lines.is_empty() {
        lines.push(line);
    }
    lines
}

/// Encode text for the WinAnsi-encoded standard fonts. Characters outside the
/// encoding become `?`.
fn encode(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '€' => 0x80,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '\t' => b' ',
            c => u8::try_from(u32::from(c))
                .ok()
                .filter(|byte| *byte >= 0x20 && !(0x7f..0xa0).contains(byte))
                .unwrap_or(b'?'),
        })
        .collect()
}

fn lay_out(blocks: &[Block]) -> Vec<Vec<Operation>> {
    let mut pages = Pages::new();
    for block in blocks {
        match block {
            Block::Heading { level, runs } => {
                let size = match *level {
                    1 => 18,
                    2 => 14,
                    3 => 12,
                    _ => 11,
                };
                pages.gap(size / 2);
                pages.reserve(size * 3);
                pages.text(&plain(runs), Font::Bold, size, 0);
                pages.gap(4);
            }
            Block::Paragraph(runs) => {
                pages.text(&plain(runs), Font::Regular, BODY_SIZE, 0);
                pages.gap(6);
            }
            Block::ListItem { depth, .. } => {
                let depth = i64::try_from(*depth).unwrap_or(0);
                for line in block.lines() {
                    pages.text(&line, Font::Regular, BODY_SIZE, INDENT * (depth + 1));
                }
                pages.gap(2);
            }
            Block::Table { header, rows } => {
                pages.text(&header.join(" | "), Font::Bold, BODY_SIZE - 1, 0);
                for row in rows {
                    let row: Vec<_> = row.iter().map(|cell| cell.replace('\n', " ")).collect();
                    pages.text(&row.join(" | "), Font::Regular, BODY_SIZE - 1, 0);
                }
                pages.gap(6);
            }
            Block::Code(code) => {
                for line in code.lines() {
                    pages.text(line, Font::Mono, BODY_SIZE - 1, INDENT);
                }
                pages.gap(6);
            }
            Block::Rule => pages.rule(),
        }
    }
    pages.pages
}

pub(super) fn write(blocks: &[Block]) -> Result<Vec<u8>, ConvertError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font = |doc: &mut Document, name: &str| {
        doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => name,
            "Encoding" => "WinAnsiEncoding",
        })
    };
    let regular = font(&mut doc, "Helvetica");
    let bold = font(&mut doc, "Helvetica-Bold");
    let mono = font(&mut doc, "Courier");
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular,
            "F2" => bold,
            "F3" => mono,
        },
    });

    let mut kids = Vec::new();
    for operations in lay_out(blocks) {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::from(page_id));
    }

    let count = i64::try_from(kids.len()).unwrap_or(i64::MAX);
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::convert::document::parse;

    #[test_case("one two three", 7, &["one two", "three"])]
    #[test_case("", 10, &[""]; "empty")]
    #[test_case("abcdefghij kl", 4, &["abcd", "efgh", "ij", "kl"]; "long word")]
    fn wrapping(text: &str, columns: usize, expected: &[&str]) {
        assert_eq!(wrap(text, columns), expected);
    }

    #[test]
    fn encoding_uses_win_ansi() {
        assert_eq!(encode("a•é✓"), [b'a', 0x95, 0xe9, b'?']);
    }

    #[test]
    fn long_documents_paginate() {
        let markdown: String = (0..200).map(|n| format!("Paragraph number {n}.\n\n")).collect();
        assert!(lay_out(&parse(&markdown)).len() > 1);
    }

    #[test]
    fn writes_a_pdf() {
        let bytes = write(&parse("# Title\n\nBody.\n\n---\n\n- item\n")).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        assert!(Document::load_mem(&bytes).is_ok());
    }
}
