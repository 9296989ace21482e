//! A flat block model of a Markdown document.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd, html};

/// A span of text with uniform formatting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Run {
    /// The text. May contain `\n` for hard line breaks.
    pub text: String,
    /// Bold.
    pub strong: bool,
    /// Italic.
    pub emphasis: bool,
    /// Inline code.
    pub code: bool,
}

/// A block-level element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// A heading, level 1 to 6.
    Heading {
        /// Heading level.
        level: u8,
        /// Content.
        runs: Vec<Run>,
    },
    /// A paragraph.
    Paragraph(Vec<Run>),
    /// A list item. Continuation paragraphs of an item have an empty marker.
    ListItem {
        /// Nesting depth, starting at zero.
        depth: usize,
        /// `•` or `N.`
        marker: String,
        /// Content.
        runs: Vec<Run>,
    },
    /// A table of plain-text cells.
    Table {
        /// Column headings.
        header: Vec<String>,
        /// Body rows.
        rows: Vec<Vec<String>>,
    },
    /// A code block, without the trailing newline.
    Code(String),
    /// A thematic break.
    Rule,
}

impl Block {
    /// The block as lines of plain text. Tables yield one line per row with
    /// cells separated by ` | `.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        match self {
            Self::Heading { runs, .. } | Self::Paragraph(runs) => vec![plain(runs)],
            Self::ListItem { marker, runs, .. } if marker.is_empty() => vec![plain(runs)],
            Self::ListItem { marker, runs, .. } => vec![format!("{marker} {}", plain(runs))],
            Self::Table { header, rows } => std::iter::once(header)
                .chain(rows)
                .map(|row| row.join(" | "))
                .collect(),
            Self::Code(code) => code.lines().map(str::to_string).collect(),
            Self::Rule => Vec::new(),
        }
    }
}

/// The concatenated text of `runs`.
#[must_use]
pub fn plain(runs: &[Run]) -> String {
    runs.iter().map(|run| run.text.as_str()).collect()
}

fn options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS
}

/// Render Markdown to HTML. Raw HTML in the source is written as escaped
/// text, except for `<br>`.
pub(super) fn to_html(markdown: &str) -> String {
    let events = Parser::new_ext(markdown, options()).map(|event| match event {
        Event::Html(html) | Event::InlineHtml(html) if is_break(&html) => Event::HardBreak,
        Event::Html(html) | Event::InlineHtml(html) => Event::Text(html),
        other => other,
    });
    let mut out = String::new();
    html::push_html(&mut out, events);
    out
}

fn is_break(html: &str) -> bool {
    matches!(
        html.trim().to_ascii_lowercase().as_str(),
        "<br>" | "<br/>" | "<br />"
    )
}

/// Parse Markdown into blocks. Block quotes are flattened into their content
/// and raw HTML is dropped, except for `<br>` which becomes a line break.
#[must_use]
pub fn parse(markdown: &str) -> Vec<Block> {
    let mut builder = Builder::default();
    for event in Parser::new_ext(markdown, options()) {
        builder.event(event);
    }
    builder.blocks
}

#[derive(Default)]
struct TableBuilder {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    row: Vec<String>,
}

#[derive(Default)]
struct Builder {
    blocks: Vec<Block>,
    runs: Vec<Run>,
    strong: usize,
    emphasis: usize,
    lists: Vec<Option<u64>>,
    marker: Option<String>,
    code: Option<String>,
    table: Option<TableBuilder>,
}

impl Builder {
    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => match &mut self.code {
                Some(code) => code.push_str(&text),
                None => self.push_text(&text, false),
            },
            Event::Code(text) => self.push_text(&text, true),
            Event::SoftBreak => self.push_text(" ", false),
            Event::HardBreak => self.push_text("\n", false),
            Event::Html(html) | Event::InlineHtml(html) => {
                if is_break(&html) {
                    self.push_text("\n", false);
                }
            }
            Event::TaskListMarker(done) => self.push_text(if done { "[x] " } else { "[ ] " }, false),
            Event::Rule => self.blocks.push(Block::Rule),
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Strong => self.strong += 1,
            Tag::Emphasis => self.emphasis += 1,
            Tag::List(start) => {
                self.flush_item();
                self.lists.push(start);
            }
            Tag::Item => {
                let marker = match self.lists.last_mut() {
                    Some(Some(number)) => {
                        let marker = format!("{number}.");
                        *number += 1;
                        marker
                    }
                    _ => "•".to_string(),
                };
                self.marker = Some(marker);
            }
            Tag::CodeBlock(_) => self.code = Some(String::new()),
            Tag::Table(_) => self.table = Some(TableBuilder::default()),
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Strong => self.strong = self.strong.saturating_sub(1),
            TagEnd::Emphasis => self.emphasis = self.emphasis.saturating_sub(1),
            TagEnd::Heading(level) => {
                let runs = std::mem::take(&mut self.runs);
                self.blocks.push(Block::Heading {
                    level: level as u8,
                    runs,
                });
            }
            TagEnd::Paragraph => {
                if self.lists.is_empty() {
                    let runs = std::mem::take(&mut self.runs);
                    self.blocks.push(Block::Paragraph(runs));
                } else {
                    self.flush_item();
                }
            }
            TagEnd::Item => {
                if !self.runs.is_empty() || self.marker.is_some() {
                    self.flush_item();
                }
            }
            TagEnd::List(_) => {
                self.lists.pop();
            }
            TagEnd::CodeBlock => {
                if let Some(code) = self.code.take() {
                    self.blocks
                        .push(Block::Code(code.trim_end_matches('\n').to_string()));
                }
            }
            TagEnd::TableCell => {
                let cell = plain(&std::mem::take(&mut self.runs));
                if let Some(table) = &mut self.table {
                    table.row.push(cell);
                }
            }
            TagEnd::TableHead => {
                if let Some(table) = &mut self.table {
                    table.header = std::mem::take(&mut table.row);
                }
            }
            TagEnd::TableRow => {
                if let Some(table) = &mut self.table {
                    let row = std::mem::take(&mut table.row);
                    table.rows.push(row);
                }
            }
            TagEnd::Table => {
                if let Some(table) = self.table.take() {
                    self.blocks.push(Block::Table {
                        header: table.header,
                        rows: table.rows,
                    });
                }
            }
            _ => {}
        }
    }

    fn push_text(&mut self, text: &str, code: bool) {
        let strong = self.strong > 0;
        let emphasis = self.emphasis > 0;
        match self.runs.last_mut() {
            Some(last) if last.strong == strong && last.emphasis == emphasis && last.code == code => {
                last.text.push_str(text);
            }
            _ => self.runs.push(Run {
                text: text.to_string(),
                strong,
                emphasis,
                code,
            }),
        }
    }

    fn flush_item(&mut self) {
        if self.runs.is_empty() && self.marker.is_none() {
            return;
        }
        let runs = std::mem::take(&mut self.runs);
        self.blocks.push(Block::ListItem {
            depth: self.lists.len().saturating_sub(1),
            marker: self.marker.take().unwrap_or_default(),
            runs,
        });
    }
}
