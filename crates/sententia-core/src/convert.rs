//! Converting rendered Markdown into deliverable formats.
//!
//! Every conversion is a pure function of its input: converting the same text
//! twice yields byte-identical artifacts.

mod csv;
mod document;
mod docx;
mod package;
mod pdf;
mod xlsx;

use std::{fmt, str::FromStr};

pub use document::{Block, Run, parse};

/// An output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// The rendered text, unchanged.
    Markdown,
    /// An HTML fragment.
    Html,
    /// A Word document.
    Docx,
    /// A paginated A4 PDF.
    Pdf,
    /// An Excel workbook with one sheet per table.
    Xlsx,
    /// Comma-separated values.
    Csv,
}

impl Format {
    /// Every supported format.
    pub const ALL: &'static [Self] = &[
        Self::Markdown,
        Self::Html,
        Self::Docx,
        Self::Pdf,
        Self::Xlsx,
        Self::Csv,
    ];

    /// The name the format is selected by.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Docx => "docx",
            Self::Pdf => "pdf",
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
        }
    }

    /// The conventional file extension, without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Markdown => "md",
            other => other.name(),
        }
    }

    /// Whether the format is UTF-8 text rather than a binary container.
    #[must_use]
    pub const fn is_text(self) -> bool {
        matches!(self, Self::Markdown | Self::Html | Self::Csv)
    }

    /// The MIME type of the format.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Markdown => "text/markdown; charset=utf-8",
            Self::Html => "text/html; charset=utf-8",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Pdf => "application/pdf",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Csv => "text/csv; charset=utf-8",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = UnsupportedFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        if wanted == "md" {
            return Ok(Self::Markdown);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|format| format.name() == wanted)
            .ok_or_else(|| UnsupportedFormatError(s.to_string()))
    }
}

/// Returned when a format name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported format '{0}' (supported: markdown, html, docx, pdf, xlsx, csv)")]
pub struct UnsupportedFormatError(pub String);

/// Errors raised while converting a document.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// The requested format is not supported.
    #[error(transparent)]
    UnsupportedFormat(#[from] UnsupportedFormatError),

    /// Compressing or assembling the output failed.
    #[error("failed to encode document: {0}")]
    Encode(#[from] std::io::Error),

    /// The PDF writer failed.
    #[error("failed to write PDF: {0}")]
    Pdf(#[from] lopdf::Error),
}

/// A converted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// The format of `bytes`.
    pub format: Format,
    /// The encoded document.
    pub bytes: Vec<u8>,
}

impl Artifact {
    /// The MIME type of the artifact.
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        self.format.content_type()
    }

    /// A file name for the artifact with the given stem.
    #[must_use]
    pub fn file_name(&self, stem: &str) -> String {
        format!("{stem}.{}", self.format.extension())
    }
}

/// Convert rendered Markdown to `format`.
///
/// # Errors
///
/// Returns a [`ConvertError`] if an encoder fails.
#[tracing::instrument(level = "debug", skip(markdown), fields(bytes = markdown.len()))]
pub fn convert(markdown: &str, format: Format) -> Result<Artifact, ConvertError> {
    let bytes = match format {
        Format::Markdown => markdown.as_bytes().to_vec(),
        Format::Html => document::to_html(markdown).into_bytes(),
        Format::Csv => csv::write(&document::parse(markdown)).into_bytes(),
        Format::Docx => docx::write(&document::parse(markdown))?,
        Format::Xlsx => xlsx::write(&document::parse(markdown))?,
        Format::Pdf => pdf::write(&document::parse(markdown))?,
    };
    tracing::debug!(%format, size = bytes.len(), "converted");
    Ok(Artifact { format, bytes })
}

/// Convert rendered Markdown to the format named `format`.
///
/// # Errors
///
/// Returns [`ConvertError::UnsupportedFormat`] if the name is not recognised,
/// or any error from [`convert`].
pub fn convert_named(markdown: &str, format: &str) -> Result<Artifact, ConvertError> {
    convert(markdown, format.parse()?)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    const SAMPLE: &str = "\
# Register

Some *intro* text.

| ID | Title |
|---|---|
| R-001 | Login |
| R-002 | Logout \\| exit |

- one
- two
";

    #[test_case("markdown", Format::Markdown)]
    #[test_case("MD", Format::Markdown; "alias")]
    #[test_case("Pdf", Format::Pdf; "case insensitive")]
    #[test_case("xlsx", Format::Xlsx)]
    fn formats_parse(raw: &str, expected: Format) {
        assert_eq!(raw.parse::<Format>().unwrap(), expected);
    }

    #[test_case("rtf")]
    #[test_case(""; "empty")]
    #[test_case("docx2")]
    fn unsupported_formats(raw: &str) {
        assert_eq!(
            raw.parse::<Format>(),
            Err(UnsupportedFormatError(raw.to_string()))
        );
        assert!(matches!(
            convert_named(SAMPLE, raw),
            Err(ConvertError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn markdown_is_unchanged() {
        let artifact = convert(SAMPLE, Format::Markdown).unwrap();
        assert_eq!(artifact.bytes, SAMPLE.as_bytes());
        assert_eq!(artifact.file_name("register"), "register.md");
    }

    #[test]
    fn html_contains_the_table() {
        let html = String::from_utf8(convert(SAMPLE, Format::Html).unwrap().bytes).unwrap();
        assert!(html.contains("<h1>Register</h1>"));
        assert!(html.contains("<td>R-001</td>"));
        assert!(html.contains("<em>intro</em>"));
    }

    #[test]
    fn html_escapes_raw_markup() {
        let markdown = "\
| Title |
|---|
| <script>alert(1)</script> |
| one<br>two |

<div onclick=\"steal()\">block</div>
";
        let html = String::from_utf8(convert(markdown, Format::Html).unwrap().bytes).unwrap();
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<div"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains("one<br />"));
    }

    #[test]
    fn pdf_has_a_header() {
        let artifact = convert(SAMPLE, Format::Pdf).unwrap();
        assert!(artifact.bytes.starts_with(b"%PDF-"));
        assert_eq!(artifact.content_type(), "application/pdf");
    }

    #[test_case(Format::Html)]
    #[test_case(Format::Csv)]
    #[test_case(Format::Docx)]
    #[test_case(Format::Xlsx)]
    #[test_case(Format::Pdf)]
    fn conversion_is_deterministic(format: Format) {
        let first = convert(SAMPLE, format).unwrap();
        let second = convert(SAMPLE, format).unwrap();
        assert_eq!(first, second);
    }
}
