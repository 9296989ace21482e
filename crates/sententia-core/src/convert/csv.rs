//! RFC 4180 output.
//!
//! Every table is written as CSV rows, header first, with a blank line between
//! tables. A document with no tables is written one line of text per row.

use super::document::Block;

pub(super) fn write(blocks: &[Block]) -> String {
    let tables: Vec<_> = blocks
        .iter()
        .filter_map(|block| match block {
            Block::Table { header, rows } => Some((header, rows)),
            _ => None,
        })
        .collect();

    let mut out = String::new();
    if tables.is_empty() {
        for line in blocks.iter().flat_map(Block::lines) {
            push_record(&mut out, std::slice::from_ref(&line));
        }
        return out;
    }

    for (index, (header, rows)) in tables.into_iter().enumerate() {
        if index > 0 {
            out.push_str("\r\n");
        }
        push_record(&mut out, header);
        for row in rows {
            push_record(&mut out, row);
        }
    }
    out
}

fn push_record(out: &mut String, fields: &[String]) {
    for (index, field) in fields.iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        if field.contains([',', '"', '\r', '\n']) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push_str("\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::document::parse;

    #[test]
    fn tables_become_records() {
        let markdown = "\
| Source Requirement | Link Type | Target Requirement |
|---|---|---|
| SYS-001 | Satisfies | BUS-001 |
| SWS-002 | Refines | SYS-001, \"draft\" |
";
        assert_eq!(
            write(&parse(markdown)),
            "Source Requirement,Link Type,Target Requirement\r\n\
             SYS-001,Satisfies,BUS-001\r\n\
             SWS-002,Refines,\"SYS-001, \"\"draft\"\"\"\r\n"
        );
    }

    #[test]
    fn multiple_tables_are_separated() {
        let markdown = "| A |\n|---|\n| 1 |\n\ntext\n\n| B |\n|---|\n| 2 |\n";
        assert_eq!(write(&parse(markdown)), "A\r\n1\r\n\r\nB\r\n2\r\n");
    }

    #[test]
    fn prose_is_written_by_line() {
        assert_eq!(
            write(&parse("# Title\n\nOne, two.\n")),
            "Title\r\n\"One, two.\"\r\n"
        );
    }

    #[test]
    fn multiline_cells_are_quoted() {
        assert_eq!(
            write(&parse("| Note |\n|---|\n| a<br>b |\n")),
            "Note\r\n\"a\nb\"\r\n"
        );
    }
}
