//! Deterministic ZIP archives for OOXML packages.
//!
//! Every entry is DEFLATE-compressed and stamped with the same fixed DOS
//! timestamp (1980-01-01 00:00), so identical parts always produce identical
//! archives.

use std::io::{self, Write};

use flate2::{Compression, Crc, write::DeflateEncoder};

const LOCAL_HEADER: u32 = 0x0403_4b50;
const CENTRAL_HEADER: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIRECTORY: u32 = 0x0605_4b50;
const VERSION: u16 = 20;
const DEFLATE: u16 = 8;
const DOS_TIME: u16 = 0;
const DOS_DATE: u16 = (1 << 5) | 1;

struct Entry {
    name: String,
    crc: u32,
    compressed_size: u32,
    size: u32,
    offset: u32,
}

/// An archive being assembled in memory.
#[derive(Default)]
pub(super) struct Package {
    bytes: Vec<u8>,
    entries: Vec<Entry>,
}

impl Package {
    /// Compress `data` and append it as `name`.
    pub(super) fn add(&mut self, name: &str, data: &[u8]) -> io::Result<()> {
        let mut crc = Crc::new();
        crc.update(data);

        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data)?;
        let compressed = encoder.finish()?;

        let entry = Entry {
            name: name.to_string(),
            crc: crc.sum(),
            compressed_size: to_u32(compressed.len())?,
            size: to_u32(data.len())?,
            offset: to_u32(self.bytes.len())?,
        };
        let name_len = to_u16(name.len())?;

        let out = &mut self.bytes;
        put_u32(out, LOCAL_HEADER);
        put_u16(out, VERSION);
        put_u16(out, 0); // flags
        put_u16(out, DEFLATE);
        put_u16(out, DOS_TIME);
        put_u16(out, DOS_DATE);
        put_u32(out, entry.crc);
        put_u32(out, entry.compressed_size);
        put_u32(out, entry.size);
        put_u16(out, name_len);
        put_u16(out, 0); // extra field length
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&compressed);

        self.entries.push(entry);
        Ok(())
    }

    /// Write the central directory and return the archive.
    pub(super) fn finish(self) -> io::Result<Vec<u8>> {
        let mut out = self.bytes;
        let directory_offset = to_u32(out.len())?;

        for entry in &self.entries {
            put_u32(&mut out, CENTRAL_HEADER);
            put_u16(&mut out, VERSION); // made by
            put_u16(&mut out, VERSION); // needed to extract
            put_u16(&mut out, 0);
            put_u16(&mut out, DEFLATE);
            put_u16(&mut out, DOS_TIME);
            put_u16(&mut out, DOS_DATE);
            put_u32(&mut out, entry.crc);
            put_u32(&mut out, entry.compressed_size);
            put_u32(&mut out, entry.size);
            put_u16(&mut out, to_u16(entry.name.len())?);
            put_u16(&mut out, 0); // extra field length
            put_u16(&mut out, 0); // comment length
            put_u16(&mut out, 0); // disk number
            put_u16(&mut out, 0); // internal attributes
            put_u32(&mut out, 0); // external attributes
            put_u32(&mut out, entry.offset);
            out.extend_from_slice(entry.name.as_bytes());
        }

        let directory_size = to_u32(out.len())? - directory_offset;
        let count = to_u16(self.entries.len())?;
        put_u32(&mut out, END_OF_CENTRAL_DIRECTORY);
        put_u16(&mut out, 0);
        put_u16(&mut out, 0);
        put_u16(&mut out, count);
        put_u16(&mut out, count);
        put_u32(&mut out, directory_size);
        put_u32(&mut out, directory_offset);
        put_u16(&mut out, 0); // comment length
        Ok(out)
    }
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn to_u32(value: usize) -> io::Result<u32> {
    u32::try_from(value).map_err(|_| io::Error::other("archive exceeds 4 GiB"))
}

fn to_u16(value: usize) -> io::Result<u16> {
    u16::try_from(value).map_err(|_| io::Error::other("too many entries or name too long"))
}

/// Escape text for use in XML character data or attribute values, dropping
/// characters XML 1.0 cannot represent.
pub(super) fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if c < ' ' => {}
            c => out.push(c),
        }
    }
    out
}

/// Read every entry of an archive written by [`Package`].
#[cfg(test)]
pub(super) fn read(archive: &[u8]) -> Vec<(String, Vec<u8>)> {
    use std::io::Read;

    use flate2::read::DeflateDecoder;

    let u16_at = |at: usize| usize::from(u16::from_le_bytes([archive[at], archive[at + 1]]));
    let u32_at = |at: usize| {
        u32::from_le_bytes([archive[at], archive[at + 1], archive[at + 2], archive[at + 3]]) as usize
    };

    let end = archive.len() - 22;
    assert_eq!(u32_at(end), END_OF_CENTRAL_DIRECTORY as usize);
    let count = u16_at(end + 10);
    let mut at = u32_at(end + 16);

    let mut entries = Vec::new();
    for _ in 0..count {
        assert_eq!(u32_at(at), CENTRAL_HEADER as usize);
        let crc = u32_at(at + 16);
        let compressed_size = u32_at(at + 20);
        let name_len = u16_at(at + 28);
        let offset = u32_at(at + 42);
        let name = String::from_utf8(archive[at + 46..at + 46 + name_len].to_vec()).unwrap();

        let data_start = offset + 30 + u16_at(offset + 26) + u16_at(offset + 28);
        let mut data = Vec::new();
        DeflateDecoder::new(&archive[data_start..data_start + compressed_size])
            .read_to_end(&mut data)
            .unwrap();
        let mut check = Crc::new();
        check.update(&data);
        assert_eq!(check.sum() as usize, crc, "crc mismatch for {name}");

        entries.push((name, data));
        at += 46 + name_len;
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_read_back() {
        let mut package = Package::default();
        package.add("a.txt", b"hello hello hello").unwrap();
        package.add("dir/b.xml", b"<b/>").unwrap();
        let archive = package.finish().unwrap();

        assert!(archive.starts_with(b"PK\x03\x04"));
        assert_eq!(
            read(&archive),
            [
                ("a.txt".to_string(), b"hello hello hello".to_vec()),
                ("dir/b.xml".to_string(), b"<b/>".to_vec()),
            ]
        );
    }

    #[test]
    fn xml_is_escaped() {
        assert_eq!(
            escape_xml("a < b & \"c\"\u{1}"),
            "a &lt; b &amp; &quot;c&quot;"
        );
    }
}
