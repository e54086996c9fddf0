//! Memo file side-cars: the legacy fixed-block `.dbt` dialect and the
//! modern length-prefixed `.fpt` (and dBASE IV `.dbt`) dialect.

use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use encoding_rs::Encoding;

use crate::source::ByteSource;
use crate::{Error, Result};

const DEFAULT_BLOCK_SIZE: u64 = 512;
/// Legacy `.dbt` memo text is terminated by a run of two of these bytes.
const LEGACY_TERMINATOR: u8 = 0x1a;

/// Which of the two memo wire formats a side-car file uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoDialect {
    /// dBASE III `.dbt`: fixed 512-byte blocks, text terminated by
    /// `0x1A 0x1A`.
    LegacyFixedBlock,
    /// dBASE IV `.dbt` and FoxPro `.fpt`: variable block size declared in
    /// the header, each record prefixed by an 8-byte big-endian
    /// type+length tag.
    LengthPrefixed,
}

/// One decoded memo record.
#[derive(Clone, Debug, PartialEq)]
pub enum MemoEntry {
    /// A text memo (`M` fields, and `.fpt` type tag `1`).
    Text(String),
    /// An OLE object, picture, or other binary blob (`.fpt` type tag `0`,
    /// and every legacy `.dbt` record since that dialect has no type
    /// tag).
    Binary(Vec<u8>),
}

/// An open memo side-car file.
pub struct MemoFile {
    source: ByteSource,
    dialect: MemoDialect,
    block_size: u64,
    encoding: &'static Encoding,
}

impl MemoFile {
    /// Opens a memo file at `path` with an explicit dialect.
    pub fn open(path: impl AsRef<Path>, dialect: MemoDialect, encoding: &'static Encoding) -> Result<MemoFile> {
        MemoFile::from_source(ByteSource::open(path)?, dialect, encoding)
    }

    /// Wraps an already-open byte source as a memo file, reading its
    /// header to determine the block size.
    pub fn from_source(mut source: ByteSource, dialect: MemoDialect, encoding: &'static Encoding) -> Result<MemoFile> {
        if !source.is_seekable() {
            return Err(Error::RequiresSeek);
        }
        let mut header = [0u8; 24];
        source.read_at(0, &mut header)?;
        let block_size = match dialect {
            MemoDialect::LegacyFixedBlock => DEFAULT_BLOCK_SIZE,
            MemoDialect::LengthPrefixed => {
                let declared = BigEndian::read_u16(&header[6..8]) as u64;
                if declared == 0 {
                    DEFAULT_BLOCK_SIZE
                } else {
                    declared
                }
            }
        };
        Ok(MemoFile {
            source,
            dialect,
            block_size,
            encoding,
        })
    }

    /// Reads the memo record at block `index` (1-based; block 0 is the
    /// header and is never a valid memo index).
    pub fn read(&mut self, index: u64) -> Result<MemoEntry> {
        if index == 0 {
            return Err(Error::MalformedMemo("memo index 0 refers to the file header".to_string()));
        }
        match self.dialect {
            MemoDialect::LegacyFixedBlock => self.read_legacy(index),
            MemoDialect::LengthPrefixed => self.read_length_prefixed(index),
        }
    }

    fn read_legacy(&mut self, index: u64) -> Result<MemoEntry> {
        let mut offset = index * self.block_size;
        let mut data = Vec::new();
        let mut block = vec![0u8; self.block_size as usize];
        loop {
            match self.source.read_at(offset, &mut block) {
                Ok(()) => {}
                Err(Error::Truncated { found, .. }) => {
                    // Last block of the file may be short; take what's there.
                    block.truncate(found);
                    if block.is_empty() {
                        break;
                    }
                    if let Some(end) = find_terminator(&block) {
                        data.extend_from_slice(&block[..end]);
                    } else {
                        data.extend_from_slice(&block);
                    }
                    break;
                }
                Err(err) => return Err(err),
            }
            if let Some(end) = find_terminator(&block) {
                data.extend_from_slice(&block[..end]);
                break;
            }
            data.extend_from_slice(&block);
            offset += self.block_size;
        }
        let (text, _, _) = self.encoding.decode(&data);
        Ok(MemoEntry::Text(text.trim_end_matches('\0').to_string()))
    }

    fn read_length_prefixed(&mut self, index: u64) -> Result<MemoEntry> {
        let offset = index * self.block_size;
        let mut tag = [0u8; 8];
        self.source.read_at(offset, &mut tag)?;
        let kind = BigEndian::read_u32(&tag[0..4]);
        let length = BigEndian::read_u32(&tag[4..8]) as usize;
        let mut data = vec![0u8; length];
        self.source.read_at(offset + 8, &mut data)?;
        match kind {
            1 => {
                let (text, _, _) = self.encoding.decode(&data);
                Ok(MemoEntry::Text(text.trim_end_matches(['\0', '\u{1a}']).to_string()))
            }
            _ => Ok(MemoEntry::Binary(data)),
        }
    }
}

fn find_terminator(block: &[u8]) -> Option<usize> {
    block
        .windows(2)
        .position(|pair| pair[0] == LEGACY_TERMINATOR && pair[1] == LEGACY_TERMINATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::UTF_8;

    fn legacy_memo_bytes(text: &str) -> Vec<u8> {
        let mut header = vec![0u8; 512];
        let mut file = header.clone();
        file.append(&mut header);
        let mut record = text.as_bytes().to_vec();
        record.push(LEGACY_TERMINATOR);
        record.push(LEGACY_TERMINATOR);
        record.resize(512, 0);
        file.extend_from_slice(&record);
        file
    }

    #[test]
    fn reads_legacy_memo_block() {
        let bytes = legacy_memo_bytes("hello memo");
        let source = ByteSource::from_bytes(bytes);
        let mut memo = MemoFile::from_source(source, MemoDialect::LegacyFixedBlock, UTF_8).unwrap();
        let entry = memo.read(1).unwrap();
        assert_eq!(MemoEntry::Text("hello memo".to_string()), entry);
    }

    #[test]
    fn reads_length_prefixed_text_memo() {
        let mut file = vec![0u8; 512];
        BigEndian::write_u16(&mut file[6..8], 64);
        file.resize(576, 0);
        BigEndian::write_u32(&mut file[512..516], 1);
        BigEndian::write_u32(&mut file[516..520], 5);
        file[520..525].copy_from_slice(b"hello");

        let source = ByteSource::from_bytes(file);
        let mut memo = MemoFile::from_source(source, MemoDialect::LengthPrefixed, UTF_8).unwrap();
        let entry = memo.read(1).unwrap();
        assert_eq!(MemoEntry::Text("hello".to_string()), entry);
    }

    #[test]
    fn reads_length_prefixed_binary_memo() {
        let mut file = vec![0u8; 512];
        BigEndian::write_u16(&mut file[6..8], 64);
        file.resize(576, 0);
        BigEndian::write_u32(&mut file[512..516], 0);
        BigEndian::write_u32(&mut file[516..520], 3);
        file[520..523].copy_from_slice(&[1, 2, 3]);

        let source = ByteSource::from_bytes(file);
        let mut memo = MemoFile::from_source(source, MemoDialect::LengthPrefixed, UTF_8).unwrap();
        let entry = memo.read(1).unwrap();
        assert_eq!(MemoEntry::Binary(vec![1, 2, 3]), entry);
    }
}
