//! Sequential and indexed readers over `.shp` geometry files and their
//! `.shx` index, `.prj` projection, and `.cpg` encoding sidecars.

use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use encoding_rs::Encoding;

use crate::codepage;
use crate::shp::geometry::{parse_shape, Geometry};
use crate::shp::header::ShapefileHeader;
use crate::source::ByteSource;
use crate::{Error, Result};

const SHX_HEADER_LEN: u64 = 100;
const SHX_ENTRY_LEN: u64 = 8;

/// One `.shx` index entry: a record's offset and content length, both in
/// 16-bit words from the start of the `.shp` file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShxEntry {
    pub offset_words: u32,
    pub content_length_words: u32,
}

impl ShxEntry {
    /// The record's byte offset within the `.shp` file.
    pub fn offset_bytes(&self) -> u64 {
        self.offset_words as u64 * 2
    }

    /// The record's content length in bytes (excluding the 8-byte record
    /// header).
    pub fn content_length_bytes(&self) -> u64 {
        self.content_length_words as u64 * 2
    }
}

/// A reader over a `.shx` shape index, giving O(1) lookup of a record's
/// location in the paired `.shp` file.
pub struct ShxReader {
    source: ByteSource,
    entry_count: u64,
}

impl ShxReader {
    /// Opens a `.shx` file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<ShxReader> {
        let mut source = ByteSource::open(path)?;
        let mut header_bytes = [0u8; 100];
        source.read_at(0, &mut header_bytes)?;
        let header = ShapefileHeader::parse(&header_bytes)?;
        let entry_count = header.file_length_bytes.saturating_sub(SHX_HEADER_LEN) / SHX_ENTRY_LEN;
        Ok(ShxReader { source, entry_count })
    }

    /// The number of indexed records.
    pub fn len(&self) -> u64 {
        self.entry_count
    }

    /// Whether the index has no entries.
    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    /// Looks up the `index`-th (zero-based) record's location.
    pub fn entry(&mut self, index: u64) -> Result<Option<ShxEntry>> {
        if index >= self.entry_count {
            return Ok(None);
        }
        let mut buf = [0u8; 8];
        self.source.read_at(SHX_HEADER_LEN + index * SHX_ENTRY_LEN, &mut buf)?;
        Ok(Some(ShxEntry {
            offset_words: BigEndian::read_u32(&buf[0..4]),
            content_length_words: BigEndian::read_u32(&buf[4..8]),
        }))
    }
}

/// A reader over a `.shp` geometry file.
pub struct ShapeReader {
    source: ByteSource,
    header: ShapefileHeader,
    shx: Option<ShxReader>,
    position: u64,
    /// The EPSG code found in a sibling `.prj` file, if any. Per this
    /// crate's simplified projection model, only a bare numeric EPSG code
    /// is recognized; a full WKT definition is left as opaque text for
    /// the caller to parse with a dedicated CRS crate if needed.
    pub epsg: Option<u32>,
    /// The text encoding declared by a sibling `.cpg` file, if any.
    pub encoding: Option<&'static Encoding>,
}

impl ShapeReader {
    /// Wraps an already-open byte source as a shape reader, with no `.shx`,
    /// `.prj`, or `.cpg` sidecars attached. Use [`ShapeReader::open`]
    /// instead when reading from a path, to pick those up automatically.
    pub fn from_source(mut source: ByteSource) -> Result<ShapeReader> {
        let mut header_bytes = [0u8; 100];
        source.read_exact(&mut header_bytes)?;
        let header = ShapefileHeader::parse(&header_bytes)?;
        Ok(ShapeReader {
            source,
            header,
            shx: None,
            position: 100,
            epsg: None,
            encoding: None,
        })
    }

    /// Opens a `.shp` file at `path`, along with its `.shx`, `.prj`, and
    /// `.cpg` sidecars if present.
    pub fn open(path: impl AsRef<Path>) -> Result<ShapeReader> {
        let path = path.as_ref();
        let mut source = ByteSource::open(path)?;
        let mut header_bytes = [0u8; 100];
        source.read_exact(&mut header_bytes)?;
        let header = ShapefileHeader::parse(&header_bytes)?;

        let shx_path = path.with_extension(extension_like(path, "shx"));
        let shx = if shx_path.exists() {
            Some(ShxReader::open(&shx_path)?)
        } else {
            None
        };

        let prj_path = path.with_extension(extension_like(path, "prj"));
        let epsg = std::fs::read_to_string(&prj_path)
            .ok()
            .and_then(|text| text.trim().parse().ok());

        let cpg_path = path.with_extension(extension_like(path, "cpg"));
        let encoding = std::fs::read_to_string(&cpg_path)
            .ok()
            .and_then(|text| codepage::encoding_for_name(text.trim()));

        Ok(ShapeReader {
            source,
            header,
            shx,
            position: 100,
            epsg,
            encoding,
        })
    }

    /// The decoded file header.
    pub fn header(&self) -> &ShapefileHeader {
        &self.header
    }

    /// Whether an `.shx` sidecar was found, enabling
    /// [`ShapeReader::record_at`].
    pub fn has_index(&self) -> bool {
        self.shx.is_some()
    }

    /// Reads the next record in file order, returning its 1-based record
    /// number and decoded geometry.
    pub fn next_record(&mut self) -> Result<Option<(u32, Geometry)>> {
        if self.position >= self.header.file_length_bytes {
            return Ok(None);
        }
        let mut record_header = [0u8; 8];
        self.source.read_exact(&mut record_header)?;
        let record_number = BigEndian::read_i32(&record_header[0..4]) as u32;
        let content_length_bytes = BigEndian::read_i32(&record_header[4..8]) as u64 * 2;
        let mut content = vec![0u8; content_length_bytes as usize];
        self.source.read_exact(&mut content)?;
        self.position += 8 + content_length_bytes;
        let geometry = parse_shape(&content)?;
        Ok(Some((record_number, geometry)))
    }

    /// Iterates over every remaining record in file order.
    pub fn records(&mut self) -> ShapeRecordIter<'_> {
        ShapeRecordIter { reader: self }
    }

    /// Random-access read of the `index`-th (zero-based) record via the
    /// `.shx` index.
    ///
    /// Fails with [`Error::RequiresSeek`] if no `.shx` sidecar was found.
    pub fn record_at(&mut self, index: u64) -> Result<Option<(u32, Geometry)>> {
        let shx = self.shx.as_mut().ok_or(Error::RequiresSeek)?;
        let Some(entry) = shx.entry(index)? else {
            return Ok(None);
        };
        let mut record_header = [0u8; 8];
        self.source.read_at(entry.offset_bytes(), &mut record_header)?;
        let record_number = BigEndian::read_i32(&record_header[0..4]) as u32;
        let mut content = vec![0u8; entry.content_length_bytes() as usize];
        self.source.read_at(entry.offset_bytes() + 8, &mut content)?;
        let geometry = parse_shape(&content)?;
        Ok(Some((record_number, geometry)))
    }
}

/// An iterator over a [`ShapeReader`]'s remaining records.
pub struct ShapeRecordIter<'a> {
    reader: &'a mut ShapeReader,
}

impl<'a> Iterator for ShapeRecordIter<'a> {
    type Item = Result<(u32, Geometry)>;

    fn next(&mut self) -> Option<Result<(u32, Geometry)>> {
        self.reader.next_record().transpose()
    }
}

fn extension_like(path: &Path, lowercase: &str) -> String {
    let upper = path
        .extension()
        .map(|ext| ext.to_string_lossy().chars().all(|c| c.is_uppercase()))
        .unwrap_or(false);
    if upper {
        lowercase.to_uppercase()
    } else {
        lowercase.to_string()
    }
}
