//! The table reader façade: opens a `.dbf` file (and its memo side-car,
//! if any), then yields records either as a forward stream or as a fully
//! materialized in-memory table.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use encoding_rs::Encoding;

use crate::cancel::CancellationToken;
use crate::codepage;
use crate::dbf::field::parse_fields;
use crate::dbf::header::{FileHeader, Variant};
use crate::dbf::memo::{MemoDialect, MemoFile};
use crate::dbf::record::Record;
use crate::dbf::value::Value;
use crate::dbf::FieldDescriptor;
use crate::options::ParserOptions;
use crate::source::ByteSource;
use crate::{Error, Result};

/// Which half of the reader's state machine it's currently in.
///
/// A fresh [`Reader`] starts `Streaming`; [`Reader::load`] moves it to
/// `Loaded`, and [`Reader::unload`] moves it back. There is no separate
/// `New`/`Closed` representation: "not yet opened" is handled by
/// [`Reader::open`] failing outright, and "closed" is simply dropping the
/// `Reader` value, which Rust's ownership already guarantees can't be
/// read from again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Streaming,
    Loaded,
}

/// Aggregate counts over a table, used by [`Reader::statistics`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Statistics {
    /// Total records, including deleted ones.
    pub record_count: u64,
    /// Records carrying the deletion marker.
    pub deleted_count: u64,
    /// The number of fields per record.
    pub field_count: usize,
}

/// An open DBF table.
pub struct Reader {
    source: ByteSource,
    header: FileHeader,
    fields: Rc<Vec<FieldDescriptor>>,
    encoding: &'static Encoding,
    memo: Option<MemoFile>,
    options: ParserOptions,
    records_start: u64,
    record_width: u64,
    total_records: u64,
    cursor: u64,
    yielded: u64,
    mode: Mode,
    loaded: Vec<Record>,
    cancellation: CancellationToken,
}

impl Reader {
    /// Opens a table at `path` with default [`ParserOptions`], attaching
    /// its memo file by the usual sibling-file naming convention if the
    /// table declares any memo-bearing fields.
    pub fn open(path: impl AsRef<Path>) -> Result<Reader> {
        Reader::open_with_options(path, ParserOptions::default())
    }

    /// Like [`Reader::open`], with explicit [`ParserOptions`].
    pub fn open_with_options(path: impl AsRef<Path>, options: ParserOptions) -> Result<Reader> {
        let path = path.as_ref();
        let source = ByteSource::open(path)?;
        let mut reader = Reader::from_source(source, options.clone())?;

        if reader.fields.iter().any(|field| field.field_type.is_memo_index()) {
            if let Some((memo_path, dialect)) = memo_path_and_dialect(path, reader.header.variant) {
                if memo_path.exists() {
                    let memo = MemoFile::open(&memo_path, dialect, reader.encoding)?;
                    reader.memo = Some(memo);
                } else if !options.ignore_missing_memo {
                    return Err(Error::MissingMemoFile {
                        dbf_path: path.to_path_buf(),
                        memo_path,
                    });
                } else {
                    log::warn!("memo file {} not found; memo fields will read as None", memo_path.display());
                }
            }
        }
        Ok(reader)
    }

    /// Opens a table from an already-constructed byte source, e.g. an
    /// in-memory buffer or a non-seekable stream. No memo file is
    /// attached automatically; use [`Reader::attach_memo`] if the table
    /// needs one.
    pub fn from_source(mut source: ByteSource, options: ParserOptions) -> Result<Reader> {
        let mut header_bytes = [0u8; 32];
        source.read_exact(&mut header_bytes)?;
        let header = FileHeader::parse(&header_bytes)?;
        if options.validate_fields {
            header.validate()?;
        }

        let descriptor_region_len = (header.header_length as usize).saturating_sub(32);
        let mut descriptor_region = vec![0u8; descriptor_region_len];
        source.read_exact(&mut descriptor_region)?;
        let (fields, _) = parse_fields(&descriptor_region, 0, header.variant)?;
        if options.validate_fields {
            for field in &fields {
                field.validate(header.variant)?;
            }
        }

        let encoding = options
            .encoding_override
            .unwrap_or_else(|| codepage::encoding_for_driver_byte(header.language_driver));

        let record_width = header.record_length.max(1) as u64;
        let records_start = header.header_length as u64;
        let total_records = match source.len() {
            Some(len) if len > records_start => (len - records_start) / record_width,
            Some(_) => 0,
            None => header.record_count as u64,
        };

        Ok(Reader {
            source,
            header,
            fields: Rc::new(fields),
            encoding,
            memo: None,
            options,
            records_start,
            record_width,
            total_records,
            cursor: 0,
            yielded: 0,
            mode: Mode::Streaming,
            loaded: Vec::new(),
            cancellation: CancellationToken::new(),
        })
    }

    /// Attaches a memo file explicitly, for sources that weren't opened
    /// by path.
    pub fn attach_memo(&mut self, source: ByteSource, dialect: MemoDialect) -> Result<()> {
        self.memo = Some(MemoFile::from_source(source, dialect, self.encoding)?);
        Ok(())
    }

    /// The decoded file header.
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// The table's field descriptors, in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Looks up a field descriptor by name, honoring
    /// [`ParserOptions::ignore_case`].
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| {
            if self.options.ignore_case {
                field.name.eq_ignore_ascii_case(name)
            } else {
                field.name == name
            }
        })
    }

    /// The field names in declaration order, lowercased if
    /// [`ParserOptions::lowercase_field_names`] is set.
    pub fn field_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|field| {
                if self.options.lowercase_field_names {
                    field.name.to_lowercase()
                } else {
                    field.name.clone()
                }
            })
            .collect()
    }

    /// A token that, once cancelled, stops any in-progress or future
    /// [`Reader::records`] iteration at the next record boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Supplies an externally-held cancellation token, replacing the
    /// reader's own.
    pub fn set_cancellation_token(&mut self, token: CancellationToken) {
        self.cancellation = token;
    }

    /// Counts total and deleted records without materializing field
    /// values.
    ///
    /// Requires a seekable source.
    pub fn statistics(&mut self) -> Result<Statistics> {
        if self.mode == Mode::Loaded {
            let deleted_count = self.loaded.iter().filter(|record| record.is_deleted()).count() as u64;
            return Ok(Statistics {
                record_count: self.loaded.len() as u64,
                deleted_count,
                field_count: self.fields.len(),
            });
        }
        if !self.source.is_seekable() {
            return Err(Error::RequiresSeek);
        }
        let mut deleted_count = 0;
        let mut marker = [0u8; 1];
        for index in 0..self.total_records {
            self.source.read_at(self.records_start + index * self.record_width, &mut marker)?;
            if marker[0] == 0x2a {
                deleted_count += 1;
            }
        }
        Ok(Statistics {
            record_count: self.total_records,
            deleted_count,
            field_count: self.fields.len(),
        })
    }

    /// Random-access read of one record by its zero-based position.
    ///
    /// Returns `Ok(None)` past the end of the table. Requires a seekable
    /// source while [`Reader`] is in streaming mode; once [`Reader::load`]
    /// has been called, this indexes the in-memory table instead.
    pub fn record_at(&mut self, index: u64) -> Result<Option<Record>> {
        if self.mode == Mode::Loaded {
            return Ok(self.loaded.get(index as usize).cloned());
        }
        if index >= self.total_records {
            return Ok(None);
        }
        if !self.source.is_seekable() {
            return Err(Error::RequiresSeek);
        }
        let mut raw = vec![0u8; self.record_width as usize];
        self.source
            .read_at(self.records_start + index * self.record_width, &mut raw)?;
        self.decode_record(&raw).map(Some)
    }

    /// Streams records from the beginning of the table.
    ///
    /// Calling this again after partially consuming a previous iterator
    /// restarts from the first record on a seekable source; on a
    /// non-seekable stream it fails once the cursor has moved past the
    /// start, since there is no way to rewind.
    pub fn records(&mut self) -> Result<RecordIter<'_>> {
        match self.mode {
            Mode::Loaded => Ok(RecordIter {
                reader: None,
                loaded: Some(&self.loaded),
                loaded_pos: 0,
            }),
            Mode::Streaming => {
                if self.cursor != 0 {
                    self.source.seek_to(self.records_start)?;
                }
                self.cursor = 0;
                self.yielded = 0;
                Ok(RecordIter {
                    reader: Some(self),
                    loaded: None,
                    loaded_pos: 0,
                })
            }
        }
    }

    /// Reads every remaining record into memory and switches to
    /// [`Mode::Loaded`]. After this call, [`Reader::records`] and
    /// [`Reader::record_at`] serve from the in-memory copy rather than
    /// re-reading the source.
    pub fn load(&mut self) -> Result<()> {
        self.source.seek_to(self.records_start)?;
        self.cursor = 0;
        self.yielded = 0;
        let mut records = Vec::new();
        while let Some(record) = self.next_streaming_record()? {
            records.push(record);
        }
        self.loaded = records;
        self.mode = Mode::Loaded;
        Ok(())
    }

    /// Drops the in-memory table and returns to streaming mode.
    pub fn unload(&mut self) {
        self.loaded = Vec::new();
        self.mode = Mode::Streaming;
        self.cursor = 0;
        self.yielded = 0;
    }

    /// Resolves a memo-bearing value's content through the attached memo
    /// file. Returns `Ok(None)` for a null memo reference or when no memo
    /// file is attached.
    pub fn resolve_memo(&mut self, value: &Value) -> Result<Option<crate::dbf::memo::MemoEntry>> {
        let Some(index) = value.memo_index() else {
            return Ok(None);
        };
        match &mut self.memo {
            Some(memo) => memo.read(index).map(Some),
            None => Ok(None),
        }
    }

    fn next_streaming_record(&mut self) -> Result<Option<Record>> {
        loop {
            if self.cancellation.is_cancelled() {
                return Ok(None);
            }
            if let Some(max) = self.options.max_records {
                if self.yielded >= max {
                    return Ok(None);
                }
            }
            if self.cursor >= self.total_records {
                return Ok(None);
            }
            let mut raw = vec![0u8; self.record_width as usize];
            if !self.source.read_record_or_eof(&mut raw)? {
                return Ok(None);
            }
            self.cursor += 1;
            if self.cursor <= self.options.skip {
                continue;
            }
            let record = self.decode_record(&raw)?;
            if record.is_deleted() && !self.options.include_deleted {
                continue;
            }
            self.yielded += 1;
            return Ok(Some(record));
        }
    }

    fn decode_record(&self, raw: &[u8]) -> Result<Record> {
        let deleted = match raw[0] {
            0x20 => false,
            0x2a => true,
            other => {
                return Err(Error::InvalidShape(format!(
                    "unexpected deletion marker byte {other:#04x}"
                )))
            }
        };
        let mut values = Vec::with_capacity(self.fields.len());
        for field in self.fields.iter() {
            let end = field.offset + field.length;
            if end > raw.len() {
                return Err(Error::truncated(field.offset as u64, field.length, raw.len() - field.offset));
            }
            let field_bytes = &raw[field.offset..end];
            let value = match Value::decode(field, field_bytes, self.encoding, &self.options) {
                Ok(value) => value,
                Err(err) if self.options.validate_fields => return Err(err),
                Err(err) => Value::InvalidValue {
                    raw: field_bytes.to_vec(),
                    reason: err.to_string(),
                },
            };
            values.push(value);
        }
        Ok(Record {
            fields: Rc::clone(&self.fields),
            values,
            deleted,
            ignore_case: self.options.ignore_case,
        })
    }
}

/// An iterator over a table's records, produced by [`Reader::records`].
pub struct RecordIter<'a> {
    reader: Option<&'a mut Reader>,
    loaded: Option<&'a [Record]>,
    loaded_pos: usize,
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Result<Record>> {
        if let Some(records) = self.loaded {
            let record = records.get(self.loaded_pos)?;
            self.loaded_pos += 1;
            return Some(Ok(record.clone()));
        }
        let reader = self.reader.as_mut()?;
        reader.next_streaming_record().transpose()
    }
}

fn memo_path_and_dialect(path: &Path, variant: Variant) -> Option<(PathBuf, MemoDialect)> {
    match variant {
        Variant::DBaseIIIPlusMemo => Some((swap_extension(path, "dbt"), MemoDialect::LegacyFixedBlock)),
        Variant::DBaseIVMemo => Some((swap_extension(path, "dbt"), MemoDialect::LengthPrefixed)),
        Variant::FoxPro2Memo => Some((swap_extension(path, "fpt"), MemoDialect::LengthPrefixed)),
        Variant::VisualFoxPro | Variant::VisualFoxProAutoIncrement | Variant::VisualFoxProVarchar => {
            Some((swap_extension(path, "fpt"), MemoDialect::LengthPrefixed))
        }
        Variant::FoxBaseLegacyII | Variant::DBaseIII => None,
    }
}

fn swap_extension(path: &Path, new_ext: &str) -> PathBuf {
    let upper = path
        .extension()
        .map(|ext| ext.to_string_lossy().chars().all(|c| c.is_uppercase()))
        .unwrap_or(false);
    let ext = if upper { new_ext.to_uppercase() } else { new_ext.to_string() };
    path.with_extension(ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbf::FieldType;

    fn minimal_table_bytes() -> Vec<u8> {
        let mut bytes = vec![0u8; 32];
        bytes[0] = 0x03;
        let header_length = 32 + 32 + 1u16;
        bytes[8..10].copy_from_slice(&header_length.to_le_bytes());
        let record_length = 1 + 5u16; // marker + 5-byte char field
        bytes[10..12].copy_from_slice(&record_length.to_le_bytes());

        let mut descriptor = [0u8; 32];
        descriptor[0..4].copy_from_slice(b"NAME");
        descriptor[11] = b'C';
        descriptor[16] = 5;
        bytes.extend_from_slice(&descriptor);
        bytes.push(0x0d);

        bytes.push(0x20);
        bytes.extend_from_slice(b"Alice");
        bytes.push(0x2a);
        bytes.extend_from_slice(b"Bob  ");
        bytes
    }

    #[test]
    fn opens_and_streams_live_records_by_default() {
        let source = ByteSource::from_bytes(minimal_table_bytes());
        let mut reader = Reader::from_source(source, ParserOptions::default()).unwrap();
        assert_eq!(1, reader.fields().len());
        assert_eq!(FieldType::Character, reader.fields()[0].field_type);

        let records: Vec<_> = reader.records().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(1, records.len());
        assert_eq!(
            Some(&Value::Character("Alice".to_string())),
            records[0].value_by_name("name")
        );
    }

    #[test]
    fn include_deleted_surfaces_both_records() {
        let source = ByteSource::from_bytes(minimal_table_bytes());
        let options = ParserOptions::new().with_include_deleted(true);
        let mut reader = Reader::from_source(source, options).unwrap();
        let records: Vec<_> = reader.records().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(2, records.len());
        assert!(records[1].is_deleted());
    }

    #[test]
    fn record_at_supports_random_access() {
        let source = ByteSource::from_bytes(minimal_table_bytes());
        let options = ParserOptions::new().with_include_deleted(true);
        let mut reader = Reader::from_source(source, options).unwrap();
        let record = reader.record_at(1).unwrap().unwrap();
        assert_eq!(Some(&Value::Character("Bob".to_string())), record.value(0));
        assert_eq!(None, reader.record_at(5).unwrap().map(|_| ()));
    }

    #[test]
    fn load_then_records_serves_from_memory() {
        let source = ByteSource::from_bytes(minimal_table_bytes());
        let mut reader = Reader::from_source(source, ParserOptions::default()).unwrap();
        reader.load().unwrap();
        let stats = reader.statistics().unwrap();
        assert_eq!(2, stats.record_count);
        assert_eq!(1, stats.deleted_count);
        let records: Vec<_> = reader.records().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(1, records.len());
    }

    #[test]
    fn cancellation_stops_streaming_early() {
        let source = ByteSource::from_bytes(minimal_table_bytes());
        let options = ParserOptions::new().with_include_deleted(true);
        let mut reader = Reader::from_source(source, options).unwrap();
        let token = reader.cancellation_token();
        token.cancel();
        let records: Vec<_> = reader.records().unwrap().collect::<Result<_>>().unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn memo_extension_follows_variant_dialect() {
        let path = Path::new("/data/parcels.dbf");
        let (memo_path, dialect) = memo_path_and_dialect(path, Variant::DBaseIIIPlusMemo).unwrap();
        assert_eq!(Path::new("/data/parcels.dbt"), memo_path);
        assert_eq!(MemoDialect::LegacyFixedBlock, dialect);

        let (memo_path, dialect) = memo_path_and_dialect(path, Variant::VisualFoxPro).unwrap();
        assert_eq!(Path::new("/data/parcels.fpt"), memo_path);
        assert_eq!(MemoDialect::LengthPrefixed, dialect);

        assert_eq!(None, memo_path_and_dialect(path, Variant::DBaseIII));
    }
}
