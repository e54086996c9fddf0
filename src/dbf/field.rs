//! Field descriptors: the 32-byte (or 16-byte, for legacy-II tables)
//! records that follow the file header and describe each column.

use byteorder::{ByteOrder, LittleEndian};

use crate::dbf::Variant;
use crate::{Error, Result};

/// The decoded type of a field, independent of its variant-specific type
/// code byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Fixed-width text (`C`).
    Character,
    /// Visual FoxPro variable-length text (`V`).
    Varchar,
    /// ASCII decimal digits with an optional decimal point (`N`).
    Numeric,
    /// ASCII decimal digits, stored like `Numeric` but always read back as
    /// `f64` (`F`).
    Float,
    /// One of `T`/`F`/`Y`/`N`/`?` (`L`).
    Logical,
    /// `CCYYMMDD` ASCII text (`D`).
    Date,
    /// Julian day number plus milliseconds-since-midnight, 8 bytes (`T`).
    Timestamp,
    /// Little-endian `i32` (`I`, and VFP `+`).
    Integer,
    /// Little-endian `f64` (`B` under Visual FoxPro, `O` elsewhere).
    Double,
    /// Little-endian `i64` scaled by 10,000 (`Y`).
    Currency,
    /// An index into a `.dbt`/`.fpt` memo file (`M`).
    Memo,
    /// An OLE object index into a memo file (`G`).
    General,
    /// A picture/BLOB index into a memo file (`P`).
    Picture,
    /// A raw memo index under dialects that don't distinguish memo kinds
    /// (`B` outside Visual FoxPro).
    Binary,
    /// Visual FoxPro auto-increment column (`+`).
    Autoincrement,
    /// Visual FoxPro null-flag bitmap column (`0`).
    Flags,
}

impl FieldType {
    /// Resolves a field's type code byte to a [`FieldType`].
    ///
    /// `variant` disambiguates the `B` type code, which means an inline
    /// double under Visual FoxPro and a memo index under every earlier
    /// dialect.
    pub fn from_code(code: u8, variant: Variant) -> Result<FieldType> {
        match code {
            b'C' => Ok(FieldType::Character),
            b'V' => Ok(FieldType::Varchar),
            b'N' => Ok(FieldType::Numeric),
            b'F' => Ok(FieldType::Float),
            b'L' => Ok(FieldType::Logical),
            b'D' => Ok(FieldType::Date),
            b'T' => Ok(FieldType::Timestamp),
            b'I' => Ok(FieldType::Integer),
            b'O' => Ok(FieldType::Double),
            b'B' if variant.is_visual_foxpro() => Ok(FieldType::Double),
            b'B' => Ok(FieldType::Binary),
            b'Y' => Ok(FieldType::Currency),
            b'M' => Ok(FieldType::Memo),
            b'G' => Ok(FieldType::General),
            b'P' => Ok(FieldType::Picture),
            b'+' => Ok(FieldType::Autoincrement),
            b'0' => Ok(FieldType::Flags),
            other => Err(Error::malformed_field(
                "<unknown>",
                format!("unrecognized field type code {:?}", other as char),
            )),
        }
    }

    /// Whether values of this type are stored as an index into a memo
    /// file rather than inline in the record.
    pub fn is_memo_index(&self) -> bool {
        matches!(
            self,
            FieldType::Memo | FieldType::General | FieldType::Picture | FieldType::Binary
        )
    }
}

/// One column's name, type, and on-disk layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// The column name, trimmed of trailing NUL padding.
    pub name: String,
    /// The decoded field type.
    pub field_type: FieldType,
    /// The field's width in bytes within a record.
    ///
    /// For `Character`/`Varchar` fields whose declared width exceeds 255,
    /// this already folds in the high byte that some writers overload
    /// into the decimal-count slot (see [`FieldDescriptor::decimal_count`]).
    pub length: usize,
    /// The number of digits after the decimal point, for `Numeric`/
    /// `Float` fields. Zero for every other type.
    pub decimal_count: u8,
    /// The field's byte offset within a record, including the leading
    /// deletion-marker byte.
    pub offset: usize,
}

impl FieldDescriptor {
    /// Parses one field descriptor from its raw bytes.
    ///
    /// `offset` is the field's position within the record (assigned by
    /// [`parse_fields`], since the on-disk "field address" byte is a
    /// leftover from dBASE's in-memory representation and is not reliable
    /// on disk).
    fn from_bytes(data: &[u8], variant: Variant, offset: usize) -> Result<FieldDescriptor> {
        let name_bytes = &data[0..11];
        let name_end = name_bytes.iter().position(|&b| b == 0).unwrap_or(11);
        let name = String::from_utf8_lossy(&name_bytes[..name_end]).into_owned();

        let type_code = data[11];
        let field_type = FieldType::from_code(type_code, variant)
            .map_err(|_| Error::malformed_field(name.clone(), format!("unrecognized type code {:?}", type_code as char)))?;

        let length_byte = data[16];
        let decimal_count = data[17];
        let length = match field_type {
            FieldType::Character | FieldType::Varchar => {
                length_byte as usize | ((decimal_count as usize) << 8)
            }
            _ => length_byte as usize,
        };
        let decimal_count = match field_type {
            FieldType::Numeric | FieldType::Float => decimal_count,
            _ => 0,
        };

        Ok(FieldDescriptor {
            name,
            field_type,
            length,
            decimal_count,
            offset,
        })
    }

    /// Checks this descriptor's length and decimal-count invariants for
    /// its declared type, plus the legality of memo-bearing types under
    /// `variant`.
    pub fn validate(&self, variant: Variant) -> Result<()> {
        let fail = |reason: &str| Err(Error::malformed_field(self.name.clone(), reason.to_string()));
        match self.field_type {
            FieldType::Character | FieldType::Varchar => {
                if self.length == 0 {
                    return fail("character field must have a nonzero length");
                }
            }
            FieldType::Numeric | FieldType::Float => {
                if self.length == 0 {
                    return fail("numeric field must have a nonzero length");
                }
                if self.decimal_count as usize > self.length {
                    return fail("decimal count exceeds field length");
                }
            }
            FieldType::Logical => {
                if self.length != 1 {
                    return fail("logical field must be 1 byte wide");
                }
            }
            FieldType::Integer | FieldType::Autoincrement => {
                if self.length != 4 {
                    return fail("integer field must be 4 bytes wide");
                }
            }
            FieldType::Double | FieldType::Currency | FieldType::Timestamp => {
                if self.length != 8 {
                    return fail("double/currency/timestamp field must be 8 bytes wide");
                }
            }
            FieldType::Date => {
                if self.length != 8 {
                    return fail("date field must be 8 bytes wide");
                }
            }
            FieldType::Memo | FieldType::General | FieldType::Picture | FieldType::Binary => {
                if self.length != 4 && self.length != 10 {
                    return fail("memo index field must be 4 or 10 bytes wide");
                }
                if !variant.supports_memo() {
                    return fail("memo-bearing field is not legal under this dBase variant");
                }
            }
            FieldType::Flags => {}
        }
        Ok(())
    }
}

/// Reads field descriptors from `data` starting at `start`, stopping at
/// the `0x0D` header terminator, an early `0x1A` end-of-header marker, or
/// `variant.max_fields()`, whichever comes first.
///
/// Returns the descriptors and the offset of the byte immediately after
/// the terminator (i.e. the first record's start).
///
/// If a would-be descriptor turns out to have an empty name or an
/// unrecognized type code, parsing stops there rather than erroring: some
/// writers leave the header length field pointing past a short run of
/// padding, and the record area should still be reachable.
pub fn parse_fields(data: &[u8], start: usize, variant: Variant) -> Result<(Vec<FieldDescriptor>, usize)> {
    let descriptor_size = variant.descriptor_size();
    let mut fields = Vec::new();
    let mut cursor = start;
    let mut record_offset = 1; // byte 0 of every record is the deletion marker

    loop {
        if cursor >= data.len() {
            return Err(Error::truncated(cursor as u64, 1, 0));
        }
        match data[cursor] {
            0x0d => {
                cursor += 1;
                break;
            }
            0x1a => break,
            _ => {}
        }

        if cursor + descriptor_size > data.len() {
            return Err(Error::truncated(
                cursor as u64,
                descriptor_size,
                data.len() - cursor,
            ));
        }
        let raw = &data[cursor..cursor + descriptor_size];

        match FieldDescriptor::from_bytes(raw, variant, record_offset) {
            Ok(descriptor) if !descriptor.name.is_empty() => {
                record_offset += descriptor.length;
                cursor += descriptor_size;
                fields.push(descriptor);
                if fields.len() >= variant.max_fields() {
                    break;
                }
            }
            _ => break,
        }
    }

    Ok((fields, cursor))
}

/// Reads the 4-byte little-endian field address some writers store at
/// bytes 12-15 of a descriptor. Unused by [`parse_fields`] (see its doc
/// comment) but kept for callers inspecting raw descriptors.
pub fn raw_field_address(descriptor_bytes: &[u8]) -> u32 {
    LittleEndian::read_u32(&descriptor_bytes[12..16])
}
