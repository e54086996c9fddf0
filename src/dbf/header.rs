//! The 32-byte DBF file header and its format-variant byte.

use byteorder::{ByteOrder, LittleEndian};
use chrono::NaiveDate;

use crate::{Error, Result};

/// The fixed 32-byte header that opens every DBF table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileHeader {
    /// The dialect this table was written by, taken from the header's
    /// first byte.
    pub variant: Variant,
    /// The date the table was last updated, if the stored year, month, and
    /// day form a valid calendar date.
    pub last_update: Option<NaiveDate>,
    /// The number of records the header claims the table holds.
    ///
    /// This is advisory: [`crate::dbf::Reader`] trusts the actual file
    /// length (when known) over this count.
    pub record_count: u32,
    /// The byte offset at which the first record begins.
    pub header_length: u16,
    /// The byte width of every record, including the one-byte deletion
    /// marker.
    pub record_length: u16,
    /// The code page / language-driver byte, used to pick a text codec
    /// absent an explicit override or a `.cpg` sidecar.
    pub language_driver: u8,
    /// Set when the table has an associated `.mdx` production index.
    pub has_production_mdx: bool,
    /// Set when the table claims to be encrypted. The core does not
    /// decrypt data; this flag is surfaced for callers to act on.
    pub encrypted: bool,
}

/// The recognized DBF dialects, distinguished by the header's first byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Variant {
    /// FoxBase / dBASE II ("legacy-II"): 16-byte descriptors, no memo
    /// support, at most 128 fields.
    FoxBaseLegacyII,
    /// dBASE III (no memo).
    DBaseIII,
    /// dBASE III+ with an attached `.dbt` memo file.
    DBaseIIIPlusMemo,
    /// dBASE IV with an attached memo file.
    DBaseIVMemo,
    /// FoxPro 2.x with an attached memo file.
    FoxPro2Memo,
    /// Visual FoxPro (plain table).
    VisualFoxPro,
    /// Visual FoxPro with auto-increment field support.
    VisualFoxProAutoIncrement,
    /// Visual FoxPro with varchar/varbinary field support.
    VisualFoxProVarchar,
}

impl Variant {
    /// Maps a header's first byte to a known variant.
    ///
    /// # Examples
    ///
    /// ```
    /// use xbase_core::dbf::Variant;
    /// assert_eq!(Variant::DBaseIII, Variant::from_byte(0x03).unwrap());
    /// assert!(Variant::from_byte(0xff).is_err());
    /// ```
    pub fn from_byte(byte: u8) -> Result<Variant> {
        match byte {
            0x02 => Ok(Variant::FoxBaseLegacyII),
            0x03 => Ok(Variant::DBaseIII),
            0x83 => Ok(Variant::DBaseIIIPlusMemo),
            0x8b => Ok(Variant::DBaseIVMemo),
            0xf5 => Ok(Variant::FoxPro2Memo),
            0x30 => Ok(Variant::VisualFoxPro),
            0x31 => Ok(Variant::VisualFoxProAutoIncrement),
            0x32 => Ok(Variant::VisualFoxProVarchar),
            other => Err(Error::UnsupportedVersion(other)),
        }
    }

    /// Whether this variant is one of the Visual FoxPro dialects, which
    /// repurpose the `B` type code for an inline double rather than a
    /// memo index.
    pub fn is_visual_foxpro(&self) -> bool {
        matches!(
            self,
            Variant::VisualFoxPro | Variant::VisualFoxProAutoIncrement | Variant::VisualFoxProVarchar
        )
    }

    /// Whether tables of this variant may carry memo-bearing field types.
    pub fn supports_memo(&self) -> bool {
        !matches!(self, Variant::FoxBaseLegacyII | Variant::DBaseIII)
    }

    /// The byte width of one field descriptor for this variant.
    pub fn descriptor_size(&self) -> usize {
        if *self == Variant::FoxBaseLegacyII {
            16
        } else {
            32
        }
    }

    /// The maximum number of field descriptors this variant permits.
    pub fn max_fields(&self) -> usize {
        if *self == Variant::FoxBaseLegacyII {
            128
        } else {
            255
        }
    }
}

impl FileHeader {
    /// Decodes a [`FileHeader`] from the first 32 bytes of a DBF file.
    ///
    /// # Examples
    ///
    /// ```
    /// use xbase_core::dbf::{FileHeader, Variant};
    ///
    /// let mut bytes = [0u8; 32];
    /// bytes[0] = 0x03; // dBASE III
    /// bytes[1] = 124; // 2024
    /// bytes[2] = 1;
    /// bytes[3] = 15;
    /// bytes[4..8].copy_from_slice(&2u32.to_le_bytes());
    /// bytes[8..10].copy_from_slice(&65u16.to_le_bytes());
    /// bytes[10..12].copy_from_slice(&11u16.to_le_bytes());
    ///
    /// let header = FileHeader::parse(&bytes).unwrap();
    /// assert_eq!(Variant::DBaseIII, header.variant);
    /// assert_eq!(2, header.record_count);
    /// ```
    pub fn parse(bytes: &[u8; 32]) -> Result<FileHeader> {
        let variant = Variant::from_byte(bytes[0])?;
        let last_update =
            NaiveDate::from_ymd_opt(1900 + bytes[1] as i32, bytes[2] as u32, bytes[3] as u32);
        let record_count = LittleEndian::read_u32(&bytes[4..8]);
        let header_length = LittleEndian::read_u16(&bytes[8..10]);
        let record_length = LittleEndian::read_u16(&bytes[10..12]);
        let flags = bytes[14];
        let language_driver = bytes[29];

        Ok(FileHeader {
            variant,
            last_update,
            record_count,
            header_length,
            record_length,
            language_driver,
            has_production_mdx: flags & 0x01 != 0,
            encrypted: bytes[15] != 0,
        })
    }

    /// Checks the structural invariants described by the DBF format: the
    /// header must be large enough to hold at least the terminator byte,
    /// its length must land on a field-descriptor boundary, and the
    /// record length must be able to hold at least the deletion marker.
    ///
    /// # Examples
    ///
    /// ```
    /// use xbase_core::dbf::FileHeader;
    /// let mut bytes = [0u8; 32];
    /// bytes[0] = 0x03;
    /// bytes[8..10].copy_from_slice(&65u16.to_le_bytes());
    /// bytes[10..12].copy_from_slice(&11u16.to_le_bytes());
    /// FileHeader::parse(&bytes).unwrap().validate().unwrap();
    /// ```
    pub fn validate(&self) -> Result<()> {
        if self.header_length < 33 {
            return Err(Error::MalformedHeader(format!(
                "header length {} is smaller than the minimum of 33",
                self.header_length
            )));
        }
        if (self.header_length - 1) % 32 != 0 {
            return Err(Error::MalformedHeader(format!(
                "header length {} is not congruent to 1 modulo 32",
                self.header_length
            )));
        }
        if self.record_length < 1 {
            return Err(Error::MalformedHeader(
                "record length must be at least 1 byte (the deletion marker)".to_string(),
            ));
        }
        Ok(())
    }

    /// The number of field descriptor slots implied by `header_length`,
    /// assuming no Visual FoxPro backlink is present.
    pub fn implied_field_count(&self) -> usize {
        (self.header_length as usize).saturating_sub(33) / self.variant.descriptor_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header_bytes() -> [u8; 32] {
        let mut bytes = [0u8; 32];
        bytes[0] = 0x03;
        bytes[1] = 124;
        bytes[2] = 1;
        bytes[3] = 15;
        bytes[4..8].copy_from_slice(&2u32.to_le_bytes());
        bytes[8..10].copy_from_slice(&65u16.to_le_bytes());
        bytes[10..12].copy_from_slice(&11u16.to_le_bytes());
        bytes
    }

    #[test]
    fn parses_seed_scenario_1_header() {
        let header = FileHeader::parse(&sample_header_bytes()).unwrap();
        assert_eq!(Variant::DBaseIII, header.variant);
        assert_eq!(Some(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()), header.last_update);
        assert_eq!(2, header.record_count);
        assert_eq!(65, header.header_length);
        assert_eq!(11, header.record_length);
        header.validate().unwrap();
        assert_eq!(1, header.implied_field_count());
    }

    #[test]
    fn unknown_version_byte_fails() {
        let mut bytes = sample_header_bytes();
        bytes[0] = 0xff;
        assert!(matches!(
            FileHeader::parse(&bytes),
            Err(Error::UnsupportedVersion(0xff))
        ));
    }

    #[test]
    fn header_length_must_be_congruent_to_one_mod_32() {
        let mut bytes = sample_header_bytes();
        bytes[8..10].copy_from_slice(&64u16.to_le_bytes());
        let header = FileHeader::parse(&bytes).unwrap();
        assert!(header.validate().is_err());
    }

    #[test]
    fn zero_date_yields_no_last_update() {
        let mut bytes = sample_header_bytes();
        bytes[1] = 0;
        bytes[2] = 0;
        bytes[3] = 0;
        let header = FileHeader::parse(&bytes).unwrap();
        assert_eq!(None, header.last_update);
    }
}
