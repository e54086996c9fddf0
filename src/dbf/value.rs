//! Typed field values and the byte-to-`Value` dispatch table.

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use encoding_rs::Encoding;

use crate::dbf::{FieldDescriptor, FieldType};
use crate::options::{CharacterDecodeFallback, ParserOptions};
use crate::{Error, Result};

/// The Julian day number of `0001-01-01` in the proleptic Gregorian
/// calendar. Subtracting it from a stored Julian day number yields the
/// number of days since that date, which `chrono` can turn into a date
/// directly.
const JULIAN_DAY_OFFSET: i64 = 1_721_425;

/// A fixed-point decimal, as stored in `Numeric` fields: an integer
/// mantissa and a count of digits that belong after the decimal point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decimal {
    mantissa: i64,
    exponent: u32,
}

impl Decimal {
    fn new(mantissa: i64, exponent: u32) -> Decimal {
        Decimal { mantissa, exponent }
    }

    /// The whole-number part, truncated toward zero.
    pub fn integral(&self) -> i64 {
        let scale = 10i64.pow(self.exponent);
        self.mantissa / scale
    }

    /// The fractional part, as an unsigned count of the trailing digits.
    pub fn fractional(&self) -> i64 {
        let scale = 10i64.pow(self.exponent);
        (self.mantissa % scale).abs()
    }

    /// The number of digits after the decimal point.
    pub fn scale(&self) -> u32 {
        self.exponent
    }

    /// Converts to `f64`. Lossy for mantissas beyond `f64`'s 53 bits of
    /// integer precision.
    pub fn to_f64_lossy(&self) -> f64 {
        self.mantissa as f64 / 10f64.powi(self.exponent as i32)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.exponent == 0 {
            write!(f, "{}", self.mantissa)
        } else {
            let sign = if self.mantissa < 0 { "-" } else { "" };
            write!(
                f,
                "{sign}{}.{:0width$}",
                self.integral().abs(),
                self.fractional(),
                width = self.exponent as usize
            )
        }
    }
}

/// A decoded field value. Variants mirror [`FieldType`] one-to-one.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Fixed-width text, right-padded with spaces on disk.
    Character(String),
    /// Visual FoxPro variable-length text.
    Varchar(String),
    /// Absent when the field held only spaces or asterisks (dBASE's
    /// convention for a blank numeric cell).
    Numeric(Option<Decimal>),
    /// Absent under the same blank-field convention as `Numeric`.
    Float(Option<f64>),
    /// Absent when the field held `?` (dBASE's "uninitialized logical").
    Logical(Option<bool>),
    /// Absent when the field held only spaces.
    Date(Option<NaiveDate>),
    /// Absent when both the Julian day and millisecond components are
    /// zero.
    Timestamp(Option<NaiveDateTime>),
    /// A little-endian 32-bit integer.
    Integer(i32),
    /// A little-endian 64-bit float.
    Double(f64),
    /// A little-endian 64-bit integer scaled by 10,000.
    Currency(f64),
    /// An index into the table's memo file, or `None` for an empty memo
    /// reference.
    Memo(Option<u64>),
    /// An OLE object index into the table's memo file.
    General(Option<u64>),
    /// A picture/BLOB index into the table's memo file.
    Picture(Option<u64>),
    /// A memo index under dialects that don't distinguish memo kinds.
    Binary(Option<u64>),
    /// A Visual FoxPro auto-increment counter value.
    Autoincrement(i32),
    /// A Visual FoxPro null-flag bitmap, kept as raw bytes.
    Flags(Vec<u8>),
    /// The field's untouched on-disk bytes, produced instead of a typed
    /// value when [`ParserOptions::raw_mode`] is set.
    Raw(Vec<u8>),
    /// A field whose bytes failed to decode under its declared type.
    /// Produced instead of a fatal error when
    /// [`ParserOptions::validate_fields`] is `false`.
    InvalidValue {
        /// The field's untouched on-disk bytes.
        raw: Vec<u8>,
        /// Why decoding failed.
        reason: String,
    },
}

impl Value {
    /// Decodes one field's raw record bytes according to its descriptor.
    pub fn decode(
        descriptor: &FieldDescriptor,
        raw: &[u8],
        encoding: &'static Encoding,
        options: &ParserOptions,
    ) -> Result<Value> {
        if options.raw_mode {
            return Ok(Value::Raw(raw.to_vec()));
        }

        match descriptor.field_type {
            FieldType::Character => Ok(Value::Character(decode_text(descriptor, raw, encoding, options)?)),
            FieldType::Varchar => Ok(Value::Varchar(decode_text(descriptor, raw, encoding, options)?)),
            FieldType::Numeric => Ok(Value::Numeric(decode_numeric(descriptor, raw)?)),
            FieldType::Float => Ok(Value::Float(decode_float(descriptor, raw)?)),
            FieldType::Logical => Ok(Value::Logical(decode_logical(raw[0]))),
            FieldType::Date => Ok(Value::Date(decode_date(descriptor, raw)?)),
            FieldType::Timestamp => Ok(Value::Timestamp(decode_timestamp(raw))),
            FieldType::Integer => Ok(Value::Integer(LittleEndian::read_i32(raw))),
            FieldType::Double => Ok(Value::Double(LittleEndian::read_f64(raw))),
            FieldType::Currency => Ok(Value::Currency(LittleEndian::read_i64(raw) as f64 / 10_000.0)),
            FieldType::Memo => Ok(Value::Memo(decode_memo_index(raw))),
            FieldType::General => Ok(Value::General(decode_memo_index(raw))),
            FieldType::Picture => Ok(Value::Picture(decode_memo_index(raw))),
            FieldType::Binary => Ok(Value::Binary(decode_memo_index(raw))),
            FieldType::Autoincrement => Ok(Value::Autoincrement(LittleEndian::read_i32(raw))),
            FieldType::Flags => Ok(Value::Flags(raw.to_vec())),
        }
    }

    /// The memo-file index this value carries, if it's one of the
    /// memo-bearing variants.
    pub fn memo_index(&self) -> Option<u64> {
        match self {
            Value::Memo(index) | Value::General(index) | Value::Picture(index) | Value::Binary(index) => *index,
            _ => None,
        }
    }
}

fn decode_text(
    descriptor: &FieldDescriptor,
    raw: &[u8],
    encoding: &'static Encoding,
    options: &ParserOptions,
) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(raw);
    let text = if had_errors {
        match options.character_decode_fallback {
            CharacterDecodeFallback::Replace => text.into_owned(),
            CharacterDecodeFallback::Skip => text.chars().filter(|&c| c != '\u{fffd}').collect(),
            CharacterDecodeFallback::Fail => {
                return Err(Error::field_parse(
                    descriptor.name.clone(),
                    raw,
                    "invalid byte sequence for the configured encoding",
                ))
            }
        }
    } else {
        text.into_owned()
    };
    if options.trim_strings {
        Ok(text.trim_end_matches([' ', '\0']).to_string())
    } else {
        Ok(text)
    }
}

fn ascii_digits_trimmed(raw: &[u8]) -> Option<&[u8]> {
    let trimmed = trim_ascii(raw);
    if trimmed.is_empty() || trimmed.iter().all(|&b| b == b'*') {
        None
    } else {
        Some(trimmed)
    }
}

fn trim_ascii(raw: &[u8]) -> &[u8] {
    let start = raw.iter().position(|&b| b != b' ').unwrap_or(raw.len());
    let end = raw.iter().rposition(|&b| b != b' ').map(|i| i + 1).unwrap_or(start);
    &raw[start..end]
}

fn decode_numeric(descriptor: &FieldDescriptor, raw: &[u8]) -> Result<Option<Decimal>> {
    let Some(digits) = ascii_digits_trimmed(raw) else {
        return Ok(None);
    };
    let text = std::str::from_utf8(digits)
        .map_err(|_| Error::field_parse(descriptor.name.clone(), raw, "numeric field is not valid ASCII"))?;
    let (sign, text) = match text.strip_prefix('-') {
        Some(rest) => (-1i64, rest),
        None => (1i64, text.strip_prefix('+').unwrap_or(text)),
    };
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, f),
        None => (text, ""),
    };
    let mut digits_only = String::with_capacity(int_part.len() + frac_part.len());
    digits_only.push_str(int_part);
    digits_only.push_str(frac_part);
    if digits_only.is_empty() {
        digits_only.push('0');
    }
    let mantissa: i64 = digits_only
        .parse()
        .map_err(|_| Error::field_parse(descriptor.name.clone(), raw, "non-digit characters in numeric field"))?;
    Ok(Some(Decimal::new(sign * mantissa, frac_part.len() as u32)))
}

fn decode_float(descriptor: &FieldDescriptor, raw: &[u8]) -> Result<Option<f64>> {
    let Some(digits) = ascii_digits_trimmed(raw) else {
        return Ok(None);
    };
    let text = std::str::from_utf8(digits)
        .map_err(|_| Error::field_parse(descriptor.name.clone(), raw, "float field is not valid ASCII"))?;
    text.parse()
        .map(Some)
        .map_err(|_| Error::field_parse(descriptor.name.clone(), raw, "malformed float literal"))
}

fn decode_logical(byte: u8) -> Option<bool> {
    match byte {
        b'T' | b't' | b'Y' | b'y' => Some(true),
        b'F' | b'f' | b'N' | b'n' => Some(false),
        _ => None,
    }
}

fn decode_date(descriptor: &FieldDescriptor, raw: &[u8]) -> Result<Option<NaiveDate>> {
    let Some(digits) = ascii_digits_trimmed(raw) else {
        return Ok(None);
    };
    if digits.len() != 8 {
        return Err(Error::field_parse(
            descriptor.name.clone(),
            raw,
            "date field did not contain 8 digits",
        ));
    }
    let text = std::str::from_utf8(digits).unwrap();
    let year: i32 = text[0..4]
        .parse()
        .map_err(|_| Error::field_parse(descriptor.name.clone(), raw, "malformed year in date field"))?;
    let month: u32 = text[4..6]
        .parse()
        .map_err(|_| Error::field_parse(descriptor.name.clone(), raw, "malformed month in date field"))?;
    let day: u32 = text[6..8]
        .parse()
        .map_err(|_| Error::field_parse(descriptor.name.clone(), raw, "malformed day in date field"))?;
    NaiveDate::from_ymd_opt(year, month, day)
        .map(Some)
        .ok_or_else(|| Error::field_parse(descriptor.name.clone(), raw, "date is not a valid calendar date"))
}

fn decode_timestamp(raw: &[u8]) -> Option<NaiveDateTime> {
    let julian_day = LittleEndian::read_i32(&raw[0..4]);
    let millis = LittleEndian::read_i32(&raw[4..8]);
    if julian_day == 0 && millis == 0 {
        return None;
    }
    let date = NaiveDate::from_num_days_from_ce_opt(julian_day as i64 as i32 - JULIAN_DAY_OFFSET as i32)?;
    let time = NaiveTime::from_hms_opt(0, 0, 0)? + Duration::milliseconds(millis as i64);
    Some(NaiveDateTime::new(date, time))
}

fn decode_memo_index(raw: &[u8]) -> Option<u64> {
    match raw.len() {
        10 => {
            let digits = ascii_digits_trimmed(raw)?;
            std::str::from_utf8(digits).ok()?.parse().ok()
        }
        _ => {
            let index = LittleEndian::read_u32(raw);
            if index == 0 {
                None
            } else {
                Some(index as u64)
            }
        }
    }
}
