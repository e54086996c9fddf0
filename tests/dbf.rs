//! Integration tests exercising a full DBF table end to end: header,
//! field descriptors, typed values, deletion filtering, and an attached
//! memo file.

use encoding_rs::UTF_8;
use xbase_core::dbf::{MemoDialect, Reader, Value};
use xbase_core::options::ParserOptions;
use xbase_core::source::ByteSource;

fn character_field(name: &str, length: u8) -> [u8; 32] {
    let mut descriptor = [0u8; 32];
    descriptor[0..name.len()].copy_from_slice(name.as_bytes());
    descriptor[11] = b'C';
    descriptor[16] = length;
    descriptor
}

fn numeric_field(name: &str, length: u8, decimals: u8) -> [u8; 32] {
    let mut descriptor = [0u8; 32];
    descriptor[0..name.len()].copy_from_slice(name.as_bytes());
    descriptor[11] = b'N';
    descriptor[16] = length;
    descriptor[17] = decimals;
    descriptor
}

fn memo_field(name: &str) -> [u8; 32] {
    let mut descriptor = [0u8; 32];
    descriptor[0..name.len()].copy_from_slice(name.as_bytes());
    descriptor[11] = b'M';
    descriptor[16] = 10;
    descriptor
}

/// Builds a small dBASE III+ table: NAME (C10), SCORE (N6.2), NOTE (M),
/// with three records, the second marked deleted.
fn sample_table() -> Vec<u8> {
    let fields = [character_field("NAME", 10), numeric_field("SCORE", 6, 2), memo_field("NOTE")];
    let header_length = 32 + fields.len() as u16 * 32 + 1;
    let record_length = 1 + 10 + 6 + 10;

    let mut bytes = vec![0u8; 32];
    bytes[0] = 0x83; // dBASE III+ with memo
    bytes[4..8].copy_from_slice(&3u32.to_le_bytes());
    bytes[8..10].copy_from_slice(&header_length.to_le_bytes());
    bytes[10..12].copy_from_slice(&(record_length as u16).to_le_bytes());

    for field in &fields {
        bytes.extend_from_slice(field);
    }
    bytes.push(0x0d);

    // Record 1: live.
    bytes.push(0x20);
    bytes.extend_from_slice(b"Alice     ");
    bytes.extend_from_slice(b" 91.50");
    bytes.extend_from_slice(b"         1");

    // Record 2: deleted.
    bytes.push(0x2a);
    bytes.extend_from_slice(b"Bob       ");
    bytes.extend_from_slice(b" 42.00");
    bytes.extend_from_slice(b"          ");

    // Record 3: live, no memo.
    bytes.push(0x20);
    bytes.extend_from_slice(b"Carol     ");
    bytes.extend_from_slice(b"100.00");
    bytes.extend_from_slice(b"          ");

    bytes
}

fn legacy_memo_file(block1: &str) -> Vec<u8> {
    let mut file = vec![0u8; 512];
    let mut block = block1.as_bytes().to_vec();
    block.push(0x1a);
    block.push(0x1a);
    block.resize(512, 0);
    file.extend_from_slice(&block);
    file
}

#[test]
fn streams_only_live_records_by_default() {
    let source = ByteSource::from_bytes(sample_table());
    let mut reader = Reader::from_source(source, ParserOptions::default()).unwrap();

    let records: Vec<_> = reader.records().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(2, records.len());
    assert_eq!(Some(&Value::Character("Alice".to_string())), records[0].value_by_name("name"));
    assert_eq!(Some(&Value::Character("Carol".to_string())), records[1].value_by_name("name"));
}

#[test]
fn numeric_values_decode_with_declared_scale() {
    let source = ByteSource::from_bytes(sample_table());
    let mut reader = Reader::from_source(source, ParserOptions::default()).unwrap();
    let records: Vec<_> = reader.records().unwrap().collect::<Result<_, _>>().unwrap();
    match records[0].value_by_name("score").unwrap() {
        Value::Numeric(Some(decimal)) => assert_eq!("91.50", decimal.to_string()),
        other => panic!("expected a numeric value, got {other:?}"),
    }
}

#[test]
fn memo_field_resolves_through_attached_memo_file() {
    let source = ByteSource::from_bytes(sample_table());
    let mut reader = Reader::from_source(source, ParserOptions::default()).unwrap();
    reader
        .attach_memo(ByteSource::from_bytes(legacy_memo_file("field notes")), MemoDialect::LegacyFixedBlock)
        .unwrap();

    let records: Vec<_> = reader.records().unwrap().collect::<Result<_, _>>().unwrap();
    let note = records[0].value_by_name("note").unwrap();
    let entry = reader.resolve_memo(note).unwrap().unwrap();
    match entry {
        xbase_core::dbf::MemoEntry::Text(text) => assert_eq!("field notes", text),
        other => panic!("expected text memo, got {other:?}"),
    }

    // Carol's memo index is blank, so there's nothing to resolve.
    let carol_note = records[1].value_by_name("note").unwrap();
    assert_eq!(None, reader.resolve_memo(carol_note).unwrap());
}

#[test]
fn include_deleted_surfaces_every_record_with_flag_set() {
    let source = ByteSource::from_bytes(sample_table());
    let options = ParserOptions::new().with_include_deleted(true);
    let mut reader = Reader::from_source(source, options).unwrap();
    let records: Vec<_> = reader.records().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(3, records.len());
    assert!(!records[0].is_deleted());
    assert!(records[1].is_deleted());
}

#[test]
fn max_records_caps_a_streaming_pass() {
    let source = ByteSource::from_bytes(sample_table());
    let options = ParserOptions::new().with_max_records(1);
    let mut reader = Reader::from_source(source, options).unwrap();
    let records: Vec<_> = reader.records().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(1, records.len());
}

#[test]
fn record_at_and_statistics_use_random_access() {
    let source = ByteSource::from_bytes(sample_table());
    let options = ParserOptions::new().with_include_deleted(true);
    let mut reader = Reader::from_source(source, options).unwrap();

    let stats = reader.statistics().unwrap();
    assert_eq!(3, stats.record_count);
    assert_eq!(1, stats.deleted_count);
    assert_eq!(3, stats.field_count);

    let bob = reader.record_at(1).unwrap().unwrap();
    assert!(bob.is_deleted());
    assert_eq!(Some(&Value::Character("Bob".to_string())), bob.value(0));
    assert_eq!(None, reader.record_at(99).unwrap().map(|_| ()));
}

#[test]
fn load_materializes_then_unload_returns_to_streaming() {
    let source = ByteSource::from_bytes(sample_table());
    let mut reader = Reader::from_source(source, ParserOptions::default()).unwrap();
    reader.load().unwrap();
    assert_eq!(2, reader.records().unwrap().count());
    reader.unload();
    assert_eq!(2, reader.records().unwrap().count());
}

#[test]
fn raw_mode_skips_typed_decoding() {
    let source = ByteSource::from_bytes(sample_table());
    let options = ParserOptions::new().with_raw_mode(true);
    let mut reader = Reader::from_source(source, options).unwrap();
    let records: Vec<_> = reader.records().unwrap().collect::<Result<_, _>>().unwrap();
    match records[0].value(0).unwrap() {
        Value::Raw(bytes) => assert_eq!(b"Alice     ", bytes.as_slice()),
        other => panic!("expected raw bytes, got {other:?}"),
    }
}

#[test]
fn unrecognized_format_variant_byte_is_rejected() {
    let mut bytes = sample_table();
    bytes[0] = 0xaa;
    let source = ByteSource::from_bytes(bytes);
    assert!(Reader::from_source(source, ParserOptions::default()).is_err());
}

#[test]
fn encoding_override_is_honored_for_character_fields() {
    let source = ByteSource::from_bytes(sample_table());
    let options = ParserOptions::new().with_encoding(UTF_8);
    let mut reader = Reader::from_source(source, options).unwrap();
    let records: Vec<_> = reader.records().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(Some(&Value::Character("Alice".to_string())), records[0].value_by_name("name"));
}

#[test]
fn field_offsets_account_for_the_deletion_marker_byte() {
    let source = ByteSource::from_bytes(sample_table());
    let reader = Reader::from_source(source, ParserOptions::default()).unwrap();
    assert_eq!(1, reader.fields()[0].offset);
    assert_eq!(11, reader.fields()[1].offset);
    assert_eq!(17, reader.fields()[2].offset);
}

#[test]
fn validate_fields_false_yields_invalid_value_instead_of_aborting() {
    let mut bytes = sample_table();
    // Corrupt Alice's score field with non-numeric garbage.
    let score_offset = 32 + 3 * 32 + 1 + 1 + 10;
    bytes[score_offset..score_offset + 6].copy_from_slice(b"!!!!!!");

    let source = ByteSource::from_bytes(bytes);
    let options = ParserOptions::new().with_validate_fields(false);
    let mut reader = Reader::from_source(source, options).unwrap();
    let records: Vec<_> = reader.records().unwrap().collect::<Result<_, _>>().unwrap();
    match records[0].value_by_name("score").unwrap() {
        Value::InvalidValue { raw, .. } => assert_eq!(b"!!!!!!", raw.as_slice()),
        other => panic!("expected an invalid value, got {other:?}"),
    }
    // The rest of the record still decoded fine.
    assert_eq!(Some(&Value::Character("Alice".to_string())), records[0].value_by_name("name"));
}

#[test]
fn an_overstated_record_count_over_a_stream_ends_cleanly_on_the_last_boundary() {
    let mut bytes = sample_table();
    // Claim a fourth record exists even though the byte stream ends after
    // the third; a non-seekable stream has no file length to catch this
    // up front, so the reader must stop cleanly instead of erroring.
    bytes[4..8].copy_from_slice(&4u32.to_le_bytes());

    let source = ByteSource::from_reader(std::io::Cursor::new(bytes));
    let options = ParserOptions::new().with_include_deleted(true);
    let mut reader = Reader::from_source(source, options).unwrap();
    let records: Vec<_> = reader.records().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(3, records.len());
}

