//! Integration tests over a multi-record `.shp` byte stream and the
//! spatial index built from its decoded geometries.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use xbase_core::shp::{bounding_box, Geometry, RTree, ShapeReader, ShapeType};
use xbase_core::source::ByteSource;

fn point_record(record_number: i32, x: f64, y: f64) -> Vec<u8> {
    let mut content = vec![0u8; 20];
    LittleEndian::write_i32(&mut content[0..4], 1);
    LittleEndian::write_f64(&mut content[4..12], x);
    LittleEndian::write_f64(&mut content[12..20], y);

    let mut record = vec![0u8; 8];
    BigEndian::write_i32(&mut record[0..4], record_number);
    BigEndian::write_i32(&mut record[4..8], (content.len() / 2) as i32);
    record.extend_from_slice(&content);
    record
}

fn sample_shapefile(points: &[(f64, f64)]) -> Vec<u8> {
    let mut records = Vec::new();
    for (i, &(x, y)) in points.iter().enumerate() {
        records.extend_from_slice(&point_record((i + 1) as i32, x, y));
    }

    let mut bytes = vec![0u8; 100];
    BigEndian::write_i32(&mut bytes[0..4], 9994);
    let total_words = (100 + records.len()) as i32 / 2;
    BigEndian::write_i32(&mut bytes[24..28], total_words);
    LittleEndian::write_i32(&mut bytes[28..32], 1000);
    LittleEndian::write_i32(&mut bytes[32..36], 1); // Point
    bytes.extend_from_slice(&records);
    bytes
}

#[test]
fn streams_every_point_record_in_order() {
    let bytes = sample_shapefile(&[(0.0, 0.0), (1.0, 1.0), (-5.0, 5.0)]);
    let mut reader = ShapeReader::from_source(ByteSource::from_bytes(bytes)).unwrap();

    let records: Vec<_> = reader.records().collect::<Result<_, _>>().unwrap();
    assert_eq!(3, records.len());
    assert_eq!(1, records[0].0);
    match &records[2].1 {
        Geometry::Point(vertex) => {
            assert_eq!(-5.0, vertex.x);
            assert_eq!(5.0, vertex.y);
        }
        other => panic!("expected a point, got {other:?}"),
    }
}

#[test]
fn header_declares_point_shape_type() {
    let bytes = sample_shapefile(&[(0.0, 0.0)]);
    let reader = ShapeReader::from_source(ByteSource::from_bytes(bytes)).unwrap();
    assert_eq!(ShapeType::Point, reader.header().shape_type);
}

#[test]
fn rtree_indexes_decoded_points_and_answers_spatial_queries() {
    let points = [(0.0, 0.0), (10.0, 10.0), (10.5, 10.5), (-20.0, -20.0)];
    let bytes = sample_shapefile(&points);
    let mut reader = ShapeReader::from_source(ByteSource::from_bytes(bytes)).unwrap();

    let mut index = RTree::new(4, 2);
    while let Some((number, geometry)) = reader.next_record().unwrap() {
        if let Some(bbox) = bounding_box(&geometry) {
            index.insert(bbox, number);
        }
    }

    assert_eq!(4, index.len());
    let nearby = index.search_point(10.2, 10.2);
    assert!(nearby.contains(&&2) || nearby.contains(&&3));

    let nearest = index.nearest(0.0, 0.0, 1);
    assert_eq!(vec![&1], nearest);
}
