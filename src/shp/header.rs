//! The 100-byte Shapefile header, shared (with a different trailing
//! section) by `.shp` and `.shx`.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::{Error, Result};

const FILE_CODE: i32 = 9994;
const EXPECTED_VERSION: i32 = 1000;

/// The geometry type a `.shp`/`.shx` file declares in its header, and
/// that every record in the file shares.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeType {
    Null,
    Point,
    PolyLine,
    Polygon,
    MultiPoint,
    PointZ,
    PolyLineZ,
    PolygonZ,
    MultiPointZ,
    PointM,
    PolyLineM,
    PolygonM,
    MultiPointM,
    MultiPatch,
}

impl ShapeType {
    /// Resolves a header's or record's shape-type code.
    pub fn from_i32(code: i32) -> Result<ShapeType> {
        match code {
            0 => Ok(ShapeType::Null),
            1 => Ok(ShapeType::Point),
            3 => Ok(ShapeType::PolyLine),
            5 => Ok(ShapeType::Polygon),
            8 => Ok(ShapeType::MultiPoint),
            11 => Ok(ShapeType::PointZ),
            13 => Ok(ShapeType::PolyLineZ),
            15 => Ok(ShapeType::PolygonZ),
            18 => Ok(ShapeType::MultiPointZ),
            21 => Ok(ShapeType::PointM),
            23 => Ok(ShapeType::PolyLineM),
            25 => Ok(ShapeType::PolygonM),
            28 => Ok(ShapeType::MultiPointM),
            31 => Ok(ShapeType::MultiPatch),
            other => Err(Error::InvalidShape(format!("unrecognized shape type code {other}"))),
        }
    }

    /// Whether geometries of this type carry a Z (elevation) band.
    pub fn has_z(&self) -> bool {
        matches!(
            self,
            ShapeType::PointZ | ShapeType::PolyLineZ | ShapeType::PolygonZ | ShapeType::MultiPointZ | ShapeType::MultiPatch
        )
    }

    /// Whether geometries of this type carry an M (measure) band. Every
    /// Z-banded type also carries an M band (possibly filled with the
    /// "no data" sentinel), so this returns `true` for those too.
    pub fn has_m(&self) -> bool {
        self.has_z()
            || matches!(
                self,
                ShapeType::PointM | ShapeType::PolyLineM | ShapeType::PolygonM | ShapeType::MultiPointM
            )
    }
}

/// A file-level bounding box: the 2D extent plus the Z and M ranges,
/// present in the header even when a file's shape type has neither band
/// (in which case they're zero).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
    pub z_min: f64,
    pub z_max: f64,
    pub m_min: f64,
    pub m_max: f64,
}

/// The decoded 100-byte header.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapefileHeader {
    /// The file's total length, computed from the header's 16-bit-word
    /// count field.
    pub file_length_bytes: u64,
    /// The shape type every record in the file shares.
    pub shape_type: ShapeType,
    /// The file-level bounding box.
    pub bounds: BoundingBox,
}

impl ShapefileHeader {
    /// Decodes a header from the first 100 bytes of a `.shp` or `.shx`
    /// file.
    pub fn parse(bytes: &[u8; 100]) -> Result<ShapefileHeader> {
        let file_code = BigEndian::read_i32(&bytes[0..4]);
        if file_code != FILE_CODE {
            return Err(Error::InvalidShape(format!(
                "file code {file_code} does not match the expected {FILE_CODE}"
            )));
        }
        let file_length_words = BigEndian::read_i32(&bytes[24..28]);
        let version = LittleEndian::read_i32(&bytes[28..32]);
        if version != EXPECTED_VERSION {
            log::warn!("shapefile declares version {version}, expected {EXPECTED_VERSION}; continuing anyway");
        }
        let shape_type = ShapeType::from_i32(LittleEndian::read_i32(&bytes[32..36]))?;

        let bounds = BoundingBox {
            x_min: LittleEndian::read_f64(&bytes[36..44]),
            y_min: LittleEndian::read_f64(&bytes[44..52]),
            x_max: LittleEndian::read_f64(&bytes[52..60]),
            y_max: LittleEndian::read_f64(&bytes[60..68]),
            z_min: LittleEndian::read_f64(&bytes[68..76]),
            z_max: LittleEndian::read_f64(&bytes[76..84]),
            m_min: LittleEndian::read_f64(&bytes[84..92]),
            m_max: LittleEndian::read_f64(&bytes[92..100]),
        };

        if bounds.x_min > bounds.x_max || bounds.y_min > bounds.y_max {
            return Err(Error::MalformedHeader(format!(
                "bounding box is inverted: x=[{}, {}], y=[{}, {}]",
                bounds.x_min, bounds.x_max, bounds.y_min, bounds.y_max
            )));
        }

        Ok(ShapefileHeader {
            file_length_bytes: file_length_words as u64 * 2,
            shape_type,
            bounds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header_bytes() -> [u8; 100] {
        let mut bytes = [0u8; 100];
        BigEndian::write_i32(&mut bytes[0..4], FILE_CODE);
        BigEndian::write_i32(&mut bytes[24..28], 50);
        LittleEndian::write_i32(&mut bytes[28..32], EXPECTED_VERSION);
        LittleEndian::write_i32(&mut bytes[32..36], 1);
        LittleEndian::write_f64(&mut bytes[36..44], -1.0);
        LittleEndian::write_f64(&mut bytes[60..68], 1.0);
        bytes
    }

    #[test]
    fn parses_point_header() {
        let header = ShapefileHeader::parse(&sample_header_bytes()).unwrap();
        assert_eq!(100, header.file_length_bytes);
        assert_eq!(ShapeType::Point, header.shape_type);
        assert_eq!(-1.0, header.bounds.x_min);
        assert_eq!(1.0, header.bounds.y_max);
    }

    #[test]
    fn wrong_file_code_is_rejected() {
        let mut bytes = sample_header_bytes();
        BigEndian::write_i32(&mut bytes[0..4], 1234);
        assert!(ShapefileHeader::parse(&bytes).is_err());
    }

    #[test]
    fn inverted_bounding_box_is_rejected() {
        let mut bytes = sample_header_bytes();
        LittleEndian::write_f64(&mut bytes[36..44], 5.0); // x_min > x_max (1.0 set below)
        LittleEndian::write_f64(&mut bytes[52..60], 1.0); // x_max
        assert!(ShapefileHeader::parse(&bytes).is_err());
    }

    #[test]
    fn z_and_m_bands_are_distinguished() {
        assert!(!ShapeType::Point.has_z());
        assert!(!ShapeType::Point.has_m());
        assert!(ShapeType::PointM.has_m());
        assert!(!ShapeType::PointM.has_z());
        assert!(ShapeType::PointZ.has_z());
        assert!(ShapeType::PointZ.has_m());
    }
}
