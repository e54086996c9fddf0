//! Shape record geometry: a sum type over the Shapefile spec's shape
//! kinds, decoded from one record's content bytes.

use byteorder::{ByteOrder, LittleEndian};

use crate::shp::header::ShapeType;
use crate::shp::rtree::Rect;
use crate::{Error, Result};

/// One vertex, with optional elevation and measure bands.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
    pub m: Option<f64>,
}

/// A Shapefile multipatch part's surface kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PartType {
    TriangleStrip,
    TriangleFan,
    OuterRing,
    InnerRing,
    FirstRing,
    Ring,
}

impl PartType {
    fn from_i32(code: i32) -> Result<PartType> {
        match code {
            0 => Ok(PartType::TriangleStrip),
            1 => Ok(PartType::TriangleFan),
            2 => Ok(PartType::OuterRing),
            3 => Ok(PartType::InnerRing),
            4 => Ok(PartType::FirstRing),
            5 => Ok(PartType::Ring),
            other => Err(Error::InvalidShape(format!("unrecognized multipatch part type {other}"))),
        }
    }
}

/// A decoded geometry record.
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    Null,
    Point(Vertex),
    MultiPoint(Vec<Vertex>),
    Polyline(Vec<Vec<Vertex>>),
    Polygon(Vec<Vec<Vertex>>),
    MultiPatch {
        parts: Vec<Vec<Vertex>>,
        part_types: Vec<PartType>,
    },
}

impl Geometry {
    /// Every vertex making up this geometry, in on-disk order. A point
    /// yields its single vertex; parted shapes yield every ring/strip's
    /// vertices back to back.
    pub fn vertices(&self) -> Vec<&Vertex> {
        match self {
            Geometry::Null => Vec::new(),
            Geometry::Point(vertex) => vec![vertex],
            Geometry::MultiPoint(points) => points.iter().collect(),
            Geometry::Polyline(parts) | Geometry::Polygon(parts) => parts.iter().flatten().collect(),
            Geometry::MultiPatch { parts, .. } => parts.iter().flatten().collect(),
        }
    }

    /// `false` if any vertex carries a non-finite `x`/`y`/`z`/`m`
    /// coordinate, or if any part contains two identical consecutive
    /// vertices. Null geometry is always valid.
    pub fn is_valid(&self) -> bool {
        let parts: Vec<&[Vertex]> = match self {
            Geometry::Null => return true,
            Geometry::Point(vertex) => return vertex_is_finite(vertex),
            Geometry::MultiPoint(points) => vec![points.as_slice()],
            Geometry::Polyline(parts) | Geometry::Polygon(parts) => parts.iter().map(Vec::as_slice).collect(),
            Geometry::MultiPatch { parts, .. } => parts.iter().map(Vec::as_slice).collect(),
        };
        parts.iter().all(|part| {
            part.iter().all(vertex_is_finite) && part.windows(2).all(|pair| pair[0] != pair[1])
        })
    }

    /// Maps `f` over every vertex, returning a new geometry with the same
    /// shape but transformed coordinates. Useful for reprojecting a
    /// geometry with a caller-supplied coordinate mapping.
    pub fn transform(&self, f: impl Fn(Vertex) -> Vertex) -> Geometry {
        match self {
            Geometry::Null => Geometry::Null,
            Geometry::Point(vertex) => Geometry::Point(f(*vertex)),
            Geometry::MultiPoint(points) => Geometry::MultiPoint(points.iter().map(|v| f(*v)).collect()),
            Geometry::Polyline(parts) => Geometry::Polyline(transform_parts(parts, &f)),
            Geometry::Polygon(parts) => Geometry::Polygon(transform_parts(parts, &f)),
            Geometry::MultiPatch { parts, part_types } => Geometry::MultiPatch {
                parts: transform_parts(parts, &f),
                part_types: part_types.clone(),
            },
        }
    }
}

fn vertex_is_finite(vertex: &Vertex) -> bool {
    vertex.x.is_finite()
        && vertex.y.is_finite()
        && vertex.z.map(f64::is_finite).unwrap_or(true)
        && vertex.m.map(f64::is_finite).unwrap_or(true)
}

fn transform_parts(parts: &[Vec<Vertex>], f: impl Fn(Vertex) -> Vertex) -> Vec<Vec<Vertex>> {
    parts.iter().map(|part| part.iter().map(|v| f(*v)).collect()).collect()
}

fn read_f64(data: &[u8], offset: usize) -> Result<f64> {
    if offset + 8 > data.len() {
        return Err(Error::truncated(offset as u64, 8, data.len().saturating_sub(offset)));
    }
    Ok(LittleEndian::read_f64(&data[offset..offset + 8]))
}

fn read_i32(data: &[u8], offset: usize) -> Result<i32> {
    if offset + 4 > data.len() {
        return Err(Error::truncated(offset as u64, 4, data.len().saturating_sub(offset)));
    }
    Ok(LittleEndian::read_i32(&data[offset..offset + 4]))
}

/// Decodes one record's content (everything after the 8-byte record
/// header, starting with the repeated little-endian shape-type field).
pub fn parse_shape(data: &[u8]) -> Result<Geometry> {
    let shape_type = ShapeType::from_i32(read_i32(data, 0)?)?;
    if shape_type == ShapeType::Null {
        return Ok(Geometry::Null);
    }

    match shape_type {
        ShapeType::Point | ShapeType::PointZ | ShapeType::PointM => parse_point(data, shape_type),
        ShapeType::MultiPoint | ShapeType::MultiPointZ | ShapeType::MultiPointM => parse_multipoint(data, shape_type),
        ShapeType::PolyLine | ShapeType::PolyLineZ | ShapeType::PolyLineM => {
            parse_multipart(data, shape_type).map(Geometry::Polyline)
        }
        ShapeType::Polygon | ShapeType::PolygonZ | ShapeType::PolygonM => {
            parse_multipart(data, shape_type).map(Geometry::Polygon)
        }
        ShapeType::MultiPatch => parse_multipatch(data),
        ShapeType::Null => unreachable!(),
    }
}

fn parse_point(data: &[u8], shape_type: ShapeType) -> Result<Geometry> {
    let x = read_f64(data, 4)?;
    let y = read_f64(data, 12)?;
    let mut offset = 20;
    let z = if shape_type.has_z() {
        let value = read_f64(data, offset)?;
        offset += 8;
        normalize_measure(value)
    } else {
        None
    };
    let m = if shape_type.has_m() && data.len() >= offset + 8 {
        normalize_measure(read_f64(data, offset)?)
    } else {
        None
    };
    Ok(Geometry::Point(Vertex { x, y, z, m }))
}

fn parse_multipoint(data: &[u8], shape_type: ShapeType) -> Result<Geometry> {
    let num_points = read_i32(data, 36)? as usize;
    let mut offset = 40;
    let mut points = Vec::with_capacity(num_points);
    for _ in 0..num_points {
        let x = read_f64(data, offset)?;
        let y = read_f64(data, offset + 8)?;
        points.push(Vertex { x, y, z: None, m: None });
        offset += 16;
    }
    apply_z_and_m(data, &mut points, offset, shape_type)?;
    Ok(Geometry::MultiPoint(points))
}

fn parse_multipart(data: &[u8], shape_type: ShapeType) -> Result<Vec<Vec<Vertex>>> {
    let (flat, part_starts, offset_after) = parse_parts_and_points(data, shape_type, false)?;
    let _ = offset_after;
    Ok(split_into_parts(flat, &part_starts))
}

fn parse_multipatch(data: &[u8]) -> Result<Geometry> {
    let (flat, part_starts, part_types) = parse_multipatch_raw(data)?;
    Ok(Geometry::MultiPatch {
        parts: split_into_parts(flat, &part_starts),
        part_types,
    })
}

fn parse_multipatch_raw(data: &[u8]) -> Result<(Vec<Vertex>, Vec<usize>, Vec<PartType>)> {
    let num_parts = read_i32(data, 36)? as usize;
    let num_points = read_i32(data, 40)? as usize;
    let mut offset = 44;
    let mut part_starts = Vec::with_capacity(num_parts);
    for _ in 0..num_parts {
        part_starts.push(read_i32(data, offset)? as usize);
        offset += 4;
    }
    let mut part_types = Vec::with_capacity(num_parts);
    for _ in 0..num_parts {
        part_types.push(PartType::from_i32(read_i32(data, offset)?)?);
        offset += 4;
    }
    let mut points = Vec::with_capacity(num_points);
    for _ in 0..num_points {
        let x = read_f64(data, offset)?;
        let y = read_f64(data, offset + 8)?;
        points.push(Vertex { x, y, z: None, m: None });
        offset += 16;
    }
    apply_z_and_m(data, &mut points, offset, ShapeType::MultiPatch)?;
    Ok((points, part_starts, part_types))
}

fn parse_parts_and_points(
    data: &[u8],
    shape_type: ShapeType,
    _multipatch: bool,
) -> Result<(Vec<Vertex>, Vec<usize>, usize)> {
    let num_parts = read_i32(data, 36)? as usize;
    let num_points = read_i32(data, 40)? as usize;
    let mut offset = 44;
    let mut part_starts = Vec::with_capacity(num_parts);
    for _ in 0..num_parts {
        part_starts.push(read_i32(data, offset)? as usize);
        offset += 4;
    }
    let mut points = Vec::with_capacity(num_points);
    for _ in 0..num_points {
        let x = read_f64(data, offset)?;
        let y = read_f64(data, offset + 8)?;
        points.push(Vertex { x, y, z: None, m: None });
        offset += 16;
    }
    apply_z_and_m(data, &mut points, offset, shape_type)?;
    Ok((points, part_starts, offset))
}

fn apply_z_and_m(data: &[u8], points: &mut [Vertex], mut offset: usize, shape_type: ShapeType) -> Result<()> {
    if shape_type.has_z() && data.len() >= offset + 16 {
        offset += 16; // z range
        for point in points.iter_mut() {
            if data.len() < offset + 8 {
                break;
            }
            point.z = normalize_measure(read_f64(data, offset)?);
            offset += 8;
        }
    }
    if shape_type.has_m() && data.len() >= offset + 16 {
        offset += 16; // m range
        for point in points.iter_mut() {
            if data.len() < offset + 8 {
                break;
            }
            point.m = normalize_measure(read_f64(data, offset)?);
            offset += 8;
        }
    }
    Ok(())
}

/// `NaN` is the wire sentinel for "no measure here"; normalize it away so
/// a `Some(NaN)` never escapes parsing.
fn normalize_measure(value: f64) -> Option<f64> {
    if value.is_nan() {
        None
    } else {
        Some(value)
    }
}

/// The 2D bounding box enclosing a geometry's vertices, or `None` for a
/// null shape.
pub fn bounding_box(geometry: &Geometry) -> Option<Rect> {
    match geometry {
        Geometry::Null => None,
        Geometry::Point(vertex) => Some(Rect::point(vertex.x, vertex.y)),
        Geometry::MultiPoint(points) => bbox_of_vertices(points),
        Geometry::Polyline(parts) | Geometry::Polygon(parts) => {
            bbox_of_vertices(&parts.iter().flatten().copied().collect::<Vec<_>>())
        }
        Geometry::MultiPatch { parts, .. } => bbox_of_vertices(&parts.iter().flatten().copied().collect::<Vec<_>>()),
    }
}

fn bbox_of_vertices(vertices: &[Vertex]) -> Option<Rect> {
    let mut iter = vertices.iter();
    let first = iter.next()?;
    let mut rect = Rect::point(first.x, first.y);
    for vertex in iter {
        rect = rect.union(&Rect::point(vertex.x, vertex.y));
    }
    Some(rect)
}

fn split_into_parts(flat: Vec<Vertex>, part_starts: &[usize]) -> Vec<Vec<Vertex>> {
    let mut parts = Vec::with_capacity(part_starts.len());
    for (i, &start) in part_starts.iter().enumerate() {
        let end = part_starts.get(i + 1).copied().unwrap_or(flat.len());
        parts.push(flat[start.min(flat.len())..end.min(flat.len())].to_vec());
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point_bytes(x: f64, y: f64) -> Vec<u8> {
        let mut data = vec![0u8; 20];
        LittleEndian::write_i32(&mut data[0..4], 1);
        LittleEndian::write_f64(&mut data[4..12], x);
        LittleEndian::write_f64(&mut data[12..20], y);
        data
    }

    #[test]
    fn parses_a_plain_point() {
        let geometry = parse_shape(&point_bytes(1.5, -2.5)).unwrap();
        assert_eq!(
            Geometry::Point(Vertex { x: 1.5, y: -2.5, z: None, m: None }),
            geometry
        );
    }

    #[test]
    fn parses_null_shape() {
        let mut data = vec![0u8; 4];
        LittleEndian::write_i32(&mut data[0..4], 0);
        assert_eq!(Geometry::Null, parse_shape(&data).unwrap());
    }

    fn polyline_bytes() -> Vec<u8> {
        // One part with 2 points: (0,0) and (1,1).
        let mut data = vec![0u8; 4 + 32 + 4 + 4 + 4 + 32];
        LittleEndian::write_i32(&mut data[0..4], 3);
        LittleEndian::write_i32(&mut data[36..40], 1); // num parts
        LittleEndian::write_i32(&mut data[40..44], 2); // num points
        LittleEndian::write_i32(&mut data[44..48], 0); // part start
        LittleEndian::write_f64(&mut data[48..56], 0.0);
        LittleEndian::write_f64(&mut data[56..64], 0.0);
        LittleEndian::write_f64(&mut data[64..72], 1.0);
        LittleEndian::write_f64(&mut data[72..80], 1.0);
        data
    }

    #[test]
    fn parses_single_part_polyline() {
        let geometry = parse_shape(&polyline_bytes()).unwrap();
        match geometry {
            Geometry::Polyline(parts) => {
                assert_eq!(1, parts.len());
                assert_eq!(2, parts[0].len());
                assert_eq!(0.0, parts[0][0].x);
                assert_eq!(1.0, parts[0][1].y);
            }
            other => panic!("expected Polyline, got {other:?}"),
        }
    }

    #[test]
    fn a_nan_measure_on_a_point_m_normalizes_to_none() {
        let mut data = vec![0u8; 28];
        LittleEndian::write_i32(&mut data[0..4], 21); // PointM
        LittleEndian::write_f64(&mut data[4..12], 1.5);
        LittleEndian::write_f64(&mut data[12..20], -2.5);
        LittleEndian::write_f64(&mut data[20..28], f64::NAN);
        let geometry = parse_shape(&data).unwrap();
        assert_eq!(Geometry::Point(Vertex { x: 1.5, y: -2.5, z: None, m: None }), geometry);
    }
}
