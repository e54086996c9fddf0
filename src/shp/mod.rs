//! Reading Shapefile (`.shp`) geometry, its `.shx` index sidecar, and a
//! spatial index over the decoded geometries.

mod geometry;
mod header;
mod reader;
mod rtree;

pub use geometry::{bounding_box, parse_shape, Geometry, PartType, Vertex};
pub use header::{BoundingBox, ShapeType, ShapefileHeader};
pub use reader::{ShapeReader, ShapeRecordIter, ShxEntry, ShxReader};
pub use rtree::{RTree, RTreeStatistics, Rect};
