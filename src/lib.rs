//! Reads legacy xBase (`.dbf`) database tables, their memo side-cars, and
//! Shapefile (`.shp`) geometry, with a spatial index over the decoded
//! shapes.
//!
//! # Reading a table
//!
//! ```no_run
//! use xbase_core::dbf::Reader;
//!
//! let mut reader = Reader::open("data/parcels.dbf").unwrap();
//! for record in reader.records().unwrap() {
//!     let record = record.unwrap();
//!     let name = record.value_by_name("name");
//!     println!("{name:?}");
//! }
//! ```
//!
//! # Reading geometry
//!
//! ```no_run
//! use xbase_core::shp::ShapeReader;
//!
//! let mut reader = ShapeReader::open("data/parcels.shp").unwrap();
//! for record in reader.records() {
//!     let (number, geometry) = record.unwrap();
//!     println!("record {number}: {geometry:?}");
//! }
//! ```
//!
//! # Indexing geometry
//!
//! ```no_run
//! use xbase_core::shp::{RTree, Rect, ShapeReader};
//!
//! let mut reader = ShapeReader::open("data/parcels.shp").unwrap();
//! let mut index = RTree::new(16, 4);
//! while let Some((number, geometry)) = reader.next_record().unwrap() {
//!     if let Some(bbox) = xbase_core::shp::bounding_box(&geometry) {
//!         index.insert(bbox, number);
//!     }
//! }
//! let nearby = index.search_point(0.0, 0.0);
//! println!("{} records near the origin", nearby.len());
//! ```

pub mod cancel;
pub mod codepage;
pub mod dbf;
mod error;
pub mod options;
pub mod shp;
pub mod source;

pub use error::{Error, Result};

/// Performs process-wide setup. Currently this primes the code-page
/// lookup table; calling it is optional, since every entry point that
/// needs it initializes lazily, but doing it up front avoids paying that
/// cost on the first record of a hot path.
pub fn init() {
    codepage::init();
}
