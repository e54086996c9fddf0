//! Reading xBase (`.dbf`) database tables and their memo side-cars.

mod field;
mod header;
mod memo;
mod reader;
mod record;
mod value;

pub use field::{parse_fields, FieldDescriptor, FieldType};
pub use header::{FileHeader, Variant};
pub use memo::{MemoDialect, MemoEntry, MemoFile};
pub use reader::{Reader, RecordIter, Statistics};
pub use record::Record;
pub use value::{Decimal, Value};
