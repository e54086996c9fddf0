//! A single decoded row and its field-by-name/field-by-index accessors.

use std::rc::Rc;

use chrono::NaiveDate;

use crate::dbf::{FieldDescriptor, Value};

/// One decoded record: a deletion flag plus one [`Value`] per field, in
/// declaration order.
#[derive(Clone, Debug)]
pub struct Record {
    pub(crate) fields: Rc<Vec<FieldDescriptor>>,
    pub(crate) values: Vec<Value>,
    pub(crate) deleted: bool,
    pub(crate) ignore_case: bool,
}

impl Record {
    /// Whether the record carries the `0x2A` deletion marker.
    ///
    /// Deleted records are only yielded at all when
    /// [`crate::options::ParserOptions::include_deleted`] is set; this
    /// accessor lets a caller that opted in still tell them apart from
    /// live rows.
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// The number of fields in the record (equal to the table's field
    /// count).
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The value at a zero-based field index, if it exists.
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Looks up a value by field name.
    ///
    /// Matching honors [`crate::options::ParserOptions::ignore_case`] as
    /// configured when the table was opened.
    pub fn value_by_name(&self, name: &str) -> Option<&Value> {
        let position = self.fields.iter().position(|field| {
            if self.ignore_case {
                field.name.eq_ignore_ascii_case(name)
            } else {
                field.name == name
            }
        })?;
        self.values.get(position)
    }

    /// The field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }

    /// Iterates over `(descriptor, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldDescriptor, &Value)> {
        self.fields.iter().zip(self.values.iter())
    }

    /// Coerces the value at `index` to a `bool`, if its type carries one.
    pub fn as_bool(&self, index: usize) -> Option<bool> {
        coerce_bool(self.value(index)?)
    }

    /// Coerces the value named `name` to a `bool`, if its type carries
    /// one.
    pub fn as_bool_by_name(&self, name: &str) -> Option<bool> {
        coerce_bool(self.value_by_name(name)?)
    }

    /// Coerces the value at `index` to a calendar date. `Timestamp`
    /// values contribute their date component.
    pub fn as_date(&self, index: usize) -> Option<NaiveDate> {
        coerce_date(self.value(index)?)
    }

    /// Coerces the value named `name` to a calendar date. `Timestamp`
    /// values contribute their date component.
    pub fn as_date_by_name(&self, name: &str) -> Option<NaiveDate> {
        coerce_date(self.value_by_name(name)?)
    }

    /// Coerces the value at `index` to an `i64`, truncating any
    /// fractional part.
    pub fn as_i64(&self, index: usize) -> Option<i64> {
        coerce_i64(self.value(index)?)
    }

    /// Coerces the value named `name` to an `i64`, truncating any
    /// fractional part.
    pub fn as_i64_by_name(&self, name: &str) -> Option<i64> {
        coerce_i64(self.value_by_name(name)?)
    }

    /// Coerces the value at `index` to an `f64`.
    pub fn as_f64(&self, index: usize) -> Option<f64> {
        coerce_f64(self.value(index)?)
    }

    /// Coerces the value named `name` to an `f64`.
    pub fn as_f64_by_name(&self, name: &str) -> Option<f64> {
        coerce_f64(self.value_by_name(name)?)
    }
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Logical(b) => *b,
        _ => None,
    }
}

fn coerce_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Date(date) => *date,
        Value::Timestamp(timestamp) => timestamp.map(|dt| dt.date()),
        _ => None,
    }
}

fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(n) => Some(*n as i64),
        Value::Autoincrement(n) => Some(*n as i64),
        Value::Numeric(Some(decimal)) => Some(decimal.integral()),
        Value::Float(Some(f)) => Some(*f as i64),
        Value::Double(f) => Some(*f as i64),
        Value::Currency(f) => Some(*f as i64),
        _ => None,
    }
}

fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(n) => Some(*n as f64),
        Value::Autoincrement(n) => Some(*n as f64),
        Value::Numeric(Some(decimal)) => Some(decimal.to_f64_lossy()),
        Value::Float(Some(f)) => Some(*f),
        Value::Double(f) => Some(*f),
        Value::Currency(f) => Some(*f),
        _ => None,
    }
}
