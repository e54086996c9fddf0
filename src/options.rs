//! Tunables that govern how leniently tables, records, and spatial
//! indexes are parsed.

use encoding_rs::Encoding;

/// What to do when a `Character`/`Varchar` field's bytes don't decode
/// cleanly under the chosen encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CharacterDecodeFallback {
    /// Substitute the replacement character for invalid sequences
    /// (`encoding_rs`'s default behavior).
    Replace,
    /// Drop invalid bytes and decode the remainder.
    Skip,
    /// Return a [`crate::Error::FieldParse`] error.
    Fail,
}

/// Configuration shared by [`crate::dbf::Reader`] and [`crate::shp::ShapeReader`].
#[derive(Clone, Debug)]
pub struct ParserOptions {
    /// Forces a specific text codec instead of the one implied by the
    /// header's language-driver byte or a `.cpg` sidecar.
    pub encoding_override: Option<&'static Encoding>,
    /// Trims trailing spaces (and NUL padding) from `Character`/`Varchar`
    /// values. Defaults to `true`.
    pub trim_strings: bool,
    /// Matches field names case-insensitively in
    /// [`crate::dbf::Record::value`]. Defaults to `true`.
    pub ignore_case: bool,
    /// Lowercases field names when they're exposed to callers (e.g. in
    /// [`crate::dbf::Record::field_names`]). Defaults to `false`.
    pub lowercase_field_names: bool,
    /// Runs [`crate::dbf::FieldDescriptor::validate`] on every descriptor
    /// while opening a table. Defaults to `true`.
    pub validate_fields: bool,
    /// Tolerates a missing memo side-car file; memo fields resolve to
    /// `None` instead of failing to open the table. Defaults to `true`.
    pub ignore_missing_memo: bool,
    /// Skips all typed decoding and returns [`crate::dbf::Value::Raw`]
    /// for every field. Defaults to `false`.
    pub raw_mode: bool,
    /// Caps the number of records a streaming read will yield.
    pub max_records: Option<u64>,
    /// The number of leading records to skip.
    pub skip: u64,
    /// Whether records carrying the deletion marker are yielded at all.
    /// Defaults to `false`.
    pub include_deleted: bool,
    /// What to do on invalid text bytes. Defaults to `Replace`.
    pub character_decode_fallback: CharacterDecodeFallback,
    /// The maximum number of entries an R-tree node may hold before it
    /// splits. Defaults to 16.
    pub rtree_max_entries: usize,
    /// The minimum number of entries an R-tree node must retain after a
    /// split. Defaults to 4.
    pub rtree_min_entries: usize,
}

impl Default for ParserOptions {
    fn default() -> ParserOptions {
        ParserOptions {
            encoding_override: None,
            trim_strings: true,
            ignore_case: true,
            lowercase_field_names: false,
            validate_fields: true,
            ignore_missing_memo: true,
            raw_mode: false,
            max_records: None,
            skip: 0,
            include_deleted: false,
            character_decode_fallback: CharacterDecodeFallback::Replace,
            rtree_max_entries: 16,
            rtree_min_entries: 4,
        }
    }
}

impl ParserOptions {
    /// Starts from the defaults; use the builder methods below to
    /// override individual fields.
    pub fn new() -> ParserOptions {
        ParserOptions::default()
    }

    /// Overrides the text codec used for `Character`/`Varchar` fields.
    pub fn with_encoding(mut self, encoding: &'static Encoding) -> ParserOptions {
        self.encoding_override = Some(encoding);
        self
    }

    /// Sets [`ParserOptions::raw_mode`].
    pub fn with_raw_mode(mut self, raw_mode: bool) -> ParserOptions {
        self.raw_mode = raw_mode;
        self
    }

    /// Sets [`ParserOptions::include_deleted`].
    pub fn with_include_deleted(mut self, include_deleted: bool) -> ParserOptions {
        self.include_deleted = include_deleted;
        self
    }

    /// Sets [`ParserOptions::max_records`].
    pub fn with_max_records(mut self, max_records: u64) -> ParserOptions {
        self.max_records = Some(max_records);
        self
    }

    /// Sets [`ParserOptions::validate_fields`].
    pub fn with_validate_fields(mut self, validate_fields: bool) -> ParserOptions {
        self.validate_fields = validate_fields;
        self
    }
}
