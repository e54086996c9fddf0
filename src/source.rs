//! A uniform view over the places xBase and Shapefile bytes can come from:
//! plain files, memory-mapped files, in-memory buffers, and forward-only
//! streams.
//!
//! [`ByteSource`] is modeled as a single enum rather than a `dyn Read +
//! Seek` trait object: the set of concrete backends is closed and known up
//! front, and matching on the enum lets each backend implement random
//! access (or the lack of it) in the way that's cheapest for it.

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use memmap2::Mmap;

use crate::{Error, Result};

/// Inputs larger than this many bytes, when read from a non-seekable
/// stream with a known size hint, are spilled to a temporary file rather
/// than buffered in memory.
pub const SPILL_THRESHOLD: u64 = 256 * 1024 * 1024;

/// A byte source that may or may not support random access.
///
/// Every variant supports sequential reads via [`ByteSource::read_exact`].
/// [`ByteSource::is_seekable`] reports whether [`ByteSource::read_at`] and
/// [`ByteSource::len`] are available.
pub enum ByteSource {
    /// A plain file, read through a buffered reader.
    File {
        reader: BufReader<File>,
        len: u64,
    },
    /// A read-only memory-mapped file.
    Mmap { map: Mmap, pos: u64 },
    /// An in-memory buffer (or a stream that was small enough to fully
    /// buffer up front).
    Memory(Cursor<Vec<u8>>),
    /// A forward-only stream with no random access. Reading is sequential
    /// only; `is_seekable` is always `false`.
    Stream(Box<dyn Read>),
}

impl ByteSource {
    /// Opens a file, preferring a memory map and falling back to a
    /// buffered file handle if mapping fails (e.g. on an empty file, or a
    /// filesystem that doesn't support mmap).
    pub fn open(path: impl AsRef<Path>) -> Result<ByteSource> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        if len == 0 {
            return Ok(ByteSource::Memory(Cursor::new(Vec::new())));
        }
        match unsafe { Mmap::map(&file) } {
            Ok(map) => {
                log::debug!("memory-mapped {} ({} bytes)", path.display(), len);
                Ok(ByteSource::Mmap { map, pos: 0 })
            }
            Err(err) => {
                log::warn!(
                    "failed to memory-map {}: {err}; falling back to buffered reads",
                    path.display()
                );
                Ok(ByteSource::File {
                    reader: BufReader::new(file),
                    len,
                })
            }
        }
    }

    /// Wraps an already-open file.
    pub fn from_file(file: File) -> Result<ByteSource> {
        let len = file.metadata()?.len();
        Ok(ByteSource::File {
            reader: BufReader::new(file),
            len,
        })
    }

    /// Wraps an in-memory buffer. Always seekable.
    pub fn from_bytes(bytes: Vec<u8>) -> ByteSource {
        ByteSource::Memory(Cursor::new(bytes))
    }

    /// Wraps a forward-only reader with no size information. The result is
    /// never seekable; random-access operations fail with
    /// [`Error::RequiresSeek`] unless the caller first materializes
    /// records via `load()`.
    pub fn from_reader(reader: impl Read + 'static) -> ByteSource {
        ByteSource::Stream(Box::new(reader))
    }

    /// Wraps a forward-only reader with an estimated total size.
    ///
    /// When `size_hint` exceeds [`SPILL_THRESHOLD`], the entire stream is
    /// copied to a temporary file up front, trading a one-time sequential
    /// copy for subsequent random access. Smaller streams are buffered
    /// directly in memory.
    pub fn from_reader_with_size_hint(
        mut reader: impl Read,
        size_hint: u64,
    ) -> Result<ByteSource> {
        if size_hint > SPILL_THRESHOLD {
            log::debug!(
                "spilling {size_hint}-byte stream to a temporary file (threshold {SPILL_THRESHOLD})"
            );
            let mut file = tempfile::tempfile()?;
            io::copy(&mut reader, &mut file)?;
            file.seek(SeekFrom::Start(0))?;
            let len = file.metadata()?.len();
            Ok(ByteSource::File {
                reader: BufReader::new(file),
                len,
            })
        } else {
            let mut buf = Vec::with_capacity(size_hint as usize);
            reader.read_to_end(&mut buf)?;
            Ok(ByteSource::Memory(Cursor::new(buf)))
        }
    }

    /// Whether [`ByteSource::read_at`] and [`ByteSource::len`] are
    /// available.
    pub fn is_seekable(&self) -> bool {
        !matches!(self, ByteSource::Stream(_))
    }

    /// The total length in bytes, if known.
    pub fn len(&self) -> Option<u64> {
        match self {
            ByteSource::File { len, .. } => Some(*len),
            ByteSource::Mmap { map, .. } => Some(map.len() as u64),
            ByteSource::Memory(cursor) => Some(cursor.get_ref().len() as u64),
            ByteSource::Stream(_) => None,
        }
    }

    /// Reads `buf.len()` bytes, advancing the source's internal cursor.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        match self {
            ByteSource::File { reader, .. } => reader.read_exact(buf).map_err(Error::from),
            ByteSource::Mmap { map, pos } => {
                let start = *pos as usize;
                let end = start
                    .checked_add(buf.len())
                    .filter(|&end| end <= map.len())
                    .ok_or_else(|| Error::truncated(*pos, buf.len(), map.len() - start.min(map.len())))?;
                buf.copy_from_slice(&map[start..end]);
                *pos = end as u64;
                Ok(())
            }
            ByteSource::Memory(cursor) => cursor.read_exact(buf).map_err(Error::from),
            ByteSource::Stream(reader) => reader.read_exact(buf).map_err(Error::from),
        }
    }

    /// Moves the position used by [`ByteSource::read_exact`] to `offset`.
    ///
    /// Fails with [`Error::RequiresSeek`] on a non-seekable source.
    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        match self {
            ByteSource::File { reader, .. } => {
                reader.seek(SeekFrom::Start(offset))?;
                Ok(())
            }
            ByteSource::Mmap { pos, .. } => {
                *pos = offset;
                Ok(())
            }
            ByteSource::Memory(cursor) => {
                cursor.set_position(offset);
                Ok(())
            }
            ByteSource::Stream(_) => Err(Error::RequiresSeek),
        }
    }

    /// Reads `buf.len()` bytes starting at `offset`, without disturbing the
    /// position used by [`ByteSource::read_exact`].
    ///
    /// Fails with [`Error::RequiresSeek`] on a non-seekable source.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        match self {
            ByteSource::File { reader, len } => {
                let end = offset + buf.len() as u64;
                if end > *len {
                    return Err(Error::truncated(
                        offset,
                        buf.len(),
                        len.saturating_sub(offset) as usize,
                    ));
                }
                let saved = reader.stream_position()?;
                reader.seek(SeekFrom::Start(offset))?;
                let result = reader.read_exact(buf).map_err(Error::from);
                reader.seek(SeekFrom::Start(saved))?;
                result
            }
            ByteSource::Mmap { map, .. } => {
                let start = offset as usize;
                let end = start
                    .checked_add(buf.len())
                    .filter(|&end| end <= map.len())
                    .ok_or_else(|| {
                        Error::truncated(offset, buf.len(), map.len().saturating_sub(start))
                    })?;
                buf.copy_from_slice(&map[start..end]);
                Ok(())
            }
            ByteSource::Memory(cursor) => {
                let data = cursor.get_ref();
                let start = offset as usize;
                let end = start
                    .checked_add(buf.len())
                    .filter(|&end| end <= data.len())
                    .ok_or_else(|| {
                        Error::truncated(offset, buf.len(), data.len().saturating_sub(start))
                    })?;
                buf.copy_from_slice(&data[start..end]);
                Ok(())
            }
            ByteSource::Stream(_) => Err(Error::RequiresSeek),
        }
    }

    /// Reads `buf.len()` bytes like [`ByteSource::read_exact`], but treats
    /// hitting end-of-input before any byte of `buf` is filled as a clean
    /// end of the sequence (`Ok(false)`) rather than an error. Filling
    /// `buf` completely returns `Ok(true)`; stopping partway through
    /// returns [`Error::Truncated`].
    ///
    /// This is what lets streaming record iteration tolerate a header
    /// record count that overstates how many records actually fit in a
    /// non-seekable source: the stream simply ends a record short rather
    /// than surfacing a spurious I/O error.
    pub fn read_record_or_eof(&mut self, buf: &mut [u8]) -> Result<bool> {
        match self {
            ByteSource::File { reader, .. } => read_to_buf_or_eof(reader, buf),
            ByteSource::Stream(reader) => read_to_buf_or_eof(reader, buf),
            ByteSource::Mmap { .. } | ByteSource::Memory(_) => self.read_exact(buf).map(|()| true),
        }
    }
}

fn read_to_buf_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(Error::from(err)),
        }
    }
    if filled == 0 {
        Ok(false)
    } else if filled == buf.len() {
        Ok(true)
    } else {
        Err(Error::truncated(0, buf.len(), filled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_round_trip() {
        let mut source = ByteSource::from_bytes(vec![1, 2, 3, 4, 5]);
        let mut buf = [0; 2];
        source.read_exact(&mut buf).unwrap();
        assert_eq!([1, 2], buf);
        source.read_at(3, &mut buf).unwrap();
        assert_eq!([4, 5], buf);
        // read_exact's cursor wasn't disturbed by read_at.
        source.read_exact(&mut buf).unwrap();
        assert_eq!([3, 4], buf);
    }

    #[test]
    fn seek_to_repositions_sequential_reads() {
        let mut source = ByteSource::from_bytes(vec![1, 2, 3, 4, 5]);
        let mut buf = [0; 2];
        source.read_exact(&mut buf).unwrap();
        source.seek_to(0).unwrap();
        source.read_exact(&mut buf).unwrap();
        assert_eq!([1, 2], buf);
    }

    #[test]
    fn stream_is_not_seekable() {
        let mut source = ByteSource::from_reader(Cursor::new(vec![1, 2, 3]));
        assert!(!source.is_seekable());
        assert_eq!(None, source.len());
        let mut buf = [0; 1];
        assert!(matches!(source.read_at(0, &mut buf), Err(Error::RequiresSeek)));
    }

    #[test]
    fn read_record_or_eof_distinguishes_clean_end_from_torn_record() {
        let mut source = ByteSource::from_reader(Cursor::new(vec![1, 2, 3, 4]));
        let mut buf = [0u8; 2];
        assert_eq!(true, source.read_record_or_eof(&mut buf).unwrap());
        assert_eq!([1, 2], buf);
        assert_eq!(true, source.read_record_or_eof(&mut buf).unwrap());
        assert_eq!([3, 4], buf);
        // Exactly out of bytes: a clean end, not an error.
        assert_eq!(false, source.read_record_or_eof(&mut buf).unwrap());

        let mut torn = ByteSource::from_reader(Cursor::new(vec![1, 2, 3]));
        let mut first = [0u8; 2];
        assert!(torn.read_record_or_eof(&mut first).unwrap());
        let mut second = [0u8; 2];
        assert!(torn.read_record_or_eof(&mut second).is_err());
    }

    #[test]
    fn small_stream_with_size_hint_is_buffered_and_seekable() {
        let data = vec![9, 8, 7, 6];
        let mut source =
            ByteSource::from_reader_with_size_hint(Cursor::new(data.clone()), data.len() as u64)
                .unwrap();
        assert!(source.is_seekable());
        assert_eq!(Some(4), source.len());
        let mut buf = [0; 2];
        source.read_at(2, &mut buf).unwrap();
        assert_eq!([7, 6], buf);
    }
}
