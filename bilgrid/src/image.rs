//! Byte access to raw grid sample data.

use crate::{BilError, BYTES_PER_PIXEL};
use memmap2::Mmap;
use std::{
    fs::File,
    io::{Cursor, Read, Seek},
    path::Path,
};

/// Seekable byte stream over raw sample data.
pub trait SampleStream: Read + Seek {}

impl<T: Read + Seek> SampleStream for T {}

/// A source of raw BIL sample bytes.
///
/// The format carries no header, so dimensions come from the source
/// itself. Every call to [`stream`](Self::stream) returns a fresh stream
/// positioned at the first sample; samples are never cached by the
/// reader.
pub trait ElevationImage: Send + Sync {
    /// Samples per row.
    fn width(&self) -> usize;

    /// Number of rows.
    fn height(&self) -> usize;

    fn stream(&self) -> Result<Box<dyn SampleStream + '_>, BilError>;
}

/// Sample data held in memory.
///
/// The stated dimensions are trusted. An undersized buffer is not
/// rejected here; reads past its end degrade to zero-filled samples.
pub struct MemoryImage {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl MemoryImage {
    pub fn new(data: Vec<u8>, width: usize, height: usize) -> Self {
        Self {
            data,
            width,
            height,
        }
    }
}

impl ElevationImage for MemoryImage {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn stream(&self) -> Result<Box<dyn SampleStream + '_>, BilError> {
        Ok(Box::new(Cursor::new(&self.data[..])))
    }
}

/// Sample data memory-mapped from a file.
pub struct MappedImage {
    map: Mmap,
    width: usize,
    height: usize,
}

impl MappedImage {
    /// Maps the file at `path`, checking its length against the stated
    /// dimensions.
    pub fn open<P: AsRef<Path>>(path: P, width: usize, height: usize) -> Result<Self, BilError> {
        let file = File::open(&path)?;
        let map = unsafe { Mmap::map(&file)? };
        let expected = (width * height * BYTES_PER_PIXEL) as u64;
        if map.len() as u64 != expected {
            return Err(BilError::GridLen {
                path: path.as_ref().to_owned(),
                actual: map.len() as u64,
                expected,
            });
        }
        Ok(Self { map, width, height })
    }
}

impl ElevationImage for MappedImage {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn stream(&self) -> Result<Box<dyn SampleStream + '_>, BilError> {
        Ok(Box::new(Cursor::new(&self.map[..])))
    }
}
