//! Record-aligned block reading.
//!
//! Both the chunker and the series splitter consume files in blocks of bounded size. A block never ends in the
//! middle of a record: its right edge is snapped back to the last newline that fits into the limit.

use std::fs;
use std::io::{self, prelude::*, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{Phase, SortError};

/// Forward-only reader yielding record-aligned blocks of at most `limit` bytes.
pub struct BlockReader {
    file: fs::File,
    path: PathBuf,
    phase: Phase,
    limit: usize,
    /// Offset of the next unread byte.
    offset: u64,
    /// Offset of the last returned block.
    block_offset: u64,
    end: u64,
}

impl BlockReader {
    /// Opens a file for block reading.
    ///
    /// # Arguments
    /// * `path` - File to be read
    /// * `phase` - Sorting phase reported in errors
    /// * `limit` - Maximum block size in bytes
    pub fn open(path: &Path, phase: Phase, limit: usize) -> Result<Self, SortError> {
        let file = fs::File::open(path).map_err(|err| SortError::io(phase, path, err))?;
        let end = file.metadata().map_err(|err| SortError::io(phase, path, err))?.len();

        return Ok(BlockReader {
            file,
            path: path.to_path_buf(),
            phase,
            limit,
            offset: 0,
            block_offset: 0,
            end,
        });
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the file offset of the block returned last.
    pub fn block_offset(&self) -> u64 {
        self.block_offset
    }

    pub fn is_exhausted(&self) -> bool {
        self.offset >= self.end
    }

    /// Reads the next block. Every returned block ends with a newline except the file tail when the file is not
    /// newline-terminated. Returns [`None`] once the file is exhausted.
    pub fn next_block(&mut self) -> Result<Option<Vec<u8>>, SortError> {
        if self.is_exhausted() {
            return Ok(None);
        }

        let remaining = self.end - self.offset;
        let len = remaining.min(self.limit as u64) as usize;

        let mut block = vec![0; len];
        self.read_at(self.offset, &mut block)
            .map_err(|err| SortError::io(self.phase, &self.path, err))?;

        // an unterminated last record needs room for the newline it is given on output
        let whole_tail =
            remaining < self.limit as u64 || (remaining == len as u64 && block.last() == Some(&b'\n'));
        if !whole_tail {
            match memchr::memrchr(b'\n', &block) {
                Some(pos) => block.truncate(pos + 1),
                None => {
                    return Err(SortError::RecordTooLong {
                        phase: self.phase,
                        path: self.path.clone(),
                        offset: self.offset,
                        limit: self.limit,
                    })
                }
            }
        }

        self.block_offset = self.offset;
        self.offset += block.len() as u64;
        log::trace!(
            "read block {}..{} of {}",
            self.block_offset,
            self.offset,
            self.path.display()
        );

        return Ok(Some(block));
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)
    }
}

/// Iterator over the newline-delimited records of a record-aligned block.
pub struct Records<'a> {
    block: &'a [u8],
}

/// Splits a block into records. The trailing newline of the block does not produce an empty record, but an
/// unterminated tail does produce a record.
pub fn records(block: &[u8]) -> Records<'_> {
    Records { block }
}

impl<'a> Iterator for Records<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.block.is_empty() {
            return None;
        }

        let record = match memchr::memchr(b'\n', self.block) {
            Some(pos) => {
                let record = &self.block[..pos];
                self.block = &self.block[pos + 1..];
                record
            }
            None => std::mem::take(&mut self.block),
        };

        return Some(record);
    }
}
