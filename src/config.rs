//! Sorting limits.

use std::fs;
use std::io;

/// Default number of record bytes kept in memory at once.
pub const DEFAULT_MEMORY_LIMIT: usize = 64 * 1024 * 1024;

/// The smallest memory limit the two-buffer strategy can work with:
/// half of it must hold a tagged empty record.
pub const MIN_MEMORY_LIMIT: usize = 4;

/// Sorting configuration shared by all sorting phases.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortConfig {
    /// Maximum number of record bytes resident in memory at once.
    pub memory_limit: usize,
    /// Upper bound of the number of runs merged in one batch.
    pub max_fan_in: Option<usize>,
    /// Run file read/write buffer size.
    pub rw_buf_size: Option<usize>,
}

impl SortConfig {
    pub fn new(memory_limit: usize) -> Self {
        SortConfig {
            memory_limit,
            max_fan_in: None,
            rw_buf_size: None,
        }
    }

    pub(crate) fn buf_writer(&self, file: fs::File) -> io::BufWriter<fs::File> {
        match self.rw_buf_size {
            Some(buf_size) => io::BufWriter::with_capacity(buf_size, file),
            None => io::BufWriter::new(file),
        }
    }

    pub(crate) fn buf_reader(&self, file: fs::File) -> io::BufReader<fs::File> {
        match self.rw_buf_size {
            Some(buf_size) => io::BufReader::with_capacity(buf_size, file),
            None => io::BufReader::new(file),
        }
    }
}

impl Default for SortConfig {
    fn default() -> Self {
        SortConfig::new(DEFAULT_MEMORY_LIMIT)
    }
}
