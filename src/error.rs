//! Sorting errors.

use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::io;
use std::path::{Path, PathBuf};

/// Sorting phase an error originated from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Copying the input into the temporary directory.
    Staging,
    /// Splitting the input into sorted runs.
    Chunking,
    /// Merging sorted runs.
    Merging,
    /// Distributing ascending series between the two buffers.
    SeriesSplit,
    /// Merging series from the two buffers back into the target.
    SeriesMerge,
    /// Writing the sorted result.
    Output,
}

impl Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Staging => "staging",
            Phase::Chunking => "chunking",
            Phase::Merging => "merging",
            Phase::SeriesSplit => "series split",
            Phase::SeriesMerge => "series merge",
            Phase::Output => "output",
        };
        f.write_str(name)
    }
}

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Temporary directory creation error.
    TempDir(io::Error),
    /// I/O operation on a file failed.
    IO {
        phase: Phase,
        path: PathBuf,
        source: io::Error,
    },
    /// A single record does not fit into the memory limit.
    RecordTooLong {
        phase: Phase,
        path: PathBuf,
        offset: u64,
        limit: usize,
    },
    /// Record framing of a file is broken.
    CorruptInput {
        phase: Phase,
        path: PathBuf,
        offset: u64,
        reason: &'static str,
    },
    /// Configuration that can not make progress.
    DegenerateConfig(String),
}

impl SortError {
    pub(crate) fn io(phase: Phase, path: &Path, source: io::Error) -> Self {
        SortError::IO {
            phase,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Returns the phase the error originated from if it is bound to one.
    pub fn phase(&self) -> Option<Phase> {
        match &self {
            SortError::IO { phase, .. } => Some(*phase),
            SortError::RecordTooLong { phase, .. } => Some(*phase),
            SortError::CorruptInput { phase, .. } => Some(*phase),
            SortError::TempDir(_) | SortError::DegenerateConfig(_) => None,
        }
    }
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            SortError::TempDir(err) => Some(err),
            SortError::IO { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::TempDir(err) => write!(f, "temporary directory not created: {}", err),
            SortError::IO { phase, path, source } => {
                write!(f, "{}: I/O operation on {} failed: {}", phase, path.display(), source)
            }
            SortError::RecordTooLong {
                phase,
                path,
                offset,
                limit,
            } => write!(
                f,
                "{}: record at {}:{} does not fit into {} bytes",
                phase,
                path.display(),
                offset,
                limit
            ),
            SortError::CorruptInput {
                phase,
                path,
                offset,
                reason,
            } => write!(f, "{}: corrupt data at {}:{}: {}", phase, path.display(), offset, reason),
            SortError::DegenerateConfig(msg) => write!(f, "degenerate configuration: {}", msg),
        }
    }
}
