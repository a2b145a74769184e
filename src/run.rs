//! Sorted run files.
//!
//! A run is a temporary file holding newline-terminated records in non-decreasing order. Runs are owned
//! values: dropping a [`Run`] (or the writer or reader holding it) removes the file, so runs never outlive the
//! phase that consumes them, whether it finishes or aborts.

use std::fs;
use std::io::{self, prelude::*};
use std::path::{Path, PathBuf};

use crate::config::SortConfig;
use crate::error::{Phase, SortError};

/// Returns a deterministic run file path for the run `index` of the merge `level`.
/// Level 0 holds the runs produced by the chunker.
pub fn run_path(dir: &Path, level: usize, index: usize) -> PathBuf {
    dir.join(format!("run-{:03}-{:06}", level, index))
}

/// Sorted run stored on the file system.
#[derive(Debug)]
pub struct Run {
    path: PathBuf,
    records: u64,
    bytes: u64,
}

impl Run {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of records in the run.
    pub fn len(&self) -> u64 {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Returns the run file size in bytes.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Opens the run for reading. The file is removed once the returned reader is dropped.
    pub fn open(self, config: &SortConfig) -> Result<RunReader, SortError> {
        let file = fs::File::open(&self.path).map_err(|err| SortError::io(Phase::Merging, &self.path, err))?;

        return Ok(RunReader {
            reader: config.buf_reader(file),
            offset: 0,
            run: self,
        });
    }
}

impl Drop for Run {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => log::trace!("run {} removed", self.path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => log::warn!("run {} not removed: {}", self.path.display(), err),
        }
    }
}

/// Run file writer.
pub struct RunWriter {
    writer: io::BufWriter<fs::File>,
    phase: Phase,
    run: Run,
}

impl RunWriter {
    /// Creates a new run file at `path`, truncating an existing one.
    pub fn create(path: PathBuf, config: &SortConfig, phase: Phase) -> Result<Self, SortError> {
        let file = fs::File::create(&path).map_err(|err| SortError::io(phase, &path, err))?;

        return Ok(RunWriter {
            writer: config.buf_writer(file),
            phase,
            run: Run {
                path,
                records: 0,
                bytes: 0,
            },
        });
    }

    /// Appends a record. Records must be pushed in non-decreasing order.
    pub fn push(&mut self, record: &[u8]) -> Result<(), SortError> {
        self.writer
            .write_all(record)
            .and_then(|_| self.writer.write_all(b"\n"))
            .map_err(|err| SortError::io(self.phase, &self.run.path, err))?;

        self.run.records += 1;
        self.run.bytes += record.len() as u64 + 1;

        return Ok(());
    }

    /// Flushes the written records and returns the finished run.
    pub fn finish(self) -> Result<Run, SortError> {
        let RunWriter { mut writer, phase, run } = self;
        writer.flush().map_err(|err| SortError::io(phase, &run.path, err))?;

        return Ok(run);
    }
}

/// Forward cursor over the records of a run.
pub struct RunReader {
    reader: io::BufReader<fs::File>,
    offset: u64,
    run: Run,
}

impl RunReader {
    pub fn path(&self) -> &Path {
        self.run.path()
    }
}

impl Iterator for RunReader {
    type Item = Result<Vec<u8>, SortError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut record = Vec::new();
        match self.reader.read_until(b'\n', &mut record) {
            Ok(0) => None,
            Ok(read) => {
                let offset = self.offset;
                self.offset += read as u64;
                if record.pop() != Some(b'\n') {
                    return Some(Err(SortError::CorruptInput {
                        phase: Phase::Merging,
                        path: self.run.path.clone(),
                        offset,
                        reason: "run record is not newline-terminated",
                    }));
                }
                Some(Ok(record))
            }
            Err(err) => Some(Err(SortError::io(Phase::Merging, &self.run.path, err))),
        }
    }
}
