//! Input chunking.

use std::path::Path;

use crate::block::{self, BlockReader};
use crate::config::SortConfig;
use crate::error::{Phase, SortError};
use crate::run::{run_path, Run, RunWriter};

/// Sorted runs produced from the input.
#[derive(Debug, Default)]
pub struct Chunks {
    /// Sorted runs in input order.
    pub runs: Vec<Run>,
    /// Length of the longest record seen.
    pub max_record_len: usize,
    /// Total number of records.
    pub records: u64,
}

/// Splits an input file into memory-bounded, record-aligned chunks and persists each of them as a sorted run.
pub struct Chunker<'a> {
    config: &'a SortConfig,
    dir: &'a Path,
}

impl<'a> Chunker<'a> {
    /// Creates a chunker storing runs in `dir`.
    pub fn new(config: &'a SortConfig, dir: &'a Path) -> Self {
        Chunker { config, dir }
    }

    /// Reads the input in blocks of at most `memory_limit` bytes, sorts every block in memory and writes it as
    /// a run. A record that does not fit into the limit together with its newline is an error.
    pub fn split(&self, input: &Path) -> Result<Chunks, SortError> {
        let mut reader = BlockReader::open(input, Phase::Chunking, self.config.memory_limit)?;
        let mut chunks = Chunks::default();

        while let Some(block) = reader.next_block()? {
            let mut records: Vec<&[u8]> = block::records(&block).collect();

            log::debug!("sorting chunk data ...");
            records.sort_unstable();

            let path = run_path(self.dir, 0, chunks.runs.len());
            let mut writer = RunWriter::create(path, self.config, Phase::Chunking)?;
            for record in records {
                chunks.max_record_len = chunks.max_record_len.max(record.len());
                writer.push(record)?;
            }
            let run = writer.finish()?;

            log::debug!(
                "saved chunk {} ({} records, {} bytes)",
                run.path().display(),
                run.len(),
                run.bytes()
            );
            chunks.records += run.len();
            chunks.runs.push(run);
        }

        log::info!("input split into {} sorted runs", chunks.runs.len());

        return Ok(chunks);
    }
}
