//! Batched k-way merge of sorted runs.

use std::path::Path;

use crate::config::SortConfig;
use crate::error::{Phase, SortError};
use crate::merger::BinaryHeapMerger;
use crate::run::{run_path, Run, RunReader, RunWriter};

/// Computes the number of runs merged in one batch so that one buffered record per open run never exceeds the
/// memory limit.
///
/// A batch must merge at least two runs, so merging needs a memory limit of at least `2 * (max_record_len + 1)`
/// bytes; a smaller limit is reported as [`SortError::DegenerateConfig`].
///
/// # Arguments
/// * `config` - Sorting configuration
/// * `max_record_len` - Length of the longest record to be merged (without its newline)
pub fn batch_size(config: &SortConfig, max_record_len: usize) -> Result<usize, SortError> {
    // every buffered record carries its newline
    let derived = config.memory_limit / (max_record_len + 1);
    let batch_size = match config.max_fan_in {
        Some(fan_in) => derived.min(fan_in),
        None => derived,
    };

    if batch_size < 2 {
        return Err(SortError::DegenerateConfig(format!(
            "memory limit of {} bytes fits {} record(s) of {} bytes, at least 2 runs must be merged at once",
            config.memory_limit, batch_size, max_record_len
        )));
    }

    return Ok(batch_size);
}

/// Merges sorted runs level by level until a single run remains.
///
/// Every level partitions the runs into consecutive batches of at most *B* runs and merges each batch with a
/// [`BinaryHeapMerger`]. A level produces ⌈*n* / *B*⌉ runs out of *n*, so ⌈log*B*(*n*)⌉ levels are needed.
/// At most *B* run files are open and at most *B* records are buffered at any time.
pub struct MergeEngine<'a> {
    config: &'a SortConfig,
    dir: &'a Path,
    max_record_len: usize,
    levels: usize,
}

impl<'a> MergeEngine<'a> {
    /// Creates a merge engine writing intermediate runs to `dir`.
    ///
    /// # Arguments
    /// * `config` - Sorting configuration
    /// * `dir` - Directory for intermediate runs
    /// * `max_record_len` - Length of the longest record in the runs to be merged
    pub fn new(config: &'a SortConfig, dir: &'a Path, max_record_len: usize) -> Self {
        MergeEngine {
            config,
            dir,
            max_record_len,
            levels: 0,
        }
    }

    /// Returns the number of merge levels performed so far.
    pub fn levels(&self) -> usize {
        self.levels
    }

    /// Merges `runs` into a single sorted run. Returns [`None`] if there is nothing to merge.
    /// Input runs are removed as soon as they are consumed.
    pub fn merge(&mut self, mut runs: Vec<Run>) -> Result<Option<Run>, SortError> {
        if runs.len() <= 1 {
            return Ok(runs.pop());
        }

        let batch_size = batch_size(self.config, self.max_record_len)?;
        log::info!("merging {} runs in batches of {}", runs.len(), batch_size);

        while runs.len() > 1 {
            self.levels += 1;
            let level = self.levels;
            log::debug!("merge level {}: {} runs", level, runs.len());

            let mut merged = Vec::with_capacity((runs.len() + batch_size - 1) / batch_size);
            let mut pending = runs.into_iter().peekable();
            while pending.peek().is_some() {
                let batch = Vec::from_iter(pending.by_ref().take(batch_size));
                if batch.len() == 1 {
                    // a lone trailing run is already sorted, it is carried over to the next level as is
                    merged.extend(batch);
                    continue;
                }
                let run = self.merge_batch(level, merged.len(), batch)?;
                merged.push(run);
            }
            runs = merged;
        }

        return Ok(runs.pop());
    }

    fn merge_batch(&self, level: usize, index: usize, batch: Vec<Run>) -> Result<Run, SortError> {
        log::trace!("merging batch {} of level {} ({} runs)", index, level, batch.len());

        let readers = batch
            .into_iter()
            .map(|run| run.open(self.config))
            .collect::<Result<Vec<RunReader>, SortError>>()?;

        let mut writer = RunWriter::create(run_path(self.dir, level, index), self.config, Phase::Merging)?;
        for record in BinaryHeapMerger::new(readers) {
            writer.push(&record?)?;
        }

        return writer.finish();
    }
}
