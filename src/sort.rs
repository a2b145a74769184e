//! External sorter.

use log;
use std::fs;
use std::io::{self, prelude::*};
use std::path::Path;

use crate::chunk::Chunker;
use crate::config::{SortConfig, DEFAULT_MEMORY_LIMIT, MIN_MEMORY_LIMIT};
use crate::error::{Phase, SortError};
use crate::kway::MergeEngine;
use crate::series::TwoBufferSeriesMerger;

/// File name of the two-buffer strategy target inside the temporary directory.
const TARGET_FILE_NAME: &str = "target";

/// Strategy used to merge sorted data into the final output.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Memory-bounded chunks merged by a batched k-way heap merge.
    KWay,
    /// Natural merge in place using two series buffer files.
    TwoBuffer,
}

impl Default for MergeStrategy {
    fn default() -> Self {
        MergeStrategy::KWay
    }
}

/// Sorting statistics.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SortStats {
    /// Number of input records.
    pub records: u64,
    /// Number of initial sorted runs: chunks for the k-way strategy, ascending series for the two-buffer one.
    pub runs: usize,
    /// Number of merge levels (k-way) or split/merge cycles (two-buffer).
    pub passes: usize,
}

/// External sorter builder. Provides methods for [`ExternalSorter`] initialization.
#[derive(Clone)]
pub struct ExternalSorterBuilder {
    /// Directory to be used to store temporary data.
    tmp_dir: Option<Box<Path>>,
    /// Sorting limits.
    config: SortConfig,
    /// Merge strategy.
    strategy: MergeStrategy,
}

impl ExternalSorterBuilder {
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        ExternalSorterBuilder::default()
    }

    /// Builds an [`ExternalSorter`] instance using provided configuration.
    pub fn build(self) -> Result<ExternalSorter, SortError> {
        ExternalSorter::new(self.tmp_dir.as_deref(), self.config, self.strategy)
    }

    /// Sets directory to be used to store temporary data.
    pub fn with_tmp_dir(mut self, path: &Path) -> ExternalSorterBuilder {
        self.tmp_dir = Some(path.into());
        return self;
    }

    /// Sets the maximum number of record bytes kept in memory.
    pub fn with_memory_limit(mut self, memory_limit: usize) -> ExternalSorterBuilder {
        self.config.memory_limit = memory_limit;
        return self;
    }

    /// Caps the number of runs merged at once.
    pub fn with_max_fan_in(mut self, max_fan_in: usize) -> ExternalSorterBuilder {
        self.config.max_fan_in = Some(max_fan_in);
        return self;
    }

    /// Sets run file read/write buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: usize) -> ExternalSorterBuilder {
        self.config.rw_buf_size = Some(buf_size);
        return self;
    }

    /// Sets merge strategy.
    pub fn with_strategy(mut self, strategy: MergeStrategy) -> ExternalSorterBuilder {
        self.strategy = strategy;
        return self;
    }
}

impl Default for ExternalSorterBuilder {
    fn default() -> Self {
        ExternalSorterBuilder {
            tmp_dir: None,
            config: SortConfig::new(DEFAULT_MEMORY_LIMIT),
            strategy: MergeStrategy::default(),
        }
    }
}

/// External sorter of newline-delimited byte records.
///
/// Records are ordered by raw byte-wise comparison. Equal records keep their multiplicity, but not necessarily
/// their relative input order.
///
/// The output does not depend on the memory limit *M* or the strategy as long as *M* is large enough for the
/// longest record of length *L*:
/// * [`MergeStrategy::KWay`] needs `M >= L + 1` to split the input and `M >= 2 * (L + 1)` once there is more
///   than one run to merge, otherwise sorting fails with [`SortError::DegenerateConfig`];
/// * [`MergeStrategy::TwoBuffer`] needs `M / 2 >= L + 2` since a series buffer record is tagged, otherwise
///   sorting fails with [`SortError::RecordTooLong`].
pub struct ExternalSorter {
    /// Directory to be used to store temporary data.
    tmp_dir: tempfile::TempDir,
    /// Sorting limits.
    config: SortConfig,
    /// Merge strategy.
    strategy: MergeStrategy,
}

impl ExternalSorter {
    /// Creates a new external sorter instance.
    ///
    /// # Arguments
    /// * `tmp_path` - Directory to be used to store temporary data. If paramater is [`None`] default OS temporary
    ///   directory will be used.
    /// * `config` - Sorting limits.
    /// * `strategy` - Merge strategy.
    pub fn new(tmp_path: Option<&Path>, config: SortConfig, strategy: MergeStrategy) -> Result<Self, SortError> {
        Self::validate_config(&config)?;

        return Ok(ExternalSorter {
            tmp_dir: Self::init_tmp_directory(tmp_path)?,
            config,
            strategy,
        });
    }

    fn validate_config(config: &SortConfig) -> Result<(), SortError> {
        if config.memory_limit < MIN_MEMORY_LIMIT {
            return Err(SortError::DegenerateConfig(format!(
                "memory limit of {} bytes is below the minimum of {} bytes",
                config.memory_limit, MIN_MEMORY_LIMIT
            )));
        }
        if let Some(fan_in) = config.max_fan_in {
            if fan_in < 2 {
                return Err(SortError::DegenerateConfig(format!(
                    "merge fan-in of {} can not reduce the number of runs",
                    fan_in
                )));
            }
        }

        return Ok(());
    }

    fn init_tmp_directory(tmp_path: Option<&Path>) -> Result<tempfile::TempDir, SortError> {
        let tmp_dir = if let Some(tmp_path) = tmp_path {
            tempfile::tempdir_in(tmp_path)
        } else {
            tempfile::tempdir()
        }
        .map_err(|err| SortError::TempDir(err))?;

        log::info!("using {} as a temporary directory", tmp_dir.path().display());

        return Ok(tmp_dir);
    }

    pub fn config(&self) -> &SortConfig {
        &self.config
    }

    pub fn strategy(&self) -> MergeStrategy {
        self.strategy
    }

    /// Sorts the records of `input` into `output`.
    ///
    /// # Arguments
    /// * `input` - File to be sorted
    /// * `output` - Result file, created or truncated
    pub fn sort_file(&self, input: &Path, output: &Path) -> Result<SortStats, SortError> {
        log::info!(
            "sorting {} (memory limit: {} bytes, strategy: {:?})",
            input.display(),
            self.config.memory_limit,
            self.strategy
        );

        let stats = match self.strategy {
            MergeStrategy::KWay => self.sort_kway(input, output)?,
            MergeStrategy::TwoBuffer => self.sort_two_buffer(input, output)?,
        };

        log::info!(
            "{} records sorted into {} ({} initial runs, {} passes)",
            stats.records,
            output.display(),
            stats.runs,
            stats.passes
        );

        return Ok(stats);
    }

    fn sort_kway(&self, input: &Path, output: &Path) -> Result<SortStats, SortError> {
        let chunks = Chunker::new(&self.config, self.tmp_dir.path()).split(input)?;
        let mut stats = SortStats {
            records: chunks.records,
            runs: chunks.runs.len(),
            passes: 0,
        };

        log::debug!("external sort preparation done");

        let mut engine = MergeEngine::new(&self.config, self.tmp_dir.path(), chunks.max_record_len);
        let merged = engine.merge(chunks.runs)?;
        stats.passes = engine.levels();

        copy_file(merged.as_ref().map(|run| run.path()), output)?;

        return Ok(stats);
    }

    fn sort_two_buffer(&self, input: &Path, output: &Path) -> Result<SortStats, SortError> {
        let target = self.tmp_dir.path().join(TARGET_FILE_NAME);
        // a failed copy may leave a partial target behind, it is removed as well
        let result = fs::copy(input, &target)
            .map_err(|err| SortError::io(Phase::Staging, input, err))
            .and_then(|_| self.sort_target(&target, output));
        match fs::remove_file(&target) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => log::warn!("target {} not removed: {}", target.display(), err),
        }

        return result;
    }

    fn sort_target(&self, target: &Path, output: &Path) -> Result<SortStats, SortError> {
        let merger = TwoBufferSeriesMerger::new(&self.config, self.tmp_dir.path(), target.to_path_buf());
        let summary = merger.sort()?;

        copy_file(Some(target), output)?;

        return Ok(SortStats {
            records: summary.records,
            runs: summary.initial_series,
            passes: summary.cycles,
        });
    }
}

/// Copies `source` into `output`; a missing source produces an empty output.
/// The output is newline-terminated even if the last record of the source is not.
fn copy_file(source: Option<&Path>, output: &Path) -> Result<(), SortError> {
    let mut writer = io::BufWriter::new(
        fs::File::create(output).map_err(|err| SortError::io(Phase::Output, output, err))?,
    );

    if let Some(source) = source {
        let mut reader = fs::File::open(source).map_err(|err| SortError::io(Phase::Output, source, err))?;
        io::copy(&mut reader, &mut writer).map_err(|err| SortError::io(Phase::Output, output, err))?;

        let last = last_byte(&mut reader).map_err(|err| SortError::io(Phase::Output, source, err))?;
        if !matches!(last, None | Some(b'\n')) {
            writer
                .write_all(b"\n")
                .map_err(|err| SortError::io(Phase::Output, output, err))?;
        }
    }

    writer.flush().map_err(|err| SortError::io(Phase::Output, output, err))?;

    return Ok(());
}

/// Returns the last byte of a file or [`None`] if the file is empty.
fn last_byte(file: &mut fs::File) -> io::Result<Option<u8>> {
    if file.metadata()?.len() == 0 {
        return Ok(None);
    }

    let mut byte = [0u8; 1];
    file.seek(io::SeekFrom::End(-1))?;
    file.read_exact(&mut byte)?;

    return Ok(Some(byte[0]));
}
