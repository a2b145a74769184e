//! Two-buffer natural merge sort.
//!
//! The target file is sorted in place using exactly two auxiliary buffer files. A split pass scans the target and
//! distributes its maximal ascending runs of records ("series") between the buffers, alternating every time the
//! ascending order breaks. A merge pass then merges the *i*-th series of the first buffer with the *i*-th series
//! of the second one back into the target. Each split/merge cycle at least halves the number of series; the
//! target is sorted once a split pass leaves the second buffer empty.
//!
//! Buffers are token streams with one token per line: a record is stored as [`RECORD_TAG`] followed by the
//! record bytes and a series boundary is an empty line, so empty records and boundaries never collide.

use std::fs;
use std::io::{self, prelude::*};
use std::mem;
use std::path::{Path, PathBuf};

use crate::block::{self, BlockReader};
use crate::config::SortConfig;
use crate::error::{Phase, SortError};
use crate::series_reader::SeriesReader;

/// Prefix of a record token.
pub const RECORD_TAG: u8 = b'+';

/// File names of the two series buffers.
pub const BUFFER_NAMES: [&str; 2] = ["series-a", "series-b"];

/// Series buffer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Record(&'a [u8]),
    Boundary,
}

impl<'a> Token<'a> {
    /// Decodes a token from a line without its newline.
    pub fn decode(line: &'a [u8]) -> Option<Self> {
        match line.split_first() {
            None => Some(Token::Boundary),
            Some((&RECORD_TAG, record)) => Some(Token::Record(record)),
            Some(_) => None,
        }
    }

    /// Writes the token including its newline.
    pub fn encode(&self, writer: &mut impl Write) -> io::Result<()> {
        match self {
            Token::Record(record) => {
                writer.write_all(&[RECORD_TAG])?;
                writer.write_all(record)?;
                writer.write_all(b"\n")
            }
            Token::Boundary => writer.write_all(b"\n"),
        }
    }
}

/// Series distribution produced by a split pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SplitSummary {
    /// Number of series written to each buffer.
    pub series: [usize; 2],
    /// Number of records scanned.
    pub records: u64,
}

impl SplitSummary {
    /// A single ascending series spans the whole target, so the target is sorted.
    pub fn is_sorted(&self) -> bool {
        self.series[1] == 0
    }
}

/// Outcome of a complete two-buffer sort.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeriesSummary {
    /// Number of records in the target.
    pub records: u64,
    /// Number of series found by the first split pass.
    pub initial_series: usize,
    /// Number of split/merge cycles performed.
    pub cycles: usize,
}

/// Writes series alternately into the two buffers.
struct SeriesWriter<'p> {
    writers: [io::BufWriter<fs::File>; 2],
    paths: &'p [PathBuf; 2],
    active: usize,
    open: bool,
    series: [usize; 2],
}

impl<'p> SeriesWriter<'p> {
    fn create(paths: &'p [PathBuf; 2], config: &SortConfig) -> Result<Self, SortError> {
        let create = |path: &PathBuf| {
            fs::File::create(path)
                .map(|file| config.buf_writer(file))
                .map_err(|err| SortError::io(Phase::SeriesSplit, path, err))
        };

        return Ok(SeriesWriter {
            writers: [create(&paths[0])?, create(&paths[1])?],
            paths,
            active: 0,
            open: false,
            series: [0, 0],
        });
    }

    fn push(&mut self, record: &[u8]) -> Result<(), SortError> {
        if !self.open {
            self.series[self.active] += 1;
            self.open = true;
        }
        self.write(Token::Record(record))
    }

    /// Terminates the current series and switches to the other buffer.
    fn close_series(&mut self) -> Result<(), SortError> {
        self.write(Token::Boundary)?;
        self.open = false;
        self.active = 1 - self.active;

        return Ok(());
    }

    fn write(&mut self, token: Token<'_>) -> Result<(), SortError> {
        token
            .encode(&mut self.writers[self.active])
            .map_err(|err| SortError::io(Phase::SeriesSplit, &self.paths[self.active], err))
    }

    fn finish(self) -> Result<[usize; 2], SortError> {
        for (mut writer, path) in self.writers.into_iter().zip(self.paths.iter()) {
            writer.flush().map_err(|err| SortError::io(Phase::SeriesSplit, path, err))?;
        }

        return Ok(self.series);
    }
}

/// Sorts a target file in place with a natural merge over two buffer files.
///
/// Memory use is bounded by the memory limit *M*: the split pass holds one block of at most *M* bytes and the
/// merge pass holds one block of at most *M*/2 bytes per buffer.
pub struct TwoBufferSeriesMerger<'a> {
    config: &'a SortConfig,
    target: PathBuf,
    buffers: [PathBuf; 2],
}

impl<'a> TwoBufferSeriesMerger<'a> {
    /// Creates a merger for `target` keeping its buffers in `dir`.
    pub fn new(config: &'a SortConfig, dir: &Path, target: PathBuf) -> Self {
        TwoBufferSeriesMerger {
            config,
            target,
            buffers: [dir.join(BUFFER_NAMES[0]), dir.join(BUFFER_NAMES[1])],
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn buffers(&self) -> &[PathBuf; 2] {
        &self.buffers
    }

    /// Size limit of a single series reader block.
    fn reader_limit(&self) -> usize {
        self.config.memory_limit / 2
    }

    /// Runs split/merge cycles until the target consists of a single ascending series.
    pub fn sort(&self) -> Result<SeriesSummary, SortError> {
        let mut summary = SeriesSummary::default();

        loop {
            let split = self.split_increasing_series()?;
            log::debug!(
                "split pass {}: {} + {} series",
                summary.cycles,
                split.series[0],
                split.series[1]
            );

            if summary.cycles == 0 {
                summary.records = split.records;
                summary.initial_series = split.series[0] + split.series[1];
            }
            if split.is_sorted() {
                break;
            }

            self.merge_increasing_series()?;
            summary.cycles += 1;
        }

        log::info!(
            "{} records sorted in {} split/merge cycles",
            summary.records,
            summary.cycles
        );

        return Ok(summary);
    }

    /// Distributes the ascending series of the target between the two buffers.
    ///
    /// The target is scanned in record-aligned blocks of at most `memory_limit` bytes. Whenever a record is less
    /// than its predecessor a boundary is written to the active buffer and the other buffer becomes active.
    /// Both buffers are truncated first.
    pub fn split_increasing_series(&self) -> Result<SplitSummary, SortError> {
        let mut reader = BlockReader::open(&self.target, Phase::SeriesSplit, self.config.memory_limit)?;
        let mut writer = SeriesWriter::create(&self.buffers, self.config)?;
        let mut previous: Option<Vec<u8>> = None;
        let mut records = 0;

        while let Some(block) = reader.next_block()? {
            let mut offset = reader.block_offset();

            for record in block::records(&block) {
                // tag and newline must fit into a series reader block
                if record.len() + 2 > self.reader_limit() {
                    return Err(SortError::RecordTooLong {
                        phase: Phase::SeriesSplit,
                        path: self.target.clone(),
                        offset,
                        limit: self.reader_limit(),
                    });
                }

                if let Some(previous) = &previous {
                    if record < previous.as_slice() {
                        writer.close_series()?;
                    }
                }
                writer.push(record)?;

                let previous = previous.get_or_insert_with(Vec::new);
                previous.clear();
                previous.extend_from_slice(record);

                offset += record.len() as u64 + 1;
                records += 1;
            }
        }

        return Ok(SplitSummary {
            series: writer.finish()?,
            records,
        });
    }

    /// Merges the series of both buffers back into the target.
    ///
    /// Records are ordered by series index first and by value within equal indexes. A series present in one
    /// buffer only is copied as is.
    pub fn merge_increasing_series(&self) -> Result<u64, SortError> {
        let mut first = SeriesReader::open(&self.buffers[0], self.reader_limit())?;
        let mut second = SeriesReader::open(&self.buffers[1], self.reader_limit())?;

        let file =
            fs::File::create(&self.target).map_err(|err| SortError::io(Phase::SeriesMerge, &self.target, err))?;
        let mut writer = self.config.buf_writer(file);

        let mut left = first.next_record()?;
        let mut right = second.next_record()?;
        let mut records = 0;

        loop {
            let take_left = match (&left, &right) {
                (None, None) => break,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (Some(l), Some(r)) => (l.series, &l.record) <= (r.series, &r.record),
            };

            let item = if take_left {
                mem::replace(&mut left, first.next_record()?)
            } else {
                mem::replace(&mut right, second.next_record()?)
            };

            if let Some(item) = item {
                writer
                    .write_all(&item.record)
                    .and_then(|_| writer.write_all(b"\n"))
                    .map_err(|err| SortError::io(Phase::SeriesMerge, &self.target, err))?;
                records += 1;
            }
        }

        writer
            .flush()
            .map_err(|err| SortError::io(Phase::SeriesMerge, &self.target, err))?;

        return Ok(records);
    }
}

impl<'a> Drop for TwoBufferSeriesMerger<'a> {
    fn drop(&mut self) {
        for path in &self.buffers {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => log::warn!("series buffer {} not removed: {}", path.display(), err),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use rand::Rng;
    use rstest::*;

    use super::{Token, TwoBufferSeriesMerger};
    use crate::block;
    use crate::config::SortConfig;
    use crate::error::{Phase, SortError};

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    fn join(records: &[Vec<u8>]) -> Vec<u8> {
        records.iter().flat_map(|r| r.iter().chain(b"\n")).copied().collect()
    }

    /// Lengths of the maximal ascending runs of a newline-delimited file.
    fn ascending_runs(content: &[u8]) -> Vec<usize> {
        let records: Vec<&[u8]> = block::records(content).collect();
        let mut runs = Vec::new();
        for (idx, record) in records.iter().enumerate() {
            if idx == 0 || record < &records[idx - 1] {
                runs.push(0);
            }
            *runs.last_mut().unwrap() += 1;
        }
        runs
    }

    #[rstest]
    #[case(Token::Record(b"abc"), b"+abc\n".as_slice())]
    #[case(Token::Record(b""), b"+\n".as_slice())]
    #[case(Token::Boundary, b"\n".as_slice())]
    fn test_token_encoding(#[case] token: Token<'static>, #[case] encoded: &[u8]) {
        let mut buf = Vec::new();
        token.encode(&mut buf).unwrap();

        assert_eq!(buf, encoded);
        assert_eq!(Token::decode(&encoded[..encoded.len() - 1]), Some(token));
    }

    #[test]
    fn test_untagged_line_is_not_a_token() {
        assert_eq!(Token::decode(b"abc"), None);
    }

    #[rstest]
    fn test_descending_input_alternates_single_record_series(tmp_dir: tempfile::TempDir) {
        let config = SortConfig::new(16);
        let target = tmp_dir.path().join("target");
        fs::write(&target, b"h\ng\nf\ne\nd\nc\nb\na\n").unwrap();

        let merger = TwoBufferSeriesMerger::new(&config, tmp_dir.path(), target.clone());

        let split = merger.split_increasing_series().unwrap();
        assert_eq!(split.series, [4, 4]);
        assert_eq!(split.records, 8);
        assert_eq!(fs::read(&merger.buffers()[0]).unwrap(), b"+h\n\n+f\n\n+d\n\n+b\n\n");
        assert_eq!(fs::read(&merger.buffers()[1]).unwrap(), b"+g\n\n+e\n\n+c\n\n+a\n");

        assert_eq!(merger.merge_increasing_series().unwrap(), 8);
        let merged = fs::read(&target).unwrap();
        assert_eq!(merged, b"g\nh\ne\nf\nc\nd\na\nb\n");
        assert!(ascending_runs(&merged).iter().all(|len| *len >= 2));

        let split = merger.split_increasing_series().unwrap();
        assert_eq!(split.series, [2, 2]);
        merger.merge_increasing_series().unwrap();
        assert!(ascending_runs(&fs::read(&target).unwrap()).iter().all(|len| *len >= 4));
    }

    #[rstest]
    fn test_minimum_series_length_doubles(tmp_dir: tempfile::TempDir) {
        let config = SortConfig::new(32);
        let target = tmp_dir.path().join("target");
        let input: Vec<Vec<u8>> = (0..64u8).rev().map(|b| vec![b'0' + b % 10, b'a' + b / 10]).collect();
        fs::write(&target, join(&input)).unwrap();

        let merger = TwoBufferSeriesMerger::new(&config, tmp_dir.path(), target.clone());

        let mut min_run = 1;
        loop {
            if merger.split_increasing_series().unwrap().is_sorted() {
                break;
            }
            merger.merge_increasing_series().unwrap();

            let runs = ascending_runs(&fs::read(&target).unwrap());
            // the trailing series may be shorter
            let min = runs[..runs.len() - 1].iter().copied().min().unwrap_or(usize::MAX);
            assert!(min >= 2 * min_run, "runs={:?}", runs);
            min_run = min;
        }
    }

    #[rstest]
    #[case(4)]
    #[case(10)]
    #[case(33)]
    #[case(4096)]
    fn test_sort_in_place(tmp_dir: tempfile::TempDir, #[case] memory_limit: usize) {
        let mut rng = rand::thread_rng();
        let max_len = memory_limit / 2 - 2;
        let mut input: Vec<Vec<u8>> = (0..300)
            .map(|_| {
                let len = rng.gen_range(0..=max_len.min(6));
                (0..len).map(|_| rng.gen_range(b'a'..=b'e')).collect()
            })
            .collect();

        let config = SortConfig::new(memory_limit);
        let target = tmp_dir.path().join("target");
        fs::write(&target, join(&input)).unwrap();

        let merger = TwoBufferSeriesMerger::new(&config, tmp_dir.path(), target.clone());
        let summary = merger.sort().unwrap();

        input.sort();
        assert_eq!(fs::read(&target).unwrap(), join(&input));
        assert_eq!(summary.records, 300);

        drop(merger);
        assert_eq!(fs::read_dir(tmp_dir.path()).unwrap().count(), 1);
    }

    #[rstest]
    fn test_sorted_target_needs_no_cycles(tmp_dir: tempfile::TempDir) {
        let config = SortConfig::new(16);
        let target = tmp_dir.path().join("target");
        fs::write(&target, b"a\nb\nb\nc\n").unwrap();

        let merger = TwoBufferSeriesMerger::new(&config, tmp_dir.path(), target.clone());
        let summary = merger.sort().unwrap();

        assert_eq!(summary.cycles, 0);
        assert_eq!(summary.initial_series, 1);
        assert_eq!(fs::read(&target).unwrap(), b"a\nb\nb\nc\n");
    }

    #[rstest]
    fn test_record_too_long_for_series_reader(tmp_dir: tempfile::TempDir) {
        let config = SortConfig::new(16);
        let target = tmp_dir.path().join("target");
        fs::write(&target, b"b\nabcdefg\n").unwrap();

        let merger = TwoBufferSeriesMerger::new(&config, tmp_dir.path(), target);
        let result = merger.split_increasing_series();

        match result {
            Err(SortError::RecordTooLong { phase, offset, limit, .. }) => {
                assert_eq!(phase, Phase::SeriesSplit);
                assert_eq!(offset, 2);
                assert_eq!(limit, 8);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
