//! Bounded-memory series reader.

use std::path::Path;

use crate::block::BlockReader;
use crate::error::{Phase, SortError};
use crate::series::Token;

/// Record read from a series buffer together with the index of the series it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesRecord {
    pub series: usize,
    pub record: Vec<u8>,
}

/// Forward-only cursor over a series buffer file.
///
/// The file is consumed in record-aligned blocks of at most `limit` bytes, so at most one block is resident.
/// The series index starts at zero and is incremented once per run of boundary markers found between two
/// records; consecutive markers never produce empty series.
pub struct SeriesReader {
    blocks: BlockReader,
    block: Vec<u8>,
    pos: usize,
    series: usize,
    started: bool,
    crossed: bool,
}

impl SeriesReader {
    /// Opens a series buffer.
    ///
    /// # Arguments
    /// * `path` - Series buffer file
    /// * `limit` - Maximum number of bytes kept in memory
    pub fn open(path: &Path, limit: usize) -> Result<Self, SortError> {
        return Ok(SeriesReader {
            blocks: BlockReader::open(path, Phase::SeriesMerge, limit)?,
            block: Vec::new(),
            pos: 0,
            series: 0,
            started: false,
            crossed: false,
        });
    }

    /// Returns the next record or [`None`] when both the file and the cached block are exhausted.
    pub fn next_record(&mut self) -> Result<Option<SeriesRecord>, SortError> {
        loop {
            if self.pos >= self.block.len() {
                match self.blocks.next_block()? {
                    Some(block) => {
                        self.block = block;
                        self.pos = 0;
                    }
                    None => return Ok(None),
                }
            }

            let offset = self.blocks.block_offset() + self.pos as u64;
            let rest = &self.block[self.pos..];
            let line = match memchr::memchr(b'\n', rest) {
                Some(end) => &rest[..end],
                None => return Err(self.corrupt(offset, "series token is not newline-terminated")),
            };
            self.pos += line.len() + 1;

            match Token::decode(line) {
                Some(Token::Boundary) => {
                    if self.started {
                        self.crossed = true;
                    }
                }
                Some(Token::Record(record)) => {
                    if self.crossed {
                        self.series += 1;
                        self.crossed = false;
                    }
                    self.started = true;

                    return Ok(Some(SeriesRecord {
                        series: self.series,
                        record: record.to_vec(),
                    }));
                }
                None => return Err(self.corrupt(offset, "series token is neither a record nor a boundary")),
            }
        }
    }

    fn corrupt(&self, offset: u64, reason: &'static str) -> SortError {
        SortError::CorruptInput {
            phase: Phase::SeriesMerge,
            path: self.blocks.path().to_path_buf(),
            offset,
            reason,
        }
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use rstest::*;

    use super::{SeriesReader, SeriesRecord};
    use crate::error::SortError;

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    fn read_all(tmp_dir: &tempfile::TempDir, content: &[u8], limit: usize) -> Result<Vec<(usize, Vec<u8>)>, SortError> {
        let path = tmp_dir.path().join("series");
        fs::write(&path, content).unwrap();

        let mut reader = SeriesReader::open(&path, limit)?;
        let mut records = Vec::new();
        while let Some(SeriesRecord { series, record }) = reader.next_record()? {
            records.push((series, record));
        }
        return Ok(records);
    }

    #[rstest]
    #[case(b"", vec![])]
    #[case(b"+a\n+b\n", vec![(0, b"a".to_vec()), (0, b"b".to_vec())])]
    #[case(
        b"+b\n\n+a\n+c\n\n+a\n",
        vec![(0, b"b".to_vec()), (1, b"a".to_vec()), (1, b"c".to_vec()), (2, b"a".to_vec())],
    )]
    #[case(b"+b\n\n\n\n+a\n", vec![(0, b"b".to_vec()), (1, b"a".to_vec())])]
    #[case(b"\n+a\n\n", vec![(0, b"a".to_vec())])]
    #[case(b"+\n\n+\n", vec![(0, b"".to_vec()), (1, b"".to_vec())])]
    fn test_series_index(
        tmp_dir: tempfile::TempDir,
        #[case] content: &[u8],
        #[case] expected: Vec<(usize, Vec<u8>)>,
        #[values(4, 8, 1024)] limit: usize,
    ) {
        assert_eq!(read_all(&tmp_dir, content, limit).unwrap(), expected);
    }

    #[rstest]
    fn test_block_reload_keeps_series_index(tmp_dir: tempfile::TempDir) {
        let content = b"+abc\n+abd\n\n+aaa\n+zzz\n\n+b\n";
        let records = read_all(&tmp_dir, content, 6).unwrap();

        assert_eq!(
            records,
            vec![
                (0, b"abc".to_vec()),
                (0, b"abd".to_vec()),
                (1, b"aaa".to_vec()),
                (1, b"zzz".to_vec()),
                (2, b"b".to_vec()),
            ]
        );
    }

    #[rstest]
    #[case(b"+a\nb\n".as_slice(), 3)]
    #[case(b"+a\n+b".as_slice(), 3)]
    fn test_corrupt_token(tmp_dir: tempfile::TempDir, #[case] content: &[u8], #[case] expected_offset: u64) {
        match read_all(&tmp_dir, content, 16) {
            Err(SortError::CorruptInput { offset, .. }) => assert_eq!(offset, expected_offset),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[rstest]
    fn test_token_larger_than_limit(tmp_dir: tempfile::TempDir) {
        assert!(matches!(
            read_all(&tmp_dir, b"+a\n+abcdef\n+b\n", 4),
            Err(SortError::RecordTooLong { offset: 3, .. })
        ));
    }
}
