//! `ext-line-sort` sorts files of newline-delimited byte records that do not fit into memory.
//!
//! External sorting is a class of sorting algorithms that can handle massive amounts of data. External sorting
//! is required when the data being sorted do not fit into the main memory (RAM) of a computer and instead must be
//! resided in slower external memory, usually a hard disk drive. For more information see
//! [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! # Overview
//!
//! Records are opaque byte strings ordered byte-wise, one per line. Two strategies are provided, both keeping at
//! most a configured number of record bytes in memory:
//!
//! * **K-way merge** ([`MergeStrategy::KWay`]):
//!   the input is split into record-aligned chunks that fit into the memory limit, every chunk is sorted in memory
//!   and saved as a run, then runs are merged in batches with a binary heap until one run remains.
//! * **Two-buffer natural merge** ([`MergeStrategy::TwoBuffer`]):
//!   ascending series of the input are distributed between two buffer files and merged back pairwise until a
//!   single series is left. Only two auxiliary files are ever used.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use ext_line_sort::{ExternalSorterBuilder, MergeStrategy};
//!
//! fn main() {
//!     let sorter = ExternalSorterBuilder::new()
//!         .with_tmp_dir(Path::new("./"))
//!         .with_memory_limit(50 * 1024 * 1024)
//!         .with_strategy(MergeStrategy::KWay)
//!         .build()
//!         .unwrap();
//!
//!     sorter.sort_file(Path::new("input.txt"), Path::new("output.txt")).unwrap();
//! }
//! ```

pub mod block;
pub mod chunk;
pub mod config;
pub mod error;
#[cfg(feature = "generator")]
pub mod generator;
pub mod kway;
pub mod merger;
pub mod run;
pub mod series;
pub mod series_reader;
pub mod sort;

pub use block::BlockReader;
pub use chunk::Chunker;
pub use config::SortConfig;
pub use error::{Phase, SortError};
pub use kway::MergeEngine;
pub use merger::BinaryHeapMerger;
pub use run::Run;
pub use series::TwoBufferSeriesMerger;
pub use series_reader::SeriesReader;
pub use sort::{ExternalSorter, ExternalSorterBuilder, MergeStrategy, SortStats};
