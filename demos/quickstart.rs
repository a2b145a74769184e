use std::fs;
use std::io::{self, prelude::*};
use std::path;

use bytesize::KB;
use env_logger;
use log;

use ext_line_sort::{ExternalSorterBuilder, MergeStrategy};

fn main() {
    env_logger::Builder::new().filter_level(log::LevelFilter::Debug).init();

    let mut input_writer = io::BufWriter::new(fs::File::create("input.txt").unwrap());
    for word in ["cherry", "apple", "banana", "fig", "date", "elderberry", "grape"].iter().cycle().take(1000) {
        input_writer.write_all(format!("{}\n", word).as_bytes()).unwrap();
    }
    input_writer.flush().unwrap();

    for (strategy, output) in [
        (MergeStrategy::KWay, "output-kway.txt"),
        (MergeStrategy::TwoBuffer, "output-series.txt"),
    ] {
        let sorter = ExternalSorterBuilder::new()
            .with_tmp_dir(path::Path::new("./"))
            .with_memory_limit(KB as usize)
            .with_strategy(strategy)
            .build()
            .unwrap();

        let stats = sorter.sort_file(path::Path::new("input.txt"), path::Path::new(output)).unwrap();
        println!("{:?}: {:?}", strategy, stats);
    }
}
