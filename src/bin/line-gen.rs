use std::fs;
use std::io::{self, prelude::*};
use std::process;

use env_logger;
use log;

use ext_line_sort::generator;

fn main() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_millis()
        .init();

    let arg_parser = build_arg_parser();

    let lines_count: usize = arg_parser.value_of_t_or_exit("lines_count");
    let line_max_size: usize = arg_parser.value_of_t_or_exit("line_max_size");
    let output = arg_parser.value_of("output").expect("value has a default");

    let mut output_stream = match fs::File::create(output) {
        Ok(file) => io::BufWriter::new(file),
        Err(err) => {
            log::error!("output file creation error: {}", err);
            process::exit(1);
        }
    };

    let mut rng = rand::thread_rng();
    if let Err(err) = generator::generate(&mut output_stream, &mut rng, lines_count, line_max_size) {
        log::error!("data generation error: {}", err);
        process::exit(1);
    }

    if let Err(err) = output_stream.flush() {
        log::error!("data flushing error: {}", err);
        process::exit(1);
    }

    log::info!("{} records written to {}", lines_count, output);
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("line-gen")
        .about("random newline-delimited records generator")
        .arg(
            clap::Arg::new("lines_count")
                .short('n')
                .long("lines-count")
                .help("number of records to generate")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("line_max_size")
                .short('s')
                .long("line-max-size")
                .help("maximum record length")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("output")
                .short('o')
                .long("output")
                .help("result file")
                .takes_value(true)
                .default_value("numbers"),
        )
        .get_matches()
}
