use std::path;
use std::process;

use bytesize::ByteSize;
use clap::ArgEnum;
use env_logger;
use log;

use ext_line_sort::{ExternalSorterBuilder, MergeStrategy};

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    let strategy: Strategy = arg_parser.value_of_t_or_exit("strategy");
    let tmp_dir: Option<&str> = arg_parser.value_of("tmp_dir");
    let memory = arg_parser.value_of("memory").expect("value is required");
    let fan_in: Option<usize> = arg_parser
        .is_present("fan_in")
        .then(|| arg_parser.value_of_t_or_exit("fan_in"));
    let rw_buf_size: Option<ByteSize> = arg_parser
        .is_present("rw_buf_size")
        .then(|| arg_parser.value_of_t_or_exit("rw_buf_size"));

    let input = arg_parser.value_of("input").expect("value is required");
    let output = arg_parser.value_of("output").expect("value is required");

    let memory_limit = match usize::try_from(memory.parse::<ByteSize>().expect("value is pre-validated").as_u64()) {
        Ok(memory_limit) => memory_limit,
        Err(err) => {
            log::error!("memory limit is out of range: {}", err);
            process::exit(1);
        }
    };

    let mut sorter_builder = ExternalSorterBuilder::new()
        .with_memory_limit(memory_limit)
        .with_strategy(match strategy {
            Strategy::Kway => MergeStrategy::KWay,
            Strategy::Series => MergeStrategy::TwoBuffer,
        });

    if let Some(fan_in) = fan_in {
        sorter_builder = sorter_builder.with_max_fan_in(fan_in);
    }

    if let Some(rw_buf_size) = rw_buf_size {
        sorter_builder = sorter_builder.with_rw_buf_size(rw_buf_size.as_u64() as usize);
    }

    if let Some(tmp_dir) = tmp_dir {
        sorter_builder = sorter_builder.with_tmp_dir(path::Path::new(tmp_dir));
    }

    let sorter = match sorter_builder.build() {
        Ok(sorter) => sorter,
        Err(err) => {
            log::error!("sorter initialization error: {}", err);
            process::exit(1);
        }
    };

    if let Err(err) = sorter.sort_file(path::Path::new(input), path::Path::new(output)) {
        log::error!("data sorting error: {}", err);
        process::exit(1);
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum Strategy {
    Kway,
    Series,
}

impl Strategy {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Strategy::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Strategy as clap::ArgEnum>::from_str(s, false)
    }
}

fn validate_size(v: &str) -> Result<(), String> {
    match v.parse::<ByteSize>() {
        Ok(_) => Ok(()),
        Err(err) => Err(format!("size format incorrect: {}", err)),
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("ext-line-sort")
        .about("external sorter of newline-delimited records")
        .arg(
            clap::Arg::new("input")
                .short('i')
                .long("input")
                .help("file to be sorted")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("output")
                .short('o')
                .long("output")
                .help("result file")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("strategy")
                .short('s')
                .long("strategy")
                .help("merge strategy")
                .takes_value(true)
                .default_value("kway")
                .possible_values(Strategy::possible_values()),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .arg(
            clap::Arg::new("fan_in")
                .short('f')
                .long("fan-in")
                .help("maximum number of runs merged at once")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("tmp_dir")
                .short('d')
                .long("tmp-dir")
                .help("directory to be used to store temporary data")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("rw_buf_size")
                .short('b')
                .long("rw-buf-size")
                .help("temporary file read/write buffer size")
                .takes_value(true)
                .validator(validate_size),
        )
        .arg(
            clap::Arg::new("memory")
                .short('m')
                .long("memory")
                .help("maximum number of record bytes kept in memory")
                .required(true)
                .takes_value(true)
                .validator(validate_size),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}
