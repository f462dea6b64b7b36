use crate::configuration::constants::cargo_env::CARGO_PKG_NAME;
use crate::time::timeunit::parse_duration;
use clap::arg_enum;
use log::LevelFilter;
use std::path::PathBuf;
use std::time::Duration;
use structopt::StructOpt;

arg_enum! {
    #[derive(Debug)]
    pub enum LogLevel {
        Off, Error, Warn, Info, Debug, Trace,
    }
}

#[derive(StructOpt, Debug, Default)]
#[structopt(name = CARGO_PKG_NAME, about = "Runs the database QA suites and writes JSON reports")]
pub struct Opt {
    /// Suite to run: functional, performance, security or validation. Runs all when omitted
    #[structopt(long, short = "s")]
    pub suite: Option<String>,

    /// Settings file. Supported: YAML, JSON, TOML, HJSON
    #[structopt(long, short = "c", parse(from_os_str))]
    pub config: Option<PathBuf>,

    /// Sets a logging level
    #[structopt(case_insensitive = true, long, short = "L", possible_values = &LogLevel::variants(), env = "LOG_LEVEL")]
    pub logging: Option<LogLevel>,

    /// File to which application will write logs
    #[structopt(long, short = "O", env = "LOG_OUTPUT_FILE", parse(from_os_str))]
    pub log_output_file: Option<PathBuf>,

    /// Amount of parallel workers for the performance suite
    #[structopt(long, short = "t")]
    pub threads: Option<usize>,

    /// Per-unit timeout, e.g. 500ms, 30s, 2m
    #[structopt(long, parse(try_from_str = parse_duration))]
    pub timeout: Option<Duration>,

    /// Directory the JSON reports are written to
    #[structopt(long, short = "r", parse(from_os_str))]
    pub reports_dir: Option<PathBuf>,

    /// Do not ping the database before running
    #[structopt(long)]
    pub skip_setup: bool,

    /// Load a JSON dataset ({"collection": [documents]}) before running
    #[structopt(long, parse(from_os_str))]
    pub load_data: Option<PathBuf>,

    /// List the registered suites and units, then exit
    #[structopt(long)]
    pub list: bool,
}

impl Into<LevelFilter> for LogLevel {
    fn into(self) -> LevelFilter {
        match self {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(args: &[&str]) -> Result<Opt, clap::Error> {
        Opt::from_iter_safe(std::iter::once(CARGO_PKG_NAME).chain(args.iter().copied()))
    }

    #[test]
    fn test_no_arguments_selects_everything() {
        let opt = parse(&[]).unwrap();
        assert!(opt.suite.is_none());
        assert!(!opt.skip_setup);
    }

    #[test]
    fn test_suite_is_taken_verbatim() {
        let opt = parse(&["--suite", "unknown_category"]).unwrap();
        assert_eq!(opt.suite.as_deref(), Some("unknown_category"));
    }

    #[test]
    fn test_overrides() {
        let opt = parse(&["-t", "4", "--timeout", "250ms", "-r", "out", "--skip-setup"]).unwrap();
        assert_eq!(opt.threads, Some(4));
        assert_eq!(opt.timeout, Some(Duration::from_millis(250)));
        assert_eq!(opt.reports_dir, Some(PathBuf::from("out")));
        assert!(opt.skip_setup);
    }

    #[test]
    fn test_help_and_bad_input_are_errors_for_the_caller() {
        let help = parse(&["--help"]).unwrap_err();
        assert_eq!(help.kind, clap::ErrorKind::HelpDisplayed);
        assert!(parse(&["--timeout", "soon"]).is_err());
        assert!(parse(&["--bogus"]).is_err());
    }
}
