// #![forbid(unsafe_code)]
// #![deny(non_upper_case_globals)]
// #![deny(non_camel_case_types)]
// #![deny(non_snake_case)]
// #![deny(unused_mut)]
// #![deny(unused_variables)]
// #![deny(dead_code)]
// #![deny(unused_imports)]
//#![deny(missing_docs)]
//#![deny(warnings)]

extern crate chrono;
extern crate derivative;
extern crate lazy_static;
extern crate serde_derive;
extern crate uuid;

#[macro_use]
extern crate log;

#[macro_use]
extern crate derive_builder;

#[macro_use]
mod macros;

mod app;
mod configuration;
mod connection;
mod reporter;
mod suites;
mod time;

use log::LevelFilter;
use signal_hook::{iterator::Signals, SIGINT};
use std::{ffi::OsString, path::PathBuf, process::exit, thread};
use structopt::StructOpt;

use self::app::{context::CancellationToken, registry::Registry, Runner, Selection};
use self::configuration::{
    command_line::{LogLevel, Opt},
    constants::exit_code,
    settings::Settings,
};

fn main() {
    let mut options = match parse_options(std::env::args_os()) {
        Ok(options) => options,
        Err(code) => exit(code),
    };

    if let Err(e) = init_logging(
        options.logging.take().unwrap_or(LogLevel::Info).into(),
        &options.log_output_file,
    ) {
        eprintln!("Failed to initialize logging: {}", e);
        exit(exit_code::MISCONFIGURED);
    }

    let cancel = CancellationToken::new();
    watch_signals(cancel.clone());
    let code = launch(&options, cancel);
    info!("Finished with exit code {}", code);
    exit(code);
}

/// Help and version print to stdout and map to 0; any other argument error
/// maps to 2.
fn parse_options<I>(args: I) -> Result<Opt, i32>
where
    I: IntoIterator,
    I::Item: Into<OsString> + Clone,
{
    Opt::from_iter_safe(args).map_err(|e| match e.kind {
        clap::ErrorKind::HelpDisplayed | clap::ErrorKind::VersionDisplayed => {
            println!("{}", e.message);
            exit_code::PASSED
        }
        _ => {
            eprintln!("{}", e.message);
            exit_code::MISCONFIGURED
        }
    })
}

/// Everything after argument parsing; returns the process exit code.
fn launch(options: &Opt, cancel: CancellationToken) -> i32 {
    let settings = match Settings::load(options) {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load settings: {}", e);
            return exit_code::MISCONFIGURED;
        }
    };
    debug!("Initiated configuration {:#?}", settings);

    let registry = match suites::builtin(&settings.workload) {
        Ok(registry) => registry,
        Err(e) => {
            error!("{}", e);
            return exit_code::MISCONFIGURED;
        }
    };
    if options.list {
        print_registry(&registry);
        return exit_code::PASSED;
    }

    let driver = match connection::open_driver(&settings.database) {
        Ok(driver) => driver,
        Err(e) => {
            error!("{}", e);
            return exit_code::MISCONFIGURED;
        }
    };

    let selection = Selection::from(options.suite.clone());
    Runner::new(registry, settings, driver, cancel).run(&selection).code()
}

/// Trips the run's cancellation token on SIGINT; a second signal aborts.
fn watch_signals(cancel: CancellationToken) {
    let signals = match Signals::new(&[SIGINT]) {
        Ok(signals) => signals,
        Err(e) => {
            warn!("Cannot listen for interrupts: {}", e);
            return;
        }
    };
    thread::spawn(move || {
        for sig in signals.forever() {
            if cancel.is_cancelled() {
                warn!("Received signal {:?} again, aborting", sig);
                exit(exit_code::FAILED);
            }
            info!("Received signal {:?}, finishing running units", sig);
            cancel.cancel();
        }
    });
}

fn print_registry(registry: &Registry) {
    for category in registry.categories() {
        let units = registry.get(category);
        println!("{} ({} units)", category, units.len());
        for unit in units {
            println!("  - {}", unit.name());
        }
    }
}

fn init_logging(level: LevelFilter, output: &Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let mut dispatcher = fern::Dispatch::new()
        // Perform allocation-free log formatting
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}:{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record
                    .line()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "".to_owned()),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout());

    if let Some(log_file) = output {
        dispatcher = dispatcher.chain(fern::log_file(log_file)?)
    }
    dispatcher.apply()?;
    info!("Logging level {} enabled", level);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::path::Path;

    fn parse(args: &[&str]) -> Result<Opt, i32> {
        parse_options(std::iter::once("docprobe").chain(args.iter().copied()))
    }

    fn launch_with(args: &[&str]) -> i32 {
        launch(&parse(args).unwrap(), CancellationToken::new())
    }

    fn reports_in(dir: &Path) -> String {
        dir.join("reports").to_string_lossy().into_owned()
    }

    #[test]
    fn test_help_and_version_exit_zero() {
        assert_eq!(parse(&["--help"]).err(), Some(exit_code::PASSED));
        assert_eq!(parse(&["--version"]).err(), Some(exit_code::PASSED));
    }

    #[test]
    fn test_bad_arguments_exit_two() {
        assert_eq!(parse(&["--bogus"]).err(), Some(exit_code::MISCONFIGURED));
        assert_eq!(parse(&["--timeout", "soon"]).err(), Some(exit_code::MISCONFIGURED));
        assert_eq!(parse(&["--threads", "many"]).err(), Some(exit_code::MISCONFIGURED));
    }

    #[test]
    fn test_list_exits_zero_without_running() {
        let dir = tempfile::tempdir().unwrap();
        let reports = reports_in(dir.path());
        assert_eq!(launch_with(&["--list", "-r", &reports]), exit_code::PASSED);
        assert!(!dir.path().join("reports").exists());
    }

    #[test]
    fn test_settings_errors_exit_two() {
        let dir = tempfile::tempdir().unwrap();
        let reports = reports_in(dir.path());
        let missing = dir.path().join("absent.json").to_string_lossy().into_owned();
        assert_eq!(launch_with(&["-c", &missing, "-r", &reports]), exit_code::MISCONFIGURED);
        assert_eq!(launch_with(&["-t", "0", "-r", &reports]), exit_code::MISCONFIGURED);
        assert!(!dir.path().join("reports").exists());
    }

    #[test]
    fn test_unknown_suite_exits_two() {
        let dir = tempfile::tempdir().unwrap();
        let reports = reports_in(dir.path());
        assert_eq!(
            launch_with(&["-s", "unknown_category", "-r", &reports]),
            exit_code::MISCONFIGURED
        );
        assert!(!dir.path().join("reports").exists());
    }

    #[test]
    fn test_single_suite_run_exits_zero_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let reports = reports_in(dir.path());
        assert_eq!(launch_with(&["-s", "functional", "-r", &reports]), exit_code::PASSED);
        assert_eq!(std::fs::read_dir(dir.path().join("reports")).unwrap().count(), 2);
    }
}
