use crate::app::unit::Category;
use crate::connection::DriverError;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Configuration-level failures. Each one stops the run before any unit
/// executes and maps to exit code 2.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    UnknownCategory(String),
    DuplicateUnit { category: Category, name: String },
    Settings(String),
    ReportsDir { path: PathBuf, source: io::Error },
    UnsupportedDriver(String),
    Setup(String),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ReportsDir { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::UnknownCategory(name) => write!(
                f,
                "unknown suite '{}', expected one of: {}",
                name,
                Category::ALL
                    .iter()
                    .map(|c| c.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Error::DuplicateUnit { category, name } => {
                write!(f, "unit '{}' registered twice in the {} suite", name, category)
            }
            Error::Settings(reason) => write!(f, "invalid settings: {}", reason),
            Error::ReportsDir { path, source } => {
                write!(f, "reports directory {} is not writable: {}", path.display(), source)
            }
            Error::UnsupportedDriver(uri) => write!(f, "no driver available for '{}'", uri),
            Error::Setup(reason) => write!(f, "environment setup failed: {}", reason),
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Settings(e.to_string())
    }
}

impl From<DriverError> for Error {
    fn from(e: DriverError) -> Self {
        Error::Setup(e.to_string())
    }
}
