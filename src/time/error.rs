use std::fmt;

/// An error that occurred while parsing a human readable duration.
#[derive(Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    Syntax(String),
    UnitNotSupported(String),
    Overflow(String),
}

impl ::std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Syntax(ref input) => write!(f, "'{}' is not a valid duration", input),
            Error::UnitNotSupported(ref unit) => write!(f, "unit '{}' not supported", unit),
            Error::Overflow(ref input) => write!(f, "duration '{}' is out of range", input),
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Syntax(ref input) => write!(f, "Syntax({:?})", input),
            Error::UnitNotSupported(ref unit) => write!(f, "UnitNotSupported({:?})", unit),
            Error::Overflow(ref input) => write!(f, "Overflow({:?})", input),
        }
    }
}
