pub mod memory;
pub mod pool;
pub mod query;

use crate::app::error::Error;
use crate::configuration::settings::DatabaseSettings;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

pub use self::query::{Change, Filter, Predicate, Rule, Schema};

pub type Document = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Read,
    ReadWrite,
    Admin,
}

impl Role {
    pub fn can_write(self) -> bool {
        self != Role::Read
    }
}

#[derive(Debug, Clone)]
pub enum Command {
    CreateCollection {
        collection: String,
        validator: Option<Schema>,
    },
    Drop {
        collection: String,
    },
    Insert {
        collection: String,
        documents: Vec<Document>,
    },
    Find {
        collection: String,
        filter: Filter,
        limit: Option<usize>,
    },
    Update {
        collection: String,
        filter: Filter,
        changes: Vec<Change>,
        many: bool,
    },
    Delete {
        collection: String,
        filter: Filter,
    },
    Count {
        collection: String,
        filter: Filter,
    },
    CreateIndex {
        collection: String,
        field: String,
        unique: bool,
    },
    CreateUser {
        user: String,
        password: String,
        role: Role,
    },
    DropUser {
        user: String,
    },
    Authenticate {
        user: String,
        password: String,
    },
}

impl Command {
    pub fn is_write(&self) -> bool {
        !matches!(
            self,
            Command::Find { .. } | Command::Count { .. } | Command::Authenticate { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Ack,
    Inserted(Vec<Value>),
    Documents(Vec<Document>),
    Modified(usize),
    Deleted(usize),
    Count(usize),
    Authenticated(Role),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DriverError {
    Connection(String),
    Closed,
    Unauthorized(String),
    Rejected(String),
    UnexpectedReply(&'static str),
}

impl std::error::Error for DriverError {}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DriverError::Connection(reason) => write!(f, "connection failed: {}", reason),
            DriverError::Closed => write!(f, "session is closed"),
            DriverError::Unauthorized(reason) => write!(f, "unauthorized: {}", reason),
            DriverError::Rejected(reason) => write!(f, "rejected by server: {}", reason),
            DriverError::UnexpectedReply(expected) => {
                write!(f, "unexpected reply, expected {}", expected)
            }
        }
    }
}

/// Opens sessions against one database deployment.
///
/// The only implementation shipped is the in-memory store behind
/// `memory://`. A client for a networked server plugs in here and is picked
/// by [`open_driver`] from the URI scheme.
pub trait Driver: Send + Sync {
    fn name(&self) -> &str;
    fn connect(&self) -> Result<Box<dyn Session>, DriverError>;
}

/// A live conversation with the database. Every failure is surfaced as a
/// [`DriverError`]; no operation is a silent no-op.
pub trait Session: Send + Sync {
    fn ping(&self) -> Result<(), DriverError>;
    fn execute(&self, command: Command) -> Result<Reply, DriverError>;
    fn disconnect(&self);
    fn is_open(&self) -> bool;

    fn insert_one(&self, collection: &str, document: Document) -> Result<Value, DriverError> {
        match self.execute(Command::Insert {
            collection: collection.to_owned(),
            documents: vec![document],
        })? {
            Reply::Inserted(mut ids) if ids.len() == 1 => Ok(ids.remove(0)),
            _ => Err(DriverError::UnexpectedReply("one inserted id")),
        }
    }

    fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<Vec<Value>, DriverError> {
        match self.execute(Command::Insert {
            collection: collection.to_owned(),
            documents,
        })? {
            Reply::Inserted(ids) => Ok(ids),
            _ => Err(DriverError::UnexpectedReply("inserted ids")),
        }
    }

    fn find(&self, collection: &str, filter: Filter, limit: Option<usize>) -> Result<Vec<Document>, DriverError> {
        match self.execute(Command::Find {
            collection: collection.to_owned(),
            filter,
            limit,
        })? {
            Reply::Documents(documents) => Ok(documents),
            _ => Err(DriverError::UnexpectedReply("documents")),
        }
    }

    fn find_one(&self, collection: &str, filter: Filter) -> Result<Option<Document>, DriverError> {
        Ok(self.find(collection, filter, Some(1))?.into_iter().next())
    }

    fn count(&self, collection: &str, filter: Filter) -> Result<usize, DriverError> {
        match self.execute(Command::Count {
            collection: collection.to_owned(),
            filter,
        })? {
            Reply::Count(count) => Ok(count),
            _ => Err(DriverError::UnexpectedReply("count")),
        }
    }

    fn update(&self, collection: &str, filter: Filter, changes: Vec<Change>, many: bool) -> Result<usize, DriverError> {
        match self.execute(Command::Update {
            collection: collection.to_owned(),
            filter,
            changes,
            many,
        })? {
            Reply::Modified(count) => Ok(count),
            _ => Err(DriverError::UnexpectedReply("modified count")),
        }
    }

    fn delete(&self, collection: &str, filter: Filter) -> Result<usize, DriverError> {
        match self.execute(Command::Delete {
            collection: collection.to_owned(),
            filter,
        })? {
            Reply::Deleted(count) => Ok(count),
            _ => Err(DriverError::UnexpectedReply("deleted count")),
        }
    }

    fn drop_collection(&self, collection: &str) -> Result<(), DriverError> {
        self.execute(Command::Drop {
            collection: collection.to_owned(),
        })
        .map(|_| ())
    }

    fn create_collection(&self, collection: &str, validator: Option<Schema>) -> Result<(), DriverError> {
        self.execute(Command::CreateCollection {
            collection: collection.to_owned(),
            validator,
        })
        .map(|_| ())
    }

    fn create_index(&self, collection: &str, field: &str, unique: bool) -> Result<(), DriverError> {
        self.execute(Command::CreateIndex {
            collection: collection.to_owned(),
            field: field.to_owned(),
            unique,
        })
        .map(|_| ())
    }

    fn authenticate(&self, user: &str, password: &str) -> Result<Role, DriverError> {
        match self.execute(Command::Authenticate {
            user: user.to_owned(),
            password: password.to_owned(),
        })? {
            Reply::Authenticated(role) => Ok(role),
            _ => Err(DriverError::UnexpectedReply("authentication result")),
        }
    }
}

/// Picks the driver for the configured connection string.
pub fn open_driver(settings: &DatabaseSettings) -> Result<Arc<dyn Driver>, Error> {
    match memory::MemoryDriver::from_uri(&settings.uri) {
        Some(driver) => {
            info!("Using in-memory document store '{}'", driver.name());
            Ok(Arc::new(driver.with_latency(settings.latency)))
        }
        None => Err(Error::UnsupportedDriver(settings.uri.clone())),
    }
}
