use crate::connection::query::Schema;
use crate::connection::{Command, Document, Driver, DriverError, Reply, Role, Session};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::sleep;
use std::time::Duration;

const URI_SCHEME: &str = "memory://";
const ID_FIELD: &str = "_id";

#[derive(Default)]
struct Collection {
    documents: Vec<Document>,
    unique: Vec<String>,
    validator: Option<Schema>,
}

struct User {
    password: String,
    role: Role,
}

#[derive(Default)]
struct Store {
    collections: HashMap<String, Collection>,
    users: HashMap<String, User>,
}

/// In-process document store speaking the driver contract. Used as the
/// built-in target and as the fixture database in tests.
#[derive(Clone)]
pub struct MemoryDriver {
    name: String,
    store: Arc<Mutex<Store>>,
    next_id: Arc<AtomicU64>,
    available: Arc<AtomicBool>,
    latency: Duration,
}

impl MemoryDriver {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            store: Arc::new(Mutex::new(Store::default())),
            next_id: Arc::new(AtomicU64::new(1)),
            available: Arc::new(AtomicBool::new(true)),
            latency: Duration::default(),
        }
    }

    /// Accepts `memory://<name>`; any other scheme belongs to another driver.
    pub fn from_uri(uri: &str) -> Option<Self> {
        let name = uri.strip_prefix(URI_SCHEME)?.trim_end_matches('/');
        Some(Self::new(if name.is_empty() { "default" } else { name }))
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Simulates the server going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

impl Driver for MemoryDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn connect(&self) -> Result<Box<dyn Session>, DriverError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(DriverError::Connection(format!(
                "{}{} is not reachable",
                URI_SCHEME, self.name
            )));
        }
        trace!("Opened session to {}{}", URI_SCHEME, self.name);
        Ok(Box::new(MemorySession {
            driver: self.clone(),
            principal: Mutex::new(None),
            open: AtomicBool::new(true),
        }))
    }
}

struct MemorySession {
    driver: MemoryDriver,
    principal: Mutex<Option<Role>>,
    open: AtomicBool,
}

impl MemorySession {
    fn guard(&self) -> Result<(), DriverError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(DriverError::Closed);
        }
        if !self.driver.available.load(Ordering::SeqCst) {
            return Err(DriverError::Connection("server went away".to_owned()));
        }
        if self.driver.latency > Duration::default() {
            sleep(self.driver.latency);
        }
        Ok(())
    }

    fn authorize(&self, command: &Command) -> Result<(), DriverError> {
        let principal = *lock!(self.principal);
        match (principal, command) {
            (Some(role), Command::CreateUser { .. }) | (Some(role), Command::DropUser { .. })
                if role != Role::Admin =>
            {
                Err(DriverError::Unauthorized("user management requires admin".to_owned()))
            }
            (Some(role), command) if command.is_write() && !role.can_write() => Err(
                DriverError::Unauthorized("role does not allow writes".to_owned()),
            ),
            _ => Ok(()),
        }
    }
}

impl Session for MemorySession {
    fn ping(&self) -> Result<(), DriverError> {
        self.guard()
    }

    fn execute(&self, command: Command) -> Result<Reply, DriverError> {
        self.guard()?;
        self.authorize(&command)?;
        let mut store = lock!(self.driver.store);
        match command {
            Command::Authenticate { user, password } => {
                let role = match store.users.get(&user) {
                    Some(found) if found.password == password => found.role,
                    _ => {
                        return Err(DriverError::Unauthorized(format!(
                            "authentication failed for '{}'",
                            user
                        )))
                    }
                };
                *lock!(self.principal) = Some(role);
                Ok(Reply::Authenticated(role))
            }
            command => store.apply(command, &self.driver.next_id),
        }
    }

    fn disconnect(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            trace!("Closed session to {}{}", URI_SCHEME, self.driver.name);
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl Store {
    fn apply(&mut self, command: Command, ids: &AtomicU64) -> Result<Reply, DriverError> {
        match command {
            Command::CreateCollection { collection, validator } => {
                if self.collections.contains_key(&collection) {
                    return Err(DriverError::Rejected(format!(
                        "collection '{}' already exists",
                        collection
                    )));
                }
                self.collections.insert(
                    collection,
                    Collection {
                        validator,
                        ..Collection::default()
                    },
                );
                Ok(Reply::Ack)
            }
            Command::Drop { collection } => {
                self.collections.remove(&collection);
                Ok(Reply::Ack)
            }
            Command::Insert { collection, documents } => {
                let target = self.collections.entry(collection).or_default();
                target.insert(documents, ids).map(Reply::Inserted)
            }
            Command::Find { collection, filter, limit } => {
                let documents = self
                    .collections
                    .get(&collection)
                    .map(|target| {
                        target
                            .documents
                            .iter()
                            .filter(|d| filter.matches(d))
                            .take(limit.unwrap_or(usize::MAX))
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(Reply::Documents(documents))
            }
            Command::Count { collection, filter } => Ok(Reply::Count(
                self.collections
                    .get(&collection)
                    .map(|target| target.documents.iter().filter(|d| filter.matches(d)).count())
                    .unwrap_or(0),
            )),
            Command::Update { collection, filter, changes, many } => {
                let target = match self.collections.get_mut(&collection) {
                    Some(target) => target,
                    None => return Ok(Reply::Modified(0)),
                };
                let mut staged = target.documents.clone();
                let mut modified = 0;
                for document in staged.iter_mut().filter(|d| filter.matches(d)) {
                    for change in &changes {
                        change.apply(document).map_err(DriverError::Rejected)?;
                    }
                    target.admit(document)?;
                    modified += 1;
                    if !many {
                        break;
                    }
                }
                target.check_unique(&staged)?;
                target.documents = staged;
                Ok(Reply::Modified(modified))
            }
            Command::Delete { collection, filter } => {
                let target = match self.collections.get_mut(&collection) {
                    Some(target) => target,
                    None => return Ok(Reply::Deleted(0)),
                };
                let before = target.documents.len();
                target.documents.retain(|d| !filter.matches(d));
                Ok(Reply::Deleted(before - target.documents.len()))
            }
            Command::CreateIndex { collection, field, unique } => {
                let target = self.collections.entry(collection).or_default();
                if unique && !target.unique.contains(&field) {
                    target.unique.push(field);
                    if let Err(e) = target.check_unique(&target.documents) {
                        target.unique.pop();
                        return Err(e);
                    }
                }
                Ok(Reply::Ack)
            }
            Command::CreateUser { user, password, role } => {
                if self.users.contains_key(&user) {
                    return Err(DriverError::Rejected(format!("user '{}' already exists", user)));
                }
                self.users.insert(user, User { password, role });
                Ok(Reply::Ack)
            }
            Command::DropUser { user } => {
                self.users.remove(&user);
                Ok(Reply::Ack)
            }
            Command::Authenticate { .. } => Err(DriverError::UnexpectedReply("session-level command")),
        }
    }
}

impl Collection {
    fn admit(&self, document: &Document) -> Result<(), DriverError> {
        match &self.validator {
            Some(schema) => schema
                .validate(document)
                .map_err(|reason| DriverError::Rejected(format!("document failed validation: {}", reason))),
            None => Ok(()),
        }
    }

    fn check_unique(&self, documents: &[Document]) -> Result<(), DriverError> {
        for field in &self.unique {
            let mut seen: Vec<&Value> = Vec::new();
            for value in documents.iter().filter_map(|d| d.get(field)) {
                if seen.contains(&value) {
                    return Err(DriverError::Rejected(format!(
                        "duplicate key for unique index on '{}': {}",
                        field, value
                    )));
                }
                seen.push(value);
            }
        }
        Ok(())
    }

    fn insert(&mut self, documents: Vec<Document>, ids: &AtomicU64) -> Result<Vec<Value>, DriverError> {
        let mut staged = self.documents.clone();
        let mut inserted = Vec::with_capacity(documents.len());
        for mut document in documents {
            if !document.contains_key(ID_FIELD) {
                document.insert(ID_FIELD.to_owned(), Value::from(ids.fetch_add(1, Ordering::SeqCst)));
            }
            self.admit(&document)?;
            inserted.push(document[ID_FIELD].clone());
            staged.push(document);
        }
        self.check_unique(&staged)?;
        self.documents = staged;
        Ok(inserted)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::connection::{Change, Filter, Rule};

    fn session() -> (MemoryDriver, Box<dyn Session>) {
        let driver = MemoryDriver::new("test");
        let session = driver.connect().unwrap();
        (driver, session)
    }

    #[test]
    fn test_from_uri_accepts_only_memory_scheme() {
        assert_eq!(MemoryDriver::from_uri("memory://qa").unwrap().name(), "qa");
        assert_eq!(MemoryDriver::from_uri("memory://").unwrap().name(), "default");
        assert!(MemoryDriver::from_uri("mongodb://localhost:27017/").is_none());
    }

    #[test]
    fn test_crud_round() {
        let (_, session) = session();
        let ids = session
            .insert_many("people", vec![doc!({"name": "Alice", "age": 25}), doc!({"name": "Bob", "age": 30})])
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(session.count("people", Filter::all()).unwrap(), 2);
        let modified = session
            .update("people", Filter::eq("name", "Bob"), vec![Change::Set("age".into(), Value::from(31))], false)
            .unwrap();
        assert_eq!(modified, 1);
        let bob = session.find_one("people", Filter::eq("name", "Bob")).unwrap().unwrap();
        assert_eq!(bob["age"], Value::from(31));
        assert_eq!(session.delete("people", Filter::eq("name", "Alice")).unwrap(), 1);
        assert_eq!(session.count("people", Filter::all()).unwrap(), 1);
    }

    #[test]
    fn test_insert_is_all_or_nothing() {
        let (_, session) = session();
        session.create_index("users", "email", true).unwrap();
        let result = session.insert_many(
            "users",
            vec![doc!({"email": "a@x.io"}), doc!({"email": "b@x.io"}), doc!({"email": "a@x.io"})],
        );
        assert!(matches!(result, Err(DriverError::Rejected(_))));
        assert_eq!(session.count("users", Filter::all()).unwrap(), 0);
    }

    #[test]
    fn test_validator_rejects_documents() {
        let (_, session) = session();
        let schema = Schema::new().require("age").field("age", Rule::integer());
        session.create_collection("strict", Some(schema)).unwrap();
        assert!(session.insert_one("strict", doc!({"age": 3})).is_ok());
        assert!(session.insert_one("strict", doc!({"name": "x"})).is_err());
        assert!(session.create_collection("strict", None).is_err());
    }

    #[test]
    fn test_read_role_cannot_write() {
        let (driver, admin) = session();
        admin
            .execute(Command::CreateUser {
                user: "reader".into(),
                password: "pw".into(),
                role: Role::Read,
            })
            .unwrap();
        let reader = driver.connect().unwrap();
        assert!(reader.authenticate("reader", "wrong").is_err());
        assert_eq!(reader.authenticate("reader", "pw").unwrap(), Role::Read);
        assert!(matches!(
            reader.insert_one("any", doc!({"a": 1})),
            Err(DriverError::Unauthorized(_))
        ));
        assert!(reader.count("any", Filter::all()).is_ok());
    }

    #[test]
    fn test_unavailable_server_surfaces_errors() {
        let (driver, session) = session();
        driver.set_available(false);
        assert!(matches!(session.ping(), Err(DriverError::Connection(_))));
        assert!(driver.connect().is_err());
        driver.set_available(true);
        session.disconnect();
        assert_eq!(session.ping(), Err(DriverError::Closed));
    }
}
