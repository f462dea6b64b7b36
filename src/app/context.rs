use crate::app::unit::{Category, UnitError};
use crate::configuration::settings::Workload;
use crate::connection::pool::{Dedicated, Lease, SessionPool};
use crate::connection::{DriverError, Schema, Session};
use derivative::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag. A child token observes every ancestor.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    ancestors: Vec<Arc<AtomicBool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || self.ancestors.iter().any(|a| a.load(Ordering::SeqCst))
    }

    pub fn child(&self) -> Self {
        let mut ancestors = self.ancestors.clone();
        ancestors.push(self.flag.clone());
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            ancestors,
        }
    }
}

/// Everything a unit body may touch: its own leased session, a scope for
/// fixture names, the workload sizing and its cancellation token.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct UnitContext {
    scope: String,
    #[derivative(Debug = "ignore")]
    session: Lease,
    #[derivative(Debug = "ignore")]
    pool: Arc<SessionPool>,
    cancel: CancellationToken,
    workload: Arc<Workload>,
}

impl UnitContext {
    pub fn new(
        category: Category,
        unit: &str,
        session: Lease,
        pool: Arc<SessionPool>,
        cancel: CancellationToken,
        workload: Arc<Workload>,
    ) -> Self {
        let unit: String = unit
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        Self {
            scope: format!("{}_{}", category, unit),
            session,
            pool,
            cancel,
            workload,
        }
    }

    pub fn session(&self) -> &dyn Session {
        &*self.session
    }

    /// Opens a session outside the pool; disconnected when dropped.
    pub fn connect(&self) -> Result<Dedicated, DriverError> {
        self.pool.dedicated()
    }

    pub fn workload(&self) -> &Workload {
        &self.workload
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns `Err(Cancelled)` once the run or this unit was cancelled, so
    /// long loops can bail out with `?`.
    pub fn checkpoint(&self) -> Result<(), UnitError> {
        if self.is_cancelled() {
            Err(UnitError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Collection name private to this unit.
    pub fn collection(&self, name: &str) -> String {
        format!("{}_{}", self.scope, name)
    }

    /// Fresh scoped collection that is dropped again when the guard goes away.
    pub fn fixture(&self, name: &str) -> Result<Fixture<'_>, DriverError> {
        self.fixture_with(name, None)
    }

    pub fn fixture_with(&self, name: &str, validator: Option<Schema>) -> Result<Fixture<'_>, DriverError> {
        let collection = self.collection(name);
        self.session().drop_collection(&collection)?;
        if validator.is_some() {
            self.session().create_collection(&collection, validator)?;
        }
        Ok(Fixture {
            session: self.session(),
            name: collection,
        })
    }
}

pub struct Fixture<'a> {
    session: &'a dyn Session,
    name: String,
}

impl<'a> Fixture<'a> {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<'a> Drop for Fixture<'a> {
    fn drop(&mut self) {
        if let Err(e) = self.session.drop_collection(&self.name) {
            warn!("Failed to drop fixture collection '{}': {}", self.name, e);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::connection::memory::MemoryDriver;
    use crate::connection::{Driver, Filter};

    #[test]
    fn test_child_token_observes_parent() {
        let run = CancellationToken::new();
        let unit = run.child();
        let nested = unit.child();
        assert!(!nested.is_cancelled());
        run.cancel();
        assert!(unit.is_cancelled());
        assert!(nested.is_cancelled());

        let other = CancellationToken::new();
        let sibling = other.child();
        sibling.cancel();
        assert!(!other.is_cancelled());
    }

    #[test]
    fn test_fixture_is_scoped_and_dropped() {
        let driver = MemoryDriver::new("ctx");
        let pool = SessionPool::open(Arc::new(driver.clone()), 2).unwrap();
        let ctx = UnitContext::new(
            Category::Functional,
            "Create Single Document",
            pool.acquire().unwrap(),
            pool.clone(),
            CancellationToken::new(),
            Arc::new(Workload::default()),
        );
        let name = {
            let fixture = ctx.fixture("users").unwrap();
            assert_eq!(fixture.name(), "functional_create_single_document_users");
            ctx.session().insert_one(fixture.name(), doc!({"a": 1})).unwrap();
            fixture.name().to_owned()
        };
        let observer = driver.connect().unwrap();
        assert_eq!(observer.count(&name, Filter::all()).unwrap(), 0);
        assert!(ctx.checkpoint().is_ok());
    }
}
