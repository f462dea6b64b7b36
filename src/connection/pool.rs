use crate::connection::{Driver, DriverError, Session};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Sessions opened once per run and handed out to units as leases. Idle
/// sessions are kept up to `max_idle` and all disconnected by [`close`].
///
/// [`close`]: SessionPool::close
pub struct SessionPool {
    driver: Arc<dyn Driver>,
    idle: Mutex<Vec<Box<dyn Session>>>,
    max_idle: usize,
    opened: AtomicUsize,
    closed: AtomicBool,
}

impl SessionPool {
    /// Opens the first session eagerly so an unreachable database is reported
    /// before any unit runs.
    pub fn open(driver: Arc<dyn Driver>, max_idle: usize) -> Result<Arc<Self>, DriverError> {
        let first = driver.connect()?;
        let pool = Arc::new(Self {
            driver,
            idle: Mutex::new(vec![first]),
            max_idle: max_idle.max(1),
            opened: AtomicUsize::new(1),
            closed: AtomicBool::new(false),
        });
        Ok(pool)
    }

    pub fn acquire(self: &Arc<Self>) -> Result<Lease, DriverError> {
        let reused = lock!(self.idle).pop();
        let session = match reused {
            Some(session) => session,
            None => {
                let session = self.driver.connect()?;
                self.opened.fetch_add(1, Ordering::SeqCst);
                session
            }
        };
        Ok(Lease {
            session: Some(session),
            pool: self.clone(),
        })
    }

    /// A session outside the pool, for units that change session state
    /// (for example by authenticating).
    pub fn dedicated(&self) -> Result<Dedicated, DriverError> {
        self.driver.connect().map(Dedicated)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn idle(&self) -> usize {
        lock!(self.idle).len()
    }

    /// Leases still out (for example held by an abandoned unit) are
    /// disconnected when they come back.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let sessions: Vec<_> = lock!(self.idle).drain(..).collect();
        debug!(
            "Closing session pool ({} idle, {} opened during run)",
            sessions.len(),
            self.opened()
        );
        for session in sessions {
            session.disconnect();
        }
    }

    fn release(&self, session: Box<dyn Session>) {
        if !session.is_open() {
            return;
        }
        let mut idle = lock!(self.idle);
        if !self.closed.load(Ordering::SeqCst) && idle.len() < self.max_idle {
            idle.push(session);
        } else {
            drop(idle);
            session.disconnect();
        }
    }
}

/// A pooled session; returned to the pool when dropped.
pub struct Lease {
    session: Option<Box<dyn Session>>,
    pool: Arc<SessionPool>,
}

impl Deref for Lease {
    type Target = dyn Session;

    fn deref(&self) -> &Self::Target {
        self.session.as_deref().expect("lease used after release")
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.pool.release(session);
        }
    }
}

/// An unpooled session, disconnected when dropped.
pub struct Dedicated(Box<dyn Session>);

impl Deref for Dedicated {
    type Target = dyn Session;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl Drop for Dedicated {
    fn drop(&mut self) {
        self.0.disconnect();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::connection::memory::MemoryDriver;

    #[test]
    fn test_leases_are_returned_and_reused() {
        let pool = SessionPool::open(Arc::new(MemoryDriver::new("pool")), 2).unwrap();
        {
            let first = pool.acquire().unwrap();
            let second = pool.acquire().unwrap();
            assert!(first.ping().is_ok());
            assert!(second.ping().is_ok());
            assert_eq!(pool.idle(), 0);
        }
        assert_eq!(pool.idle(), 2);
        assert_eq!(pool.opened(), 2);
        let _again = pool.acquire().unwrap();
        assert_eq!(pool.opened(), 2);
    }

    #[test]
    fn test_lease_released_when_holder_panics() {
        let pool = SessionPool::open(Arc::new(MemoryDriver::new("pool")), 4).unwrap();
        let lease = pool.acquire().unwrap();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _held = lease;
            panic!("unit blew up");
        }));
        assert!(result.is_err());
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_open_fails_when_database_unreachable() {
        let driver = MemoryDriver::new("down");
        driver.set_available(false);
        assert!(SessionPool::open(Arc::new(driver), 1).is_err());
    }

    #[test]
    fn test_close_disconnects_idle_sessions() {
        let pool = SessionPool::open(Arc::new(MemoryDriver::new("pool")), 4).unwrap();
        let lease = pool.acquire().unwrap();
        drop(lease);
        pool.close();
        assert_eq!(pool.idle(), 0);
        let dedicated = pool.dedicated().unwrap();
        assert!(dedicated.ping().is_ok());
    }

    #[test]
    fn test_late_lease_is_disconnected_after_close() {
        let pool = SessionPool::open(Arc::new(MemoryDriver::new("pool")), 4).unwrap();
        let straggler = pool.acquire().unwrap();
        pool.close();
        drop(straggler);
        assert_eq!(pool.idle(), 0);
    }
}
