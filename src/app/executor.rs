use crate::app::context::{CancellationToken, UnitContext};
use crate::app::result::{CategoryResult, UnitRecord};
use crate::app::unit::{Category, ErrorKind, SuiteUnit, UnitResult};
use crate::configuration::settings::Workload;
use crate::connection::pool::SessionPool;
use crate::time::humanize;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const CANCELLED: &str = "run cancelled before the unit started";

/// Runs the units of one category with fault isolation and a per-unit
/// timeout. Performance units fan out to a bounded worker pool; every other
/// category runs strictly one unit at a time.
pub struct Executor {
    pool: Arc<SessionPool>,
    workers: usize,
    timeout: Duration,
    cancel: CancellationToken,
    workload: Arc<Workload>,
}

impl Executor {
    pub fn new(
        pool: Arc<SessionPool>,
        workers: usize,
        timeout: Duration,
        cancel: CancellationToken,
        workload: Arc<Workload>,
    ) -> Self {
        Self {
            pool,
            workers: workers.max(1),
            timeout,
            cancel,
            workload,
        }
    }

    pub fn execute(&self, category: Category, units: &[Arc<dyn SuiteUnit>]) -> CategoryResult {
        info!("Running {} suite ({} units)", category, units.len());
        let started = Instant::now();
        let runner = self.runner(category);
        let (records, concurrency) = if category.is_concurrent() && units.len() > 1 {
            let workers = self.workers.min(units.len());
            (self.run_concurrent(&runner, units, workers), workers)
        } else {
            (units.iter().map(|u| runner.run(u)).collect(), 1)
        };
        let result = CategoryResult::new(
            category,
            records,
            started.elapsed(),
            concurrency,
            self.cancel.is_cancelled(),
        );
        info!(
            "Finished {} suite in {}: {} passed, {} failed, {} errors, {} skipped",
            category,
            humanize(&result.duration),
            result.counts.passed,
            result.counts.failed,
            result.counts.errored,
            result.counts.skipped
        );
        result
    }

    fn runner(&self, category: Category) -> UnitRunner {
        UnitRunner {
            category,
            pool: self.pool.clone(),
            timeout: self.timeout,
            cancel: self.cancel.clone(),
            workload: self.workload.clone(),
        }
    }

    fn run_concurrent(
        &self,
        runner: &UnitRunner,
        units: &[Arc<dyn SuiteUnit>],
        workers: usize,
    ) -> Vec<UnitRecord> {
        let queue: Arc<Mutex<VecDeque<(usize, Arc<dyn SuiteUnit>)>>> =
            Arc::new(Mutex::new(units.iter().cloned().enumerate().collect()));
        let (tx, rx) = mpsc::channel();
        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let queue = queue.clone();
            let tx = tx.clone();
            let runner = runner.clone();
            let spawned = thread::Builder::new()
                .name(format!("{}-worker-{}", runner.category, worker))
                .spawn(move || loop {
                    let next = lock!(queue).pop_front();
                    let (index, unit) = match next {
                        Some(job) => job,
                        None => break,
                    };
                    if tx.send((index, runner.run(&unit))).is_err() {
                        break;
                    }
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => warn!("Cannot spawn worker {}: {}", worker, e),
            }
        }
        drop(tx);
        if handles.is_empty() {
            warn!("No workers available, running {} suite sequentially", runner.category);
            return units.iter().map(|u| runner.run(u)).collect();
        }
        debug!("Started {} workers for {} suite", handles.len(), runner.category);

        let mut slots: Vec<Option<UnitRecord>> = vec![None; units.len()];
        for (index, record) in rx {
            slots[index] = Some(record);
        }
        for handle in handles {
            if handle.join().is_err() {
                error!("A {} worker panicked", runner.category);
            }
        }
        slots
            .into_iter()
            .zip(units)
            .map(|(slot, unit)| {
                slot.unwrap_or_else(|| {
                    UnitRecord::new(unit.name(), UnitResult::skipped("worker stopped before running the unit"))
                })
            })
            .collect()
    }
}

#[derive(Clone)]
struct UnitRunner {
    category: Category,
    pool: Arc<SessionPool>,
    timeout: Duration,
    cancel: CancellationToken,
    workload: Arc<Workload>,
}

impl UnitRunner {
    fn run(&self, unit: &Arc<dyn SuiteUnit>) -> UnitRecord {
        let name = unit.name().to_owned();
        if self.cancel.is_cancelled() {
            debug!("Skipping '{}': {}", name, CANCELLED);
            return UnitRecord::new(name, UnitResult::skipped(CANCELLED));
        }
        let started = Instant::now();
        let result = match self.pool.acquire() {
            Ok(lease) => {
                let token = self.cancel.child();
                let ctx = UnitContext::new(
                    self.category,
                    &name,
                    lease,
                    self.pool.clone(),
                    token.clone(),
                    self.workload.clone(),
                );
                self.guarded(unit.clone(), ctx, token, started)
            }
            Err(e) => UnitResult::error(
                ErrorKind::Resource,
                format!("cannot acquire a database session: {}", e),
                started.elapsed(),
            ),
        };
        match &result.detail {
            Some(detail) if result.status.is_failure() => warn!(
                "{} '{}' {} in {}: {}",
                self.category,
                name,
                result.status,
                humanize(&result.duration),
                detail.message
            ),
            _ => info!(
                "{} '{}' {} in {}",
                self.category,
                name,
                result.status,
                humanize(&result.duration)
            ),
        }
        UnitRecord::new(name, result)
    }

    /// Runs the body on its own thread so that a hung unit can be abandoned
    /// after the timeout. The context (and with it the session lease) is
    /// dropped by that thread on every exit path.
    fn guarded(
        &self,
        unit: Arc<dyn SuiteUnit>,
        ctx: UnitContext,
        token: CancellationToken,
        started: Instant,
    ) -> UnitResult {
        let (tx, rx) = mpsc::sync_channel(1);
        let spawned = thread::Builder::new()
            .name(format!("unit-{}", unit.name()))
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| unit.run(&ctx)));
                drop(ctx);
                let _ = tx.send(outcome);
            });
        if let Err(e) = spawned {
            return UnitResult::error(
                ErrorKind::Resource,
                format!("cannot spawn unit thread: {}", e),
                started.elapsed(),
            );
        }
        match rx.recv_timeout(self.timeout) {
            Ok(Ok(Ok(verdict))) => UnitResult::from_verdict(verdict, started.elapsed()),
            Ok(Ok(Err(e))) => UnitResult::error(e.kind(), e.to_string(), started.elapsed()),
            Ok(Err(payload)) => UnitResult::error(
                ErrorKind::Panic,
                format!("unit panicked: {}", panic_message(payload.as_ref())),
                started.elapsed(),
            ),
            Err(RecvTimeoutError::Timeout) => {
                token.cancel();
                UnitResult::error(
                    ErrorKind::Timeout,
                    format!("exceeded the unit timeout of {}", humanize(&self.timeout)),
                    started.elapsed(),
                )
            }
            Err(RecvTimeoutError::Disconnected) => UnitResult::error(
                ErrorKind::Exception,
                "unit thread exited without a result",
                started.elapsed(),
            ),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
