use crate::app::context::UnitContext;
use crate::app::stats::percentile;
use crate::app::unit::{unit, SuiteUnit, UnitOutcome, Verdict};
use crate::configuration::settings::Workload;
use crate::connection::{Change, Filter, Predicate};
use crate::suites::sample_user;
use crate::time::as_millis_f64;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

const SINGLE_INSERTS: usize = 100;

pub fn units(workload: &Workload) -> Vec<Arc<dyn SuiteUnit>> {
    let mut units = vec![
        unit("Insert Rate", insert_rate),
        unit("Query Latency", query_latency),
        unit("Mixed Workload", mixed_workload),
    ];
    units.extend((0..workload.clients).map(|client| {
        unit(format!("Concurrent Client {}", client), move |ctx: &UnitContext| {
            concurrent_client(ctx, client)
        })
    }));
    units
}

/// Mean and 95th percentile of the samples in milliseconds.
fn latency(mut samples: Vec<f64>) -> (f64, f64) {
    if samples.is_empty() {
        return (0.0, 0.0);
    }
    samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    (mean, percentile(&samples, 95.0))
}

fn rate(count: usize, millis: f64) -> f64 {
    if millis > 0.0 {
        count as f64 * 1_000.0 / millis
    } else {
        0.0
    }
}

fn insert_rate(ctx: &UnitContext) -> UnitOutcome {
    let documents = ctx.workload().documents;
    let load = ctx.fixture("load_test")?;

    let singles = documents.min(SINGLE_INSERTS);
    let started = Instant::now();
    for i in 0..singles {
        ctx.checkpoint()?;
        ctx.session().insert_one(load.name(), sample_user(i))?;
    }
    let single_ms = as_millis_f64(&started.elapsed());

    ctx.session().drop_collection(load.name())?;
    let batch = (0..documents).map(sample_user).collect();
    let started = Instant::now();
    let ids = ctx.session().insert_many(load.name(), batch)?;
    let bulk_ms = as_millis_f64(&started.elapsed());

    check!(ids.len() == documents, "bulk insert stored {} of {} documents", ids.len(), documents);
    Ok(Verdict::pass()
        .metric("documents", documents as f64)
        .metric("single_insert_ms", single_ms)
        .metric("single_insert_rate", rate(singles, single_ms))
        .metric("bulk_insert_ms", bulk_ms)
        .metric("bulk_insert_rate", rate(documents, bulk_ms)))
}

fn query_latency(ctx: &UnitContext) -> UnitOutcome {
    let workload = ctx.workload();
    let load = ctx.fixture("load_test")?;
    ctx.session()
        .insert_many(load.name(), (0..workload.documents).map(sample_user).collect())?;

    let queries = vec![
        ("department", Filter::eq("department", "Engineering")),
        (
            "age_range",
            Filter::all().and("age", Predicate::Gte(30.0)).and("age", Predicate::Lte(50.0)),
        ),
        ("salary", Filter::all().and("salary", Predicate::Gt(75_000.0))),
        ("nested_theme", Filter::eq("metadata.preferences.theme", "dark")),
    ];
    let mut verdict = Verdict::pass();
    let mut samples = Vec::with_capacity(queries.len() * workload.iterations);
    for (label, filter) in queries {
        let mut per_query = Vec::with_capacity(workload.iterations);
        for _ in 0..workload.iterations {
            ctx.checkpoint()?;
            let started = Instant::now();
            let found = ctx.session().find(load.name(), filter.clone(), Some(10))?;
            per_query.push(as_millis_f64(&started.elapsed()));
            check!(found.len() <= 10, "query '{}' ignored the limit", label);
        }
        let (mean, _) = latency(per_query.clone());
        verdict = verdict.metric(format!("{}_avg_ms", label), mean);
        samples.extend(per_query);
    }
    let total = samples.len();
    let (mean, p95) = latency(samples);
    Ok(verdict
        .metric("queries", total as f64)
        .metric("avg_ms", mean)
        .metric("p95_ms", p95))
}

fn mixed_workload(ctx: &UnitContext) -> UnitOutcome {
    let operations = ctx.workload().operations;
    let mixed = ctx.fixture("mixed")?;
    let mut samples = Vec::with_capacity(operations);
    let mut inserted = 0usize;
    let mut deleted = 0usize;
    for i in 0..operations {
        ctx.checkpoint()?;
        let started = Instant::now();
        match i % 4 {
            0 | 1 => {
                ctx.session().insert_one(mixed.name(), sample_user(i))?;
                inserted += 1;
            }
            2 => {
                ctx.session().update(
                    mixed.name(),
                    Filter::all().and("user_id", Predicate::Lte((1_000 + i) as f64)),
                    vec![Change::Inc("logins".into(), 1.0)],
                    false,
                )?;
            }
            _ => {
                deleted += ctx
                    .session()
                    .delete(mixed.name(), Filter::eq("user_id", Value::from(1_000 + i - 3)))?;
            }
        }
        samples.push(as_millis_f64(&started.elapsed()));
    }
    let left = ctx.session().count(mixed.name(), Filter::all())?;
    check!(
        left == inserted - deleted,
        "expected {} documents after the mixed workload, found {}",
        inserted - deleted,
        left
    );
    let (mean, p95) = latency(samples);
    Ok(Verdict::pass()
        .metric("operations", operations as f64)
        .metric("avg_ms", mean)
        .metric("p95_ms", p95))
}

fn concurrent_client(ctx: &UnitContext, client: usize) -> UnitOutcome {
    let operations = ctx.workload().operations;
    let own = ctx.fixture("ops")?;
    let mut samples = Vec::with_capacity(operations);
    let mut inserted = 0usize;
    for i in 0..operations {
        ctx.checkpoint()?;
        let started = Instant::now();
        match i % 3 {
            0 => {
                ctx.session().insert_one(
                    own.name(),
                    doc!({"client": client, "operation": i, "data": format!("Client {} - Operation {}", client, i)}),
                )?;
                inserted += 1;
            }
            1 => {
                ctx.session().find_one(own.name(), Filter::eq("client", client as u64))?;
            }
            _ => {
                ctx.session().update(
                    own.name(),
                    Filter::eq("client", client as u64),
                    vec![Change::Set("last_operation".into(), Value::from(i as u64))],
                    false,
                )?;
            }
        }
        samples.push(as_millis_f64(&started.elapsed()));
    }
    let stored = ctx.session().count(own.name(), Filter::eq("client", client as u64))?;
    check!(stored == inserted, "client {} stored {} of {} documents", client, stored, inserted);
    let (mean, p95) = latency(samples);
    Ok(Verdict::pass()
        .metric("operations", operations as f64)
        .metric("avg_ms", mean)
        .metric("p95_ms", p95))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_latency_summary() {
        let (mean, p95) = latency(vec![4.0, 1.0, 3.0, 2.0]);
        assert!((mean - 2.5).abs() < 1e-9);
        assert!((p95 - 4.0).abs() < 1e-9);
        assert_eq!(latency(Vec::new()), (0.0, 0.0));
        assert_eq!(rate(10, 0.0), 0.0);
        assert!((rate(10, 500.0) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_one_unit_per_client() {
        let workload = Workload {
            clients: 3,
            ..Workload::default()
        };
        let names: Vec<String> = units(&workload).iter().map(|u| u.name().to_owned()).collect();
        assert_eq!(names.len(), 6);
        assert_eq!(names[5], "Concurrent Client 2");
    }
}
