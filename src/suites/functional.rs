use crate::app::context::UnitContext;
use crate::app::unit::{unit, SuiteUnit, UnitOutcome, Verdict};
use crate::connection::{Change, Filter, Predicate};
use serde_json::Value;
use std::sync::Arc;

pub fn units() -> Vec<Arc<dyn SuiteUnit>> {
    vec![
        unit("Create Single Document", create_single),
        unit("Create Multiple Documents", create_multiple),
        unit("Read With Filters", read_with_filters),
        unit("Update Document", update_document),
        unit("Delete Document", delete_document),
        unit("Unique Index", unique_index),
        unit("Compound Query", compound_query),
    ]
}

fn create_single(ctx: &UnitContext) -> UnitOutcome {
    let users = ctx.fixture("users")?;
    let id = ctx.session().insert_one(
        users.name(),
        doc!({"name": "Test User", "email": "test@example.com", "age": 25}),
    )?;
    check!(!id.is_null(), "no id assigned to the inserted document");
    let stored = ctx.session().find_one(users.name(), Filter::eq("_id", id.clone()))?;
    check!(stored.is_some(), "document {} not found after insert", id);
    Ok(Verdict::pass())
}

fn create_multiple(ctx: &UnitContext) -> UnitOutcome {
    let users = ctx.fixture("users")?;
    let batch = (0..5)
        .map(|i| doc!({"name": format!("User {}", i), "email": format!("user{}@example.com", i), "age": 20 + i}))
        .collect();
    let ids = ctx.session().insert_many(users.name(), batch)?;
    check!(ids.len() == 5, "expected 5 ids, got {}", ids.len());
    let stored = ctx.session().count(users.name(), Filter::all())?;
    check!(stored == 5, "expected 5 stored documents, found {}", stored);
    Ok(Verdict::pass().metric("documents", stored as f64))
}

fn read_with_filters(ctx: &UnitContext) -> UnitOutcome {
    let users = ctx.fixture("users")?;
    ctx.session().insert_many(
        users.name(),
        vec![
            doc!({"name": "Alice", "age": 30, "status": "active"}),
            doc!({"name": "Bob", "age": 25, "status": "inactive"}),
            doc!({"name": "Charlie", "age": 35, "status": "active"}),
        ],
    )?;
    let active = ctx.session().find(users.name(), Filter::eq("status", "active"), None)?;
    check!(active.len() == 2, "expected 2 active users, found {}", active.len());
    let older = ctx
        .session()
        .count(users.name(), Filter::all().and("age", Predicate::Gt(28.0)))?;
    check!(older == 2, "expected 2 users older than 28, found {}", older);
    let limited = ctx.session().find(users.name(), Filter::all(), Some(1))?;
    check!(limited.len() == 1, "limit ignored, got {} documents", limited.len());
    Ok(Verdict::pass())
}

fn update_document(ctx: &UnitContext) -> UnitOutcome {
    let users = ctx.fixture("users")?;
    ctx.session()
        .insert_one(users.name(), doc!({"name": "Update Test", "age": 25}))?;
    let modified = ctx.session().update(
        users.name(),
        Filter::eq("name", "Update Test"),
        vec![Change::Set("age".into(), Value::from(26)), Change::Set("updated".into(), Value::Bool(true))],
        false,
    )?;
    check!(modified == 1, "expected 1 modified document, got {}", modified);
    let stored = ctx.session().find_one(users.name(), Filter::eq("name", "Update Test"))?;
    let age = stored.as_ref().and_then(|d| d.get("age")).and_then(Value::as_i64);
    check!(age == Some(26), "age after update is {:?}", age);
    Ok(Verdict::pass())
}

fn delete_document(ctx: &UnitContext) -> UnitOutcome {
    let users = ctx.fixture("users")?;
    ctx.session()
        .insert_many(users.name(), vec![doc!({"name": "Delete Test"}), doc!({"name": "Keep"})])?;
    let deleted = ctx.session().delete(users.name(), Filter::eq("name", "Delete Test"))?;
    check!(deleted == 1, "expected 1 deleted document, got {}", deleted);
    let left = ctx.session().count(users.name(), Filter::all())?;
    check!(left == 1, "expected 1 remaining document, found {}", left);
    Ok(Verdict::pass())
}

fn unique_index(ctx: &UnitContext) -> UnitOutcome {
    let users = ctx.fixture("users")?;
    ctx.session().create_index(users.name(), "email", true)?;
    ctx.session()
        .insert_one(users.name(), doc!({"email": "unique@example.com"}))?;
    let duplicate = ctx
        .session()
        .insert_one(users.name(), doc!({"email": "unique@example.com"}));
    check!(duplicate.is_err(), "duplicate email was accepted");
    Ok(Verdict::pass())
}

fn compound_query(ctx: &UnitContext) -> UnitOutcome {
    let orders = ctx.fixture("orders")?;
    let batch = (0..20)
        .map(|i| {
            doc!({
                "order": i,
                "status": if i % 2 == 0 { "shipped" } else { "pending" },
                "total": 10 * i,
                "customer": {"tier": if i % 4 == 0 { "gold" } else { "standard" }}
            })
        })
        .collect();
    ctx.session().insert_many(orders.name(), batch)?;
    let filter = Filter::eq("status", "shipped")
        .and("total", Predicate::Gte(50.0))
        .and("customer.tier", Predicate::Eq(Value::from("gold")));
    let matched = ctx.session().find(orders.name(), filter, None)?;
    let mut numbers: Vec<i64> = matched
        .iter()
        .filter_map(|d| d.get("order").and_then(Value::as_i64))
        .collect();
    numbers.sort_unstable();
    check!(numbers == vec![8, 12, 16], "compound filter matched {:?}", numbers);
    Ok(Verdict::pass())
}
