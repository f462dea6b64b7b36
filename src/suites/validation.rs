use crate::app::context::UnitContext;
use crate::app::unit::{unit, Finding, SuiteUnit, UnitOutcome, Verdict};
use crate::connection::{Change, Document, DriverError, Filter, Predicate, Rule, Schema, Session};
use crate::suites::sample_user;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

const REQUIRED_FIELDS: [&str; 3] = ["user_id", "name", "email"];
const OPENING_BALANCE: i64 = 1_000;

lazy_static! {
    static ref EMAIL: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("Regex compilation error");
}

pub fn units() -> Vec<Arc<dyn SuiteUnit>> {
    vec![
        unit("Schema Validation", schema_validation),
        unit("Data Integrity", data_integrity),
        unit("Unique Constraint", unique_constraint),
        unit("Data Type Consistency", type_consistency),
        unit("Data Quality Audit", data_quality_audit),
    ]
}

fn person_schema() -> Schema {
    Schema::new()
        .require("name")
        .require("email")
        .require("age")
        .field("name", Rule::string())
        .field("email", Rule::string().pattern(EMAIL.clone()))
        .field("age", Rule::integer().min(0.0).max(150.0))
        .field("salary", Rule::number().min(0.0))
}

/// PASS when the store refuses the document, FAIL when it stores it.
fn rejected(session: &dyn Session, collection: &str, check: &str, document: Document) -> Result<Finding, DriverError> {
    match session.insert_one(collection, document) {
        Ok(id) => Ok(Finding::fail(check, format!("invalid document was accepted as {}", id))),
        Err(DriverError::Rejected(reason)) => Ok(Finding::pass(check, format!("correctly rejected: {}", reason))),
        Err(e) => Err(e),
    }
}

fn schema_validation(ctx: &UnitContext) -> UnitOutcome {
    let people = ctx.fixture_with("schema_test", Some(person_schema()))?;
    let session = ctx.session();
    let mut findings = Vec::new();

    findings.push(
        match session.insert_one(
            people.name(),
            doc!({"name": "John Doe", "email": "john.doe@example.com", "age": 30, "salary": 75000.5}),
        ) {
            Ok(id) => Finding::pass("Valid Document Insertion", format!("inserted with id {}", id)),
            Err(e) => Finding::fail("Valid Document Insertion", format!("valid document refused: {}", e)),
        },
    );
    findings.push(rejected(
        session,
        people.name(),
        "Missing Required Field Rejection",
        doc!({"name": "Jane Doe", "email": "jane@example.com"}),
    )?);
    findings.push(rejected(
        session,
        people.name(),
        "Invalid Email Format Rejection",
        doc!({"name": "Bob Smith", "email": "invalid-email-format", "age": 25}),
    )?);
    findings.push(rejected(
        session,
        people.name(),
        "Age Range Validation",
        doc!({"name": "Old Timer", "email": "old@example.com", "age": 200}),
    )?);
    findings.push(rejected(
        session,
        people.name(),
        "Negative Salary Rejection",
        doc!({"name": "Debtor", "email": "debtor@example.com", "age": 40, "salary": -10}),
    )?);

    let stored = session.count(people.name(), Filter::all())?;
    findings.push(Finding::expect(
        stored == 1,
        "Only Valid Documents Stored",
        format!("{} document(s) in the collection", stored),
    ));
    Ok(Verdict::from_findings(findings))
}

fn data_integrity(ctx: &UnitContext) -> UnitOutcome {
    let accounts = ctx.fixture("integrity_test")?;
    let session = ctx.session();
    let id = session.insert_one(
        accounts.name(),
        doc!({"user_id": "user_001", "name": "Alice Johnson", "balance": OPENING_BALANCE, "transactions": []}),
    )?;

    let movements: [(&str, i64); 3] = [("withdrawal", -100), ("deposit", 50), ("withdrawal", -75)];
    for (kind, amount) in movements.iter() {
        let modified = session.update(
            accounts.name(),
            Filter::eq("_id", id.clone()),
            vec![
                Change::Inc("balance".into(), *amount as f64),
                Change::Push("transactions".into(), json!({"type": kind, "amount": amount.abs()})),
            ],
            false,
        )?;
        check!(modified == 1, "update of {} {} touched {} documents", kind, amount, modified);
    }

    let expected = OPENING_BALANCE + movements.iter().map(|(_, amount)| amount).sum::<i64>();
    let account = session.find_one(accounts.name(), Filter::eq("_id", id))?;
    let balance = account.as_ref().and_then(|d| d.get("balance")).and_then(Value::as_i64);
    let transactions = account
        .as_ref()
        .and_then(|d| d.get("transactions"))
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    Ok(Verdict::from_findings(vec![Finding::expect(
        balance == Some(expected) && transactions == movements.len(),
        "Data Consistency After Updates",
        format!(
            "balance {:?} (expected {}), {} transactions",
            balance, expected, transactions
        ),
    )]))
}

fn unique_constraint(ctx: &UnitContext) -> UnitOutcome {
    let users = ctx.fixture("unique_test")?;
    let session = ctx.session();
    session.create_index(users.name(), "email", true)?;
    session.insert_one(users.name(), doc!({"name": "User 1", "email": "unique@example.com"}))?;
    let mut findings = vec![rejected(
        session,
        users.name(),
        "Unique Index Constraint",
        doc!({"name": "User 2", "email": "unique@example.com"}),
    )?];
    let stored = session.count(users.name(), Filter::eq("email", "unique@example.com"))?;
    findings.push(Finding::expect(
        stored == 1,
        "No Duplicate Stored",
        format!("{} document(s) with the shared email", stored),
    ));
    Ok(Verdict::from_findings(findings))
}

fn type_consistency(ctx: &UnitContext) -> UnitOutcome {
    let typed = ctx.fixture("type_test")?;
    let session = ctx.session();
    session.insert_many(
        typed.name(),
        vec![
            doc!({"field": "string_value", "type": "string"}),
            doc!({"field": 123, "type": "integer"}),
            doc!({"field": 123.45, "type": "float"}),
            doc!({"field": true, "type": "boolean"}),
        ],
    )?;
    let findings = session
        .find(typed.name(), Filter::all().and("type", Predicate::Exists(true)), None)?
        .into_iter()
        .map(|document| {
            let kind = document.get("type").and_then(Value::as_str).unwrap_or("").to_owned();
            let value = document.get("field").cloned().unwrap_or(Value::Null);
            let preserved = match kind.as_str() {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "float" => value.is_f64(),
                "boolean" => value.is_boolean(),
                _ => false,
            };
            Finding::expect(preserved, format!("Type {}", kind), format!("stored value {}", value))
        })
        .collect::<Vec<_>>();
    check!(findings.len() == 4, "expected 4 typed documents, found {}", findings.len());
    Ok(Verdict::from_findings(findings))
}

/// Counts of the data-quality problems found in a collection.
#[derive(Debug, Default)]
struct Audit {
    total: usize,
    missing: BTreeMap<&'static str, usize>,
    duplicate_emails: usize,
    invalid_emails: usize,
}

impl Audit {
    fn run(session: &dyn Session, collection: &str) -> Result<Self, DriverError> {
        let mut audit = Audit {
            total: session.count(collection, Filter::all())?,
            ..Audit::default()
        };
        for field in REQUIRED_FIELDS.iter() {
            let missing = session.count(collection, Filter::all().and(field, Predicate::Exists(false)))?;
            audit.missing.insert(*field, missing);
        }
        let mut seen: BTreeMap<String, usize> = BTreeMap::new();
        for document in session.find(collection, Filter::all().and("email", Predicate::Exists(true)), None)? {
            if let Some(email) = document.get("email").and_then(Value::as_str) {
                *seen.entry(email.to_owned()).or_default() += 1;
            }
        }
        audit.duplicate_emails = seen.values().filter(|count| **count > 1).count();
        audit.invalid_emails = session.count(collection, Filter::all().and("email", Predicate::NotMatches(EMAIL.clone())))?;
        Ok(audit)
    }

    fn problems(&self) -> usize {
        self.missing.values().sum::<usize>() + self.duplicate_emails + self.invalid_emails
    }

    fn percentage(&self, count: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 * 100.0 / self.total as f64
        }
    }

    fn findings(&self) -> Vec<Finding> {
        let mut findings: Vec<Finding> = self
            .missing
            .iter()
            .map(|(field, count)| {
                Finding::expect(
                    *count == 0,
                    format!("Missing {}", field),
                    format!("{} documents ({:.2}%)", count, self.percentage(*count)),
                )
            })
            .collect();
        findings.push(Finding::expect(
            self.duplicate_emails == 0,
            "Duplicate emails",
            format!("{} addresses used more than once", self.duplicate_emails),
        ));
        findings.push(Finding::expect(
            self.invalid_emails == 0,
            "Invalid email format",
            format!(
                "{} documents ({:.2}%)",
                self.invalid_emails,
                self.percentage(self.invalid_emails)
            ),
        ));
        findings
    }
}

fn data_quality_audit(ctx: &UnitContext) -> UnitOutcome {
    let documents = ctx.workload().documents;
    let clean = ctx.fixture("quality_test")?;
    let session = ctx.session();
    session.insert_many(clean.name(), (0..documents).map(sample_user).collect())?;
    ctx.checkpoint()?;
    let audit = Audit::run(session, clean.name())?;

    // The audit must also notice problems when they exist.
    let seeded = ctx.fixture("quality_control")?;
    session.insert_many(
        seeded.name(),
        vec![
            doc!({"user_id": 1, "name": "Ok", "email": "ok@example.com"}),
            doc!({"user_id": 2, "name": "Twin", "email": "ok@example.com"}),
            doc!({"user_id": 3, "email": "no-at-sign"}),
        ],
    )?;
    let control = Audit::run(session, seeded.name())?;

    let mut findings = audit.findings();
    findings.push(Finding::expect(
        control.duplicate_emails == 1 && control.invalid_emails == 1 && control.missing.get("name") == Some(&1),
        "Audit Detects Seeded Problems",
        format!("{} problems found in the control set", control.problems()),
    ));
    Ok(Verdict::from_findings(findings)
        .metric("documents", audit.total as f64)
        .metric("problems", audit.problems() as f64))
}
