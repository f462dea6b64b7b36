use crate::app::context::UnitContext;
use crate::app::unit::{unit, Finding, SuiteUnit, UnitOutcome, Verdict};
use crate::connection::{Command, DriverError, Filter, Predicate, Role, Session};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::Arc;

const MAX_INPUT_LEN: usize = 50;

lazy_static! {
    static ref UNSAFE_INPUT: Regex = Regex::new(r"[$;{}]").expect("static pattern");
}

pub fn units() -> Vec<Arc<dyn SuiteUnit>> {
    vec![
        unit("Authentication", authentication),
        unit("Injection Prevention", injection_prevention),
        unit("Input Validation", input_validation),
        unit("Read-Only Role", read_only_role),
        unit("Collection Creation Permission", creation_permission),
    ]
}

/// Accepts plain strings of bounded length without query metacharacters.
pub fn is_safe_input(input: &Value) -> bool {
    match input {
        Value::String(s) => s.chars().count() <= MAX_INPUT_LEN && !UNSAFE_INPUT.is_match(s),
        _ => false,
    }
}

/// A database user that exists for the lifetime of the guard.
struct ScopedUser<'a> {
    session: &'a dyn Session,
    name: String,
}

impl<'a> ScopedUser<'a> {
    fn create(session: &'a dyn Session, name: String, password: &str, role: Role) -> Result<Self, DriverError> {
        session.execute(Command::DropUser { user: name.clone() })?;
        session.execute(Command::CreateUser {
            user: name.clone(),
            password: password.to_owned(),
            role,
        })?;
        Ok(Self { session, name })
    }
}

impl<'a> Drop for ScopedUser<'a> {
    fn drop(&mut self) {
        if let Err(e) = self.session.execute(Command::DropUser { user: self.name.clone() }) {
            warn!("Failed to drop test user '{}': {}", self.name, e);
        }
    }
}

fn authentication(ctx: &UnitContext) -> UnitOutcome {
    let user = ScopedUser::create(ctx.session(), ctx.collection("app_user"), "s3cret-pass", Role::ReadWrite)?;
    let mut findings = Vec::new();

    let anonymous = ctx.connect()?;
    findings.push(match anonymous.ping() {
        Ok(()) => Finding::pass("Unauthenticated Connection", "server answered without credentials"),
        Err(e) => Finding::fail("Unauthenticated Connection", format!("connection failed: {}", e)),
    });

    let valid = ctx.connect()?;
    findings.push(match valid.authenticate(&user.name, "s3cret-pass") {
        Ok(role) => Finding::expect(
            role == Role::ReadWrite,
            "Valid Credentials",
            format!("authenticated with role {:?}", role),
        ),
        Err(e) => Finding::fail("Valid Credentials", format!("rejected valid credentials: {}", e)),
    });

    let invalid = ctx.connect()?;
    findings.push(match invalid.authenticate(&user.name, "wrong-pass") {
        Ok(_) => Finding::fail("Invalid Credentials", "accepted a wrong password, security risk"),
        Err(DriverError::Unauthorized(reason)) => {
            Finding::pass("Invalid Credentials", format!("correctly rejected: {}", reason))
        }
        Err(e) => return Err(e.into()),
    });

    let unknown = ctx.connect()?;
    findings.push(match unknown.authenticate("invalid_user", "invalid_pass") {
        Ok(_) => Finding::fail("Unknown User", "accepted credentials of a user that does not exist"),
        Err(DriverError::Unauthorized(reason)) => Finding::pass("Unknown User", format!("correctly rejected: {}", reason)),
        Err(e) => return Err(e.into()),
    });

    Ok(Verdict::from_findings(findings))
}

fn injection_prevention(ctx: &UnitContext) -> UnitOutcome {
    let accounts = ctx.fixture("accounts")?;
    ctx.session().insert_many(
        accounts.name(),
        vec![
            doc!({"username": "admin", "password": "admin123", "role": "admin"}),
            doc!({"username": "user1", "password": "password123", "role": "user"}),
            doc!({"username": "user2", "password": "secret456", "role": "user"}),
        ],
    )?;
    let mut findings = Vec::new();

    let safe = ctx.session().find_one(accounts.name(), Filter::eq("username", "admin"))?;
    findings.push(Finding::expect(
        safe.as_ref().and_then(|d| d.get("username")) == Some(&Value::from("admin")),
        "Safe Query Execution",
        "literal username lookup returned the expected account",
    ));

    let bypass = ctx.session().find_one(
        accounts.name(),
        Filter::eq("username", "admin").and("password", Predicate::Eq(json!({"$ne": null}))),
    )?;
    findings.push(Finding::expect(
        bypass.is_none(),
        "NoSQL Injection Prevention",
        if bypass.is_none() {
            "operator-shaped value was compared literally"
        } else {
            "operator-shaped value bypassed the password check"
        },
    ));

    let piggyback = ctx
        .session()
        .count(accounts.name(), Filter::eq("username", "admin'; db.dropDatabase(); '"))?;
    let survivors = ctx.session().count(accounts.name(), Filter::all())?;
    findings.push(Finding::expect(
        piggyback == 0 && survivors == 3,
        "Command Piggybacking",
        format!("{} matches, {} accounts intact", piggyback, survivors),
    ));

    Ok(Verdict::from_findings(findings))
}

fn input_validation(_: &UnitContext) -> UnitOutcome {
    let cases = vec![
        (json!("admin"), true),
        (json!("user1"), true),
        (json!("$ne"), false),
        (json!("admin; drop table users;"), false),
        (json!({"$ne": null}), false),
        (json!("x".repeat(MAX_INPUT_LEN + 1)), false),
    ];
    let findings = cases
        .into_iter()
        .map(|(input, expected)| {
            let accepted = is_safe_input(&input);
            Finding::expect(
                accepted == expected,
                format!("Input {}", input),
                format!("accepted={}, expected={}", accepted, expected),
            )
        })
        .collect();
    Ok(Verdict::from_findings(findings))
}

fn read_only_role(ctx: &UnitContext) -> UnitOutcome {
    let reports = ctx.fixture("reports")?;
    ctx.session().insert_one(reports.name(), doc!({"title": "quarterly", "public": true}))?;
    let reader = ScopedUser::create(ctx.session(), ctx.collection("reader"), "read-only", Role::Read)?;

    let session = ctx.connect()?;
    session.authenticate(&reader.name, "read-only")?;
    let mut findings = Vec::new();

    findings.push(match session.count(reports.name(), Filter::all()) {
        Ok(1) => Finding::pass("Read Access", "reader can query documents"),
        Ok(n) => Finding::fail("Read Access", format!("reader saw {} documents, expected 1", n)),
        Err(e) => Finding::fail("Read Access", format!("reader cannot query: {}", e)),
    });
    findings.push(match session.insert_one(reports.name(), doc!({"title": "forged"})) {
        Ok(_) => Finding::fail("Write Denied", "read-only user inserted a document"),
        Err(DriverError::Unauthorized(reason)) => Finding::pass("Write Denied", reason),
        Err(e) => Finding::fail("Write Denied", format!("unexpected error: {}", e)),
    });
    findings.push(
        match session.execute(Command::CreateUser {
            user: ctx.collection("escalated"),
            password: "x".to_owned(),
            role: Role::Admin,
        }) {
            Ok(_) => Finding::fail("Privilege Escalation", "read-only user created an admin"),
            Err(DriverError::Unauthorized(reason)) => Finding::pass("Privilege Escalation", reason),
            Err(e) => Finding::fail("Privilege Escalation", format!("unexpected error: {}", e)),
        },
    );

    let remaining = ctx.session().count(reports.name(), Filter::all())?;
    findings.push(Finding::expect(
        remaining == 1,
        "Data Unchanged",
        format!("{} documents after the denied write", remaining),
    ));
    Ok(Verdict::from_findings(findings))
}

fn creation_permission(ctx: &UnitContext) -> UnitOutcome {
    let probe = ctx.fixture("permission_check")?;
    ctx.session().create_collection(probe.name(), None)?;
    ctx.session().insert_one(probe.name(), doc!({"test": "permission_check"}))?;
    let stored = ctx.session().count(probe.name(), Filter::eq("test", "permission_check"))?;
    Ok(Verdict::from_findings(vec![Finding::expect(
        stored == 1,
        "Collection Creation Permission",
        format!("created collection and stored {} document", stored),
    )]))
}
