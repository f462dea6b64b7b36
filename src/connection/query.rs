use crate::connection::Document;
use regex::Regex;
use serde_json::Value;

/// Typed query filter. Values are always compared literally, so a string that
/// looks like an operator can never change the shape of the query.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<(String, Predicate)>,
}

#[derive(Debug, Clone)]
pub enum Predicate {
    Eq(Value),
    Ne(Value),
    Gt(f64),
    Gte(f64),
    Lt(f64),
    Lte(f64),
    Exists(bool),
    Matches(Regex),
    NotMatches(Regex),
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq<V: Into<Value>>(field: &str, value: V) -> Self {
        Self::all().and(field, Predicate::Eq(value.into()))
    }

    pub fn and(mut self, field: &str, predicate: Predicate) -> Self {
        self.clauses.push((field.to_owned(), predicate));
        self
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.clauses
            .iter()
            .all(|(field, predicate)| predicate.test(lookup(document, field)))
    }
}

impl Predicate {
    fn test(&self, value: Option<&Value>) -> bool {
        match self {
            Predicate::Eq(expected) => equals(value, expected),
            Predicate::Ne(expected) => !equals(value, expected),
            Predicate::Gt(bound) => number(value).map_or(false, |v| v > *bound),
            Predicate::Gte(bound) => number(value).map_or(false, |v| v >= *bound),
            Predicate::Lt(bound) => number(value).map_or(false, |v| v < *bound),
            Predicate::Lte(bound) => number(value).map_or(false, |v| v <= *bound),
            Predicate::Exists(expected) => value.map_or(false, |v| !v.is_null()) == *expected,
            Predicate::Matches(regex) => value
                .and_then(Value::as_str)
                .map_or(false, |s| regex.is_match(s)),
            Predicate::NotMatches(regex) => match value {
                Some(Value::String(s)) => !regex.is_match(s),
                Some(Value::Null) | None => false,
                Some(_) => true,
            },
        }
    }
}

fn equals(value: Option<&Value>, expected: &Value) -> bool {
    match (value, expected) {
        (None, Value::Null) => true,
        (None, _) => false,
        (Some(Value::Number(a)), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Some(actual), expected) => actual == expected,
    }
}

fn number(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64)
}

/// Resolves a dotted path such as `metadata.preferences.theme`.
pub fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

#[derive(Debug, Clone)]
pub enum Change {
    Set(String, Value),
    Inc(String, f64),
    Push(String, Value),
}

impl Change {
    pub fn apply(&self, document: &mut Document) -> Result<(), String> {
        match self {
            Change::Set(field, value) => {
                document.insert(field.clone(), value.clone());
            }
            Change::Inc(field, delta) => {
                let current = match document.get(field) {
                    None | Some(Value::Null) => 0.0,
                    Some(value) => value
                        .as_f64()
                        .ok_or_else(|| format!("cannot increment non-numeric field '{}'", field))?,
                };
                document.insert(field.clone(), numeric(current + delta));
            }
            Change::Push(field, value) => match document.get_mut(field) {
                Some(Value::Array(items)) => items.push(value.clone()),
                None | Some(Value::Null) => {
                    document.insert(field.clone(), Value::Array(vec![value.clone()]));
                }
                Some(_) => return Err(format!("cannot push to non-array field '{}'", field)),
            },
        }
        Ok(())
    }
}

fn numeric(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}

/// Collection validator: required fields plus per-field rules.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    required: Vec<String>,
    rules: Vec<(String, Rule)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Kind {
    String,
    Integer,
    Number,
}

#[derive(Debug, Clone)]
pub struct Rule {
    kind: Kind,
    minimum: Option<f64>,
    maximum: Option<f64>,
    pattern: Option<Regex>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, field: &str) -> Self {
        self.required.push(field.to_owned());
        self
    }

    pub fn field(mut self, field: &str, rule: Rule) -> Self {
        self.rules.push((field.to_owned(), rule));
        self
    }

    pub fn validate(&self, document: &Document) -> Result<(), String> {
        if let Some(missing) = self
            .required
            .iter()
            .find(|field| lookup(document, field).map_or(true, Value::is_null))
        {
            return Err(format!("missing required field '{}'", missing));
        }
        for (field, rule) in &self.rules {
            if let Some(value) = lookup(document, field) {
                rule.check(field, value)?;
            }
        }
        Ok(())
    }
}

impl Rule {
    fn of(kind: Kind) -> Self {
        Self {
            kind,
            minimum: None,
            maximum: None,
            pattern: None,
        }
    }

    pub fn string() -> Self {
        Self::of(Kind::String)
    }

    pub fn integer() -> Self {
        Self::of(Kind::Integer)
    }

    pub fn number() -> Self {
        Self::of(Kind::Number)
    }

    pub fn min(mut self, minimum: f64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    pub fn max(mut self, maximum: f64) -> Self {
        self.maximum = Some(maximum);
        self
    }

    pub fn pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    fn check(&self, field: &str, value: &Value) -> Result<(), String> {
        let kind_ok = match self.kind {
            Kind::String => value.is_string(),
            Kind::Integer => value.is_i64() || value.is_u64(),
            Kind::Number => value.is_number(),
        };
        if !kind_ok {
            return Err(format!("field '{}' must be of kind {:?}", field, self.kind));
        }
        if let Some(n) = value.as_f64() {
            if self.minimum.map_or(false, |min| n < min) || self.maximum.map_or(false, |max| n > max) {
                return Err(format!("field '{}' is out of range", field));
            }
        }
        if let (Some(pattern), Some(s)) = (&self.pattern, value.as_str()) {
            if !pattern.is_match(s) {
                return Err(format!("field '{}' does not match {}", field, pattern.as_str()));
            }
        }
        Ok(())
    }
}
