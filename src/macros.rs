/// Locks a mutex, recovering the guard if a panicking unit poisoned it.
macro_rules! lock {
    ($name: expr) => {
        match $name.lock() {
            Ok(locked) => locked,
            Err(poisoned) => poisoned.into_inner(),
        }
    };
}

/// Ends a unit body with a FAIL verdict when the condition does not hold.
macro_rules! check {
    ($cond: expr, $($arg: tt)+) => {
        if !$cond {
            return Ok($crate::app::unit::Verdict::fail(format!($($arg)+)));
        }
    };
}

/// Builds a JSON object document.
macro_rules! doc {
    ($($json: tt)+) => {
        match serde_json::json!($($json)+) {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        }
    };
}
