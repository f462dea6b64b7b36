//! Built-in QA suites for document databases.

pub mod functional;
pub mod performance;
pub mod security;
pub mod validation;

use crate::app::error::Error;
use crate::app::registry::Registry;
use crate::app::unit::Category;
use crate::configuration::settings::Workload;
use crate::connection::Document;

const DEPARTMENTS: [&str; 5] = ["Engineering", "Sales", "Marketing", "HR", "Finance"];
const THEMES: [&str; 2] = ["light", "dark"];
const LANGUAGES: [&str; 3] = ["en", "es", "fr"];

/// Registers every built-in unit. Unit names are fixed here, so a duplicate
/// is a programming error surfaced at startup.
pub fn builtin(workload: &Workload) -> Result<Registry, Error> {
    let mut registry = Registry::new();
    registry.register_all(Category::Functional, functional::units())?;
    registry.register_all(Category::Performance, performance::units(workload))?;
    registry.register_all(Category::Security, security::units())?;
    registry.register_all(Category::Validation, validation::units())?;
    debug!("Registered {} built-in units", registry.total());
    Ok(registry)
}

/// Deterministic user document number `i`.
pub fn sample_user(i: usize) -> Document {
    doc!({
        "user_id": 1_000 + i,
        "name": format!("User_{}", i),
        "email": format!("user{}@example.com", i),
        "age": 20 + (i % 50),
        "department": DEPARTMENTS[i % DEPARTMENTS.len()],
        "salary": 50_000 + i * 100,
        "metadata": {
            "preferences": {
                "theme": THEMES[i % THEMES.len()],
                "language": LANGUAGES[i % LANGUAGES.len()]
            }
        }
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::app::context::CancellationToken;
    use crate::app::executor::Executor;
    use crate::app::unit::Status;
    use crate::connection::memory::MemoryDriver;
    use crate::connection::pool::SessionPool;
    use std::sync::Arc;
    use std::time::Duration;

    fn small() -> Workload {
        Workload {
            documents: 60,
            iterations: 3,
            operations: 12,
            clients: 3,
        }
    }

    #[test]
    fn test_builtin_registry_covers_every_category() {
        let registry = builtin(&small()).unwrap();
        for category in Category::ALL.iter() {
            assert!(!registry.get(*category).is_empty(), "{} has no units", category);
        }
    }

    #[test]
    fn test_builtin_suites_pass_against_the_memory_store() {
        let registry = builtin(&small()).unwrap();
        let driver = MemoryDriver::new("builtin");
        let pool = SessionPool::open(Arc::new(driver), 4).unwrap();
        let executor = Executor::new(
            pool,
            4,
            Duration::from_secs(20),
            CancellationToken::new(),
            Arc::new(small()),
        );
        for category in Category::ALL.iter() {
            let result = executor.execute(*category, registry.get(*category));
            for record in &result.units {
                assert_eq!(
                    record.result.status,
                    Status::Pass,
                    "{} '{}': {:?}",
                    category,
                    record.name,
                    record.result.detail
                );
            }
        }
    }

    #[test]
    fn test_sample_user_is_deterministic() {
        assert_eq!(sample_user(7), sample_user(7));
        assert_eq!(sample_user(7)["department"], "Marketing");
        assert_eq!(sample_user(7)["user_id"], 1_007);
    }
}
