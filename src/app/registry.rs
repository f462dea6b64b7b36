use crate::app::error::Error;
use crate::app::unit::{Category, SuiteUnit};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Statically populated mapping from suite category to its ordered units.
#[derive(Default)]
pub struct Registry {
    suites: BTreeMap<Category, Vec<Arc<dyn SuiteUnit>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a unit to a category. Unit names are unique per category.
    pub fn register(&mut self, category: Category, unit: Arc<dyn SuiteUnit>) -> Result<(), Error> {
        let units = self.suites.entry(category).or_default();
        if units.iter().any(|u| u.name() == unit.name()) {
            return Err(Error::DuplicateUnit {
                category,
                name: unit.name().to_owned(),
            });
        }
        trace!("Registered unit '{}' in the {} suite", unit.name(), category);
        units.push(unit);
        Ok(())
    }

    pub fn register_all<I>(&mut self, category: Category, units: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = Arc<dyn SuiteUnit>>,
    {
        units.into_iter().try_for_each(|unit| self.register(category, unit))
    }

    /// Units of a category in registration order; empty when none were added.
    pub fn get(&self, category: Category) -> &[Arc<dyn SuiteUnit>] {
        self.suites.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resolves a category by name, failing for names outside the known set.
    pub fn lookup(&self, name: &str) -> Result<(Category, &[Arc<dyn SuiteUnit>]), Error> {
        let category = name.parse::<Category>()?;
        Ok((category, self.get(category)))
    }

    pub fn categories(&self) -> BTreeSet<Category> {
        self.suites.keys().copied().collect()
    }

    pub fn total(&self) -> usize {
        self.suites.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::app::unit::{unit, Verdict};

    fn passing(name: &str) -> Arc<dyn SuiteUnit> {
        unit(name, |_| Ok(Verdict::pass()))
    }

    #[test]
    fn test_registration_keeps_order() {
        let mut registry = Registry::new();
        registry
            .register_all(
                Category::Functional,
                vec![passing("create"), passing("read"), passing("delete")],
            )
            .unwrap();
        let names: Vec<&str> = registry.get(Category::Functional).iter().map(|u| u.name()).collect();
        assert_eq!(names, vec!["create", "read", "delete"]);
        assert_eq!(registry.total(), 3);
        assert_eq!(
            registry.categories().into_iter().collect::<Vec<_>>(),
            vec![Category::Functional]
        );
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let mut registry = Registry::new();
        registry.register(Category::Security, passing("auth")).unwrap();
        let err = registry.register(Category::Security, passing("auth")).unwrap_err();
        assert!(matches!(err, Error::DuplicateUnit { .. }));
        assert_eq!(registry.get(Category::Security).len(), 1);
        assert!(registry.register(Category::Validation, passing("auth")).is_ok());
    }

    #[test]
    fn test_lookup() {
        let mut registry = Registry::new();
        registry.register(Category::Performance, passing("insert")).unwrap();
        let (category, units) = registry.lookup("performance").unwrap();
        assert_eq!(category, Category::Performance);
        assert_eq!(units.len(), 1);
        assert!(registry.lookup("validation").unwrap().1.is_empty());
        assert!(matches!(registry.lookup("nope"), Err(Error::UnknownCategory(_))));
    }
}
