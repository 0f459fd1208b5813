use std::collections::HashMap;

use stq_common::{Result, StqError};
use stq_planner::{LogicalPlan, RelationProvider};

/// Named relations visible to queries of one compiler session.
///
/// Entries live only as long as the catalog; registering an existing name replaces it.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    tables: HashMap<String, LogicalPlan>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }

    /// Insert or overwrite `name`. Returns `true` when an entry was replaced.
    pub fn register(&mut self, name: impl Into<String>, plan: LogicalPlan) -> bool {
        self.tables.insert(name.into(), plan).is_some()
    }

    /// Remove `name` if present. Returns `true` when an entry was removed.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.tables.remove(name).is_some()
    }

    pub fn lookup(&self, name: &str) -> Result<&LogicalPlan> {
        self.tables
            .get(name)
            .ok_or_else(|| StqError::NotFound(format!("table {name}")))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl RelationProvider for Catalog {
    fn relation_plan(&self, name: &str) -> Result<LogicalPlan> {
        self.lookup(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_lookup_unregister() {
        let mut cat = Catalog::new();
        assert!(!cat.register("a", LogicalPlan::table("x")));
        assert_eq!(cat.lookup("a").expect("registered"), &LogicalPlan::table("x"));

        assert!(cat.register("a", LogicalPlan::table("y")));
        assert_eq!(cat.lookup("a").expect("replaced"), &LogicalPlan::table("y"));

        assert!(cat.unregister("a"));
        assert!(!cat.unregister("a"));
        assert!(matches!(cat.lookup("a"), Err(StqError::NotFound(_))));
        assert!(matches!(cat.lookup("never"), Err(StqError::NotFound(_))));
    }

    #[test]
    fn names_are_sorted() {
        let mut cat = Catalog::new();
        cat.register("b", LogicalPlan::table("b"));
        cat.register("a", LogicalPlan::table("a"));
        assert_eq!(cat.table_names(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(cat.len(), 2);
        assert!(cat.contains("a") && !cat.is_empty());
    }
}
