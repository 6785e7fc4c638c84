//! In-memory reference backend
//!
//! An ordered table map behind a read-write lock. Every handle created by
//! [`MemoryBackendFactory`] shares one store, modeling independent
//! connections to a single system under test.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{Backend, BackendFactory, BackendRole, FieldSet, Row};
use crate::utils::{InitError, OpError};

type Table = BTreeMap<String, Row>;

#[derive(Default)]
struct Store {
    tables: RwLock<BTreeMap<String, Table>>,
}

/// Handle onto an in-memory store.
pub struct InMemoryBackend {
    store: Arc<Store>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            store: Arc::new(Store::default()),
        }
    }

    /// Another handle onto the same store.
    pub fn handle(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }

    /// Number of records in a table.
    pub fn record_count(&self, table: &str) -> usize {
        self.store
            .tables
            .read()
            .get(table)
            .map_or(0, |t| t.len())
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn project(row: &Row, fields: Option<&FieldSet>) -> Row {
    match fields {
        Some(fields) => row
            .iter()
            .filter(|(name, _)| fields.contains(name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
        None => row.clone(),
    }
}

impl Backend for InMemoryBackend {
    fn read(
        &self,
        table: &str,
        key: &str,
        fields: Option<&FieldSet>,
    ) -> Result<Option<Row>, OpError> {
        let tables = self.store.tables.read();
        Ok(tables
            .get(table)
            .and_then(|t| t.get(key))
            .map(|row| project(row, fields)))
    }

    fn batch_read(
        &self,
        table: &str,
        keys: &[String],
        fields: Option<&FieldSet>,
    ) -> Result<Vec<Option<Row>>, OpError> {
        let tables = self.store.tables.read();
        let slots = keys
            .iter()
            .map(|key| {
                tables
                    .get(table)
                    .and_then(|t| t.get(key))
                    .map(|row| project(row, fields))
            })
            .collect();
        Ok(slots)
    }

    fn update(&self, table: &str, key: &str, values: &Row) -> Result<(), OpError> {
        let mut tables = self.store.tables.write();
        let row = tables
            .get_mut(table)
            .and_then(|t| t.get_mut(key))
            .ok_or_else(|| OpError::message(format!("no such record {table}/{key}")))?;
        for (name, value) in values {
            row.insert(name.clone(), value.clone());
        }
        Ok(())
    }

    fn insert(&self, table: &str, key: &str, values: &Row) -> Result<(), OpError> {
        let mut tables = self.store.tables.write();
        tables
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), values.clone());
        Ok(())
    }

    fn delete(&self, table: &str, key: &str) -> Result<(), OpError> {
        let mut tables = self.store.tables.write();
        tables
            .get_mut(table)
            .and_then(|t| t.remove(key))
            .ok_or_else(|| OpError::message(format!("no such record {table}/{key}")))?;
        Ok(())
    }

    fn scan(
        &self,
        table: &str,
        start_key: &str,
        record_count: usize,
        fields: Option<&FieldSet>,
    ) -> Result<Vec<Row>, OpError> {
        let tables = self.store.tables.read();
        let Some(t) = tables.get(table) else {
            return Ok(Vec::new());
        };
        let rows = t
            .range(start_key.to_string()..)
            .take(record_count)
            .map(|(_, row)| project(row, fields))
            .collect();
        Ok(rows)
    }

    fn batch_update(&self, table: &str, keys: &[String], value_sets: &[Row]) -> Result<(), OpError> {
        if keys.len() != value_sets.len() {
            return Err(OpError::message(format!(
                "batch update arity mismatch: {} keys, {} value sets",
                keys.len(),
                value_sets.len()
            )));
        }
        for (key, values) in keys.iter().zip(value_sets) {
            self.update(table, key, values)?;
        }
        Ok(())
    }
}

/// Factory handing every worker a handle onto one shared store.
pub struct MemoryBackendFactory {
    root: InMemoryBackend,
}

impl MemoryBackendFactory {
    pub fn new() -> Self {
        Self {
            root: InMemoryBackend::new(),
        }
    }

    /// Direct handle for seeding or inspecting the store.
    pub fn store(&self) -> InMemoryBackend {
        self.root.handle()
    }
}

impl Default for MemoryBackendFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendFactory for MemoryBackendFactory {
    fn create(&self, _role: BackendRole, _worker_id: usize) -> Result<Arc<dyn Backend>, InitError> {
        Ok(Arc::new(self.root.handle()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.as_bytes().to_vec()))
            .collect()
    }

    #[test]
    fn test_insert_read_roundtrip() {
        let backend = InMemoryBackend::new();
        backend
            .insert("usertable", "user1", &row(&[("field0", "a"), ("field1", "b")]))
            .unwrap();

        let got = backend.read("usertable", "user1", None).unwrap().unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got["field0"], b"a");

        assert!(backend.read("usertable", "absent", None).unwrap().is_none());
    }

    #[test]
    fn test_read_projects_fields() {
        let backend = InMemoryBackend::new();
        backend
            .insert("usertable", "user1", &row(&[("field0", "a"), ("field1", "b")]))
            .unwrap();

        let fields: FieldSet = ["field1".to_string()].into_iter().collect();
        let got = backend
            .read("usertable", "user1", Some(&fields))
            .unwrap()
            .unwrap();
        assert_eq!(got.len(), 1);
        assert!(got.contains_key("field1"));
    }

    #[test]
    fn test_update_missing_record_fails() {
        let backend = InMemoryBackend::new();
        let result = backend.update("usertable", "absent", &row(&[("field0", "x")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_scan_is_ordered_from_start_key() {
        let backend = InMemoryBackend::new();
        for i in 0..10 {
            backend
                .insert("usertable", &format!("user{i}"), &row(&[("field0", "v")]))
                .unwrap();
        }

        let rows = backend.scan("usertable", "user3", 4, None).unwrap();
        assert_eq!(rows.len(), 4);

        let rows = backend.scan("usertable", "user8", 4, None).unwrap();
        assert_eq!(rows.len(), 2);

        let rows = backend.scan("missing", "user0", 4, None).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_batch_ops() {
        let backend = InMemoryBackend::new();
        backend
            .insert("usertable", "user1", &row(&[("field0", "a")]))
            .unwrap();
        backend
            .insert("usertable", "user2", &row(&[("field0", "b")]))
            .unwrap();

        let keys = vec!["user1".to_string(), "absent".to_string(), "user2".to_string()];
        let slots = backend.batch_read("usertable", &keys, None).unwrap();
        assert_eq!(slots.len(), 3);
        assert!(slots[0].is_some());
        assert!(slots[1].is_none());

        let updates = vec!["user1".to_string(), "user2".to_string()];
        backend
            .batch_update(
                "usertable",
                &updates,
                &[row(&[("field0", "x")]), row(&[("field0", "y")])],
            )
            .unwrap();
        let got = backend.read("usertable", "user2", None).unwrap().unwrap();
        assert_eq!(got["field0"], b"y");

        let mismatched = backend.batch_update("usertable", &updates, &[row(&[("field0", "x")])]);
        assert!(mismatched.is_err());
    }

    #[test]
    fn test_factory_handles_share_store() {
        let factory = MemoryBackendFactory::new();
        let a = factory.create(BackendRole::Write, 0).unwrap();
        let b = factory.create(BackendRole::Read, 1).unwrap();

        a.insert("usertable", "user1", &row(&[("field0", "a")])).unwrap();
        assert!(b.read("usertable", "user1", None).unwrap().is_some());
    }
}
