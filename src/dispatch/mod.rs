//! Backend dispatcher
//!
//! Routes each logical operation to the correct backend instance and
//! applies the fixed fallback rules when a backend lacks a capability.
//! Failures come back as error values, never as panics past this
//! boundary; construction and `init()` failures stay fatal and are
//! handled by the worker lifecycle instead.

use std::sync::Arc;

use tracing::error;

use crate::backend::{Backend, FieldSet, Row};
use crate::utils::OpError;

/// Per-worker operation router.
///
/// Read traffic goes to the read backend, which may be the write backend
/// itself when configuration aliases the two roles. All mutations go to
/// the write backend: correctness of subsequent reads depends on a single
/// writer of record. `scan` is also pinned to the write backend, since
/// not every read backend implements an ordered range scan; callers must
/// not assume scan reflects the read backend's view.
pub struct BackendDispatcher {
    read: Arc<dyn Backend>,
    write: Arc<dyn Backend>,
    fields: FieldSet,
}

impl BackendDispatcher {
    pub fn new(read: Arc<dyn Backend>, write: Arc<dyn Backend>, fields: FieldSet) -> Self {
        Self { read, write, fields }
    }

    /// Whether read and write are the same backend instance.
    pub fn aliased(&self) -> bool {
        Arc::ptr_eq(&self.read, &self.write)
    }

    fn resolve<'a>(&'a self, fields: Option<&'a FieldSet>) -> &'a FieldSet {
        fields.unwrap_or(&self.fields)
    }

    fn observe<T>(op: &str, outcome: Result<T, OpError>) -> Result<T, OpError> {
        if let Err(OpError::Backend(cause)) = &outcome {
            error!("{op} failed: {cause}");
        }
        outcome
    }

    pub fn read(
        &self,
        table: &str,
        key: &str,
        fields: Option<&FieldSet>,
    ) -> Result<Option<Row>, OpError> {
        Self::observe("read", self.read.read(table, key, Some(self.resolve(fields))))
    }

    pub fn batch_read(
        &self,
        table: &str,
        keys: &[String],
        fields: Option<&FieldSet>,
    ) -> Result<Vec<Option<Row>>, OpError> {
        Self::observe(
            "batch read",
            self.read.batch_read(table, keys, Some(self.resolve(fields))),
        )
    }

    pub fn update(&self, table: &str, key: &str, values: &Row) -> Result<(), OpError> {
        Self::observe("update", self.write.update(table, key, values))
    }

    pub fn insert(&self, table: &str, key: &str, values: &Row) -> Result<(), OpError> {
        Self::observe("insert", self.write.insert(table, key, values))
    }

    pub fn delete(&self, table: &str, key: &str) -> Result<(), OpError> {
        Self::observe("delete", self.write.delete(table, key))
    }

    pub fn scan(
        &self,
        table: &str,
        start_key: &str,
        record_count: usize,
        fields: Option<&FieldSet>,
    ) -> Result<Vec<Row>, OpError> {
        Self::observe(
            "scan",
            self.write
                .scan(table, start_key, record_count, Some(self.resolve(fields))),
        )
    }

    pub fn batch_update(
        &self,
        table: &str,
        keys: &[String],
        value_sets: &[Row],
    ) -> Result<(), OpError> {
        Self::observe("batch update", self.write.batch_update(table, keys, value_sets))
    }

    /// Release backend resources, read side first when distinct.
    ///
    /// Both teardowns are attempted even if the first fails; each failure
    /// is logged and the first is returned.
    pub fn cleanup(&self) -> Result<(), OpError> {
        let mut first: Option<OpError> = None;

        if !self.aliased() {
            if let Err(e) = self.read.cleanup() {
                error!("read backend cleanup failed: {e}");
                first = Some(e);
            }
        }
        if let Err(e) = self.write.cleanup() {
            error!("write backend cleanup failed: {e}");
            first.get_or_insert(e);
        }

        match first {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Status;
    use parking_lot::Mutex;

    /// Records every call it receives; batch support is optional.
    struct RecordingBackend {
        calls: Mutex<Vec<String>>,
        batch_capable: bool,
        fail_cleanup: bool,
    }

    impl RecordingBackend {
        fn new(batch_capable: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                batch_capable,
                fail_cleanup: false,
            })
        }

        fn failing_cleanup() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                batch_capable: true,
                fail_cleanup: true,
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        fn log(&self, call: String) {
            self.calls.lock().push(call);
        }
    }

    impl Backend for RecordingBackend {
        fn cleanup(&self) -> Result<(), OpError> {
            self.log("cleanup".to_string());
            if self.fail_cleanup {
                return Err(OpError::message("cleanup refused"));
            }
            Ok(())
        }

        fn read(
            &self,
            _table: &str,
            key: &str,
            fields: Option<&FieldSet>,
        ) -> Result<Option<Row>, OpError> {
            self.log(format!("read:{key}:{}", fields.map_or(0, |f| f.len())));
            Ok(None)
        }

        fn batch_read(
            &self,
            _table: &str,
            keys: &[String],
            _fields: Option<&FieldSet>,
        ) -> Result<Vec<Option<Row>>, OpError> {
            if !self.batch_capable {
                return Err(OpError::Unsupported);
            }
            self.log(format!("batch_read:{}", keys.len()));
            Ok(vec![None; keys.len()])
        }

        fn update(&self, _table: &str, key: &str, _values: &Row) -> Result<(), OpError> {
            self.log(format!("update:{key}"));
            Ok(())
        }

        fn insert(&self, _table: &str, key: &str, _values: &Row) -> Result<(), OpError> {
            self.log(format!("insert:{key}"));
            Ok(())
        }

        fn delete(&self, _table: &str, key: &str) -> Result<(), OpError> {
            self.log(format!("delete:{key}"));
            Ok(())
        }

        fn scan(
            &self,
            _table: &str,
            start_key: &str,
            _record_count: usize,
            _fields: Option<&FieldSet>,
        ) -> Result<Vec<Row>, OpError> {
            self.log(format!("scan:{start_key}"));
            Ok(Vec::new())
        }

        fn batch_update(
            &self,
            _table: &str,
            keys: &[String],
            _value_sets: &[Row],
        ) -> Result<(), OpError> {
            if !self.batch_capable {
                return Err(OpError::Unsupported);
            }
            self.log(format!("batch_update:{}", keys.len()));
            Ok(())
        }
    }

    fn fields(n: usize) -> FieldSet {
        (0..n).map(|i| format!("field{i}")).collect()
    }

    #[test]
    fn test_routing_with_distinct_backends() {
        let read = RecordingBackend::new(true);
        let write = RecordingBackend::new(true);
        let dispatcher = BackendDispatcher::new(
            Arc::clone(&read) as Arc<dyn Backend>,
            Arc::clone(&write) as Arc<dyn Backend>,
            fields(3),
        );
        assert!(!dispatcher.aliased());

        let keys = vec!["k0".to_string(), "k1".to_string()];
        dispatcher.read("t", "k0", None).unwrap();
        dispatcher.batch_read("t", &keys, None).unwrap();
        dispatcher.update("t", "k0", &Row::new()).unwrap();
        dispatcher.insert("t", "k1", &Row::new()).unwrap();
        dispatcher.delete("t", "k0").unwrap();
        dispatcher.scan("t", "k0", 10, None).unwrap();
        dispatcher
            .batch_update("t", &keys, &[Row::new(), Row::new()])
            .unwrap();

        // Reads land only on the read instance.
        assert_eq!(read.calls(), vec!["read:k0:3", "batch_read:2"]);
        // Mutations and scan land only on the write instance.
        assert_eq!(
            write.calls(),
            vec!["update:k0", "insert:k1", "delete:k0", "scan:k0", "batch_update:2"]
        );
    }

    #[test]
    fn test_field_substitution_and_passthrough() {
        let read = RecordingBackend::new(true);
        let write = RecordingBackend::new(true);
        let dispatcher = BackendDispatcher::new(
            Arc::clone(&read) as Arc<dyn Backend>,
            write as Arc<dyn Backend>,
            fields(5),
        );

        // No explicit field list: the full known set is substituted.
        dispatcher.read("t", "a", None).unwrap();
        // Explicit list passes through untouched.
        let explicit = fields(2);
        dispatcher.read("t", "b", Some(&explicit)).unwrap();

        assert_eq!(read.calls(), vec!["read:a:5", "read:b:2"]);
    }

    #[test]
    fn test_aliased_dispatcher() {
        let backend = RecordingBackend::new(true);
        let shared: Arc<dyn Backend> = backend.clone();
        let dispatcher = BackendDispatcher::new(Arc::clone(&shared), shared, fields(1));
        assert!(dispatcher.aliased());

        dispatcher.cleanup().unwrap();
        // Aliased instances are torn down once, not twice.
        assert_eq!(backend.calls(), vec!["cleanup"]);
    }

    #[test]
    fn test_unsupported_is_not_an_error() {
        let backend = RecordingBackend::new(false);
        let shared: Arc<dyn Backend> = backend.clone();
        let dispatcher = BackendDispatcher::new(Arc::clone(&shared), shared, fields(1));

        let keys = vec!["k0".to_string()];
        let outcome = dispatcher.batch_read("t", &keys, None);
        assert_eq!(Status::of(&outcome), Status::NotImplemented);

        let outcome = dispatcher.batch_update("t", &keys, &[Row::new()]);
        assert_eq!(Status::of(&outcome), Status::NotImplemented);

        // The backend never saw the calls.
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_cleanup_attempts_both_backends() {
        let read = RecordingBackend::failing_cleanup();
        let write = RecordingBackend::new(true);
        let dispatcher = BackendDispatcher::new(
            Arc::clone(&read) as Arc<dyn Backend>,
            Arc::clone(&write) as Arc<dyn Backend>,
            fields(1),
        );

        let result = dispatcher.cleanup();
        assert!(result.is_err());
        // The write backend was still torn down after the read failure.
        assert_eq!(write.calls(), vec!["cleanup"]);
    }
}
