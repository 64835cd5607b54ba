// ============================================================================
// In-Memory Store
// Reference storage port with a unique natural-key index
// ============================================================================

use crate::domain::RecordId;
use crate::interfaces::{
    BulkRecord, BulkWriteResult, InsertManyResult, PersistenceError, RecordFilter, StoragePort,
    WriteError, WriteOperation, WriteOutcome,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

/// Records plus the id and natural-key indexes over them.
struct StoreState<T> {
    records: Vec<T>,
    by_id: HashMap<RecordId, usize>,
    by_key: HashMap<String, usize>,
}

impl<T: BulkRecord> StoreState<T> {
    fn new() -> Self {
        Self {
            records: Vec::new(),
            by_id: HashMap::new(),
            by_key: HashMap::new(),
        }
    }

    fn position(&self, filter: &RecordFilter) -> Option<usize> {
        match filter {
            RecordFilter::Id(id) => self.by_id.get(id).copied(),
            RecordFilter::NaturalKey(key) => self.by_key.get(key).copied(),
        }
    }

    fn insert(&mut self, mut doc: T) -> Result<(), PersistenceError> {
        let id = match doc.record_id() {
            Some(id) => id,
            None => {
                let id = RecordId::new();
                doc.set_record_id(id);
                id
            }
        };
        if self.by_id.contains_key(&id) {
            return Err(PersistenceError::WriteConflict(format!(
                "{} {} already exists",
                T::ENTITY,
                id
            )));
        }
        let key = doc.natural_key().map(str::to_string);
        if let Some(key) = &key {
            if self.by_key.contains_key(key) {
                return Err(PersistenceError::DuplicateKey { key: key.clone() });
            }
        }

        let pos = self.records.len();
        self.records.push(doc);
        self.by_id.insert(id, pos);
        if let Some(key) = key {
            self.by_key.insert(key, pos);
        }
        Ok(())
    }

    /// Replace the record at `pos`, keeping its id.
    fn replace(&mut self, pos: usize, mut doc: T) -> Result<&T, PersistenceError> {
        let existing = &self.records[pos];
        if let Some(id) = existing.record_id() {
            doc.set_record_id(id);
        }
        let old_key = existing.natural_key().map(str::to_string);
        let new_key = doc.natural_key().map(str::to_string);

        if let Some(key) = &new_key {
            if self.by_key.get(key).is_some_and(|owner| *owner != pos) {
                return Err(PersistenceError::DuplicateKey { key: key.clone() });
            }
        }
        if old_key != new_key {
            if let Some(old) = old_key {
                self.by_key.remove(&old);
            }
            if let Some(new) = new_key {
                self.by_key.insert(new, pos);
            }
        }

        self.records[pos] = doc;
        Ok(&self.records[pos])
    }

    fn write(&mut self, op: WriteOperation<T>) -> WriteOutcome {
        let applied = match op {
            WriteOperation::InsertOne(doc) => self.insert(doc).map(|_| WriteOutcome::Inserted),
            WriteOperation::UpdateOne {
                filter,
                mut replacement,
                upsert,
            } => match self.position(&filter) {
                Some(pos) => self.replace(pos, replacement).map(|_| WriteOutcome::Modified),
                None if upsert => {
                    if let RecordFilter::Id(id) = filter {
                        replacement.set_record_id(id);
                    }
                    self.insert(replacement).map(|_| WriteOutcome::Inserted)
                }
                None => Ok(WriteOutcome::Unmatched),
            },
        };
        applied.unwrap_or_else(WriteOutcome::Failed)
    }
}

/// Thread-safe in-memory `StoragePort`.
///
/// Natural keys are unique; writes that would duplicate one fail with
/// `PersistenceError::DuplicateKey`. Call-level failures can be queued with
/// [`InMemoryStore::fail_next_call`] to exercise batch failure handling.
pub struct InMemoryStore<T: BulkRecord> {
    state: RwLock<StoreState<T>>,
    /// One entry per upcoming call; `None` lets that call through
    injected_failures: Mutex<VecDeque<Option<PersistenceError>>>,
    calls: AtomicU64,
}

impl<T: BulkRecord> InMemoryStore<T> {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::new()),
            injected_failures: Mutex::new(VecDeque::new()),
            calls: AtomicU64::new(0),
        }
    }

    /// Make the next port call fail with `error` without touching any record
    pub fn fail_next_call(&self, error: PersistenceError) {
        self.injected_failures.lock().push_back(Some(error));
    }

    /// Let `calls` port calls succeed, then fail the one after with `error`
    pub fn fail_after_calls(&self, calls: usize, error: PersistenceError) {
        let mut failures = self.injected_failures.lock();
        failures.extend(std::iter::repeat_n(None, calls));
        failures.push_back(Some(error));
    }

    /// Queue `count` consecutive call failures
    pub fn fail_next_calls(&self, count: usize, error: PersistenceError) {
        let mut failures = self.injected_failures.lock();
        failures.extend(std::iter::repeat_n(Some(error), count));
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every stored record in insertion order
    pub fn all(&self) -> Vec<T> {
        self.state.read().records.clone()
    }

    pub fn get(&self, filter: &RecordFilter) -> Option<T> {
        let state = self.state.read();
        state.position(filter).map(|pos| state.records[pos].clone())
    }

    /// Port calls received, including injected failures
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn begin_call(&self) -> Result<(), PersistenceError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match self.injected_failures.lock().pop_front().flatten() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl<T: BulkRecord> Default for InMemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: BulkRecord> StoragePort<T> for InMemoryStore<T> {
    fn insert_many(&self, docs: Vec<T>) -> Result<InsertManyResult, PersistenceError> {
        self.begin_call()?;
        let mut state = self.state.write();

        let mut result = InsertManyResult::default();
        for (index, doc) in docs.into_iter().enumerate() {
            match state.insert(doc) {
                Ok(()) => result.inserted_count += 1,
                Err(error) => result.write_errors.push(WriteError { index, error }),
            }
        }
        Ok(result)
    }

    fn bulk_write(&self, ops: Vec<WriteOperation<T>>) -> Result<BulkWriteResult, PersistenceError> {
        self.begin_call()?;
        let mut state = self.state.write();

        let outcomes = ops.into_iter().map(|op| state.write(op)).collect();
        Ok(BulkWriteResult::from_outcomes(outcomes))
    }

    fn find_one_and_update(
        &self,
        filter: &RecordFilter,
        update: T,
    ) -> Result<Option<T>, PersistenceError> {
        self.begin_call()?;
        let mut state = self.state.write();

        match state.position(filter) {
            Some(pos) => state.replace(pos, update).map(|doc| Some(doc.clone())),
            None => Ok(None),
        }
    }

    fn find_one(&self, filter: &RecordFilter) -> Result<Option<T>, PersistenceError> {
        self.begin_call()?;
        Ok(self.get(filter))
    }

    fn find_many(&self, filters: &[RecordFilter]) -> Result<Vec<Option<T>>, PersistenceError> {
        self.begin_call()?;
        let state = self.state.read();
        Ok(filters
            .iter()
            .map(|filter| state.position(filter).map(|pos| state.records[pos].clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Campaign;

    #[test]
    fn test_insert_assigns_ids() {
        let store: InMemoryStore<Campaign> = InMemoryStore::new();
        let result = store
            .insert_many(vec![Campaign::new("CN-1", "a"), Campaign::new("CN-2", "b")])
            .unwrap();

        assert_eq!(result.inserted_count, 2);
        assert!(store.all().iter().all(|c| c.id.is_some()));
    }

    #[test]
    fn test_duplicate_natural_key_rejected() {
        let store: InMemoryStore<Campaign> = InMemoryStore::new();
        let result = store
            .insert_many(vec![Campaign::new("CN-1", "a"), Campaign::new("CN-1", "b")])
            .unwrap();

        assert_eq!(result.inserted_count, 1);
        assert_eq!(
            result.write_errors,
            vec![WriteError {
                index: 1,
                error: PersistenceError::DuplicateKey {
                    key: "CN-1".to_string()
                }
            }]
        );
    }

    #[test]
    fn test_update_keeps_id_and_reindexes_key() {
        let store: InMemoryStore<Campaign> = InMemoryStore::new();
        store.insert_many(vec![Campaign::new("CN-1", "a")]).unwrap();
        let id = store.all()[0].id.unwrap();

        let renamed = Campaign::new("CN-9", "a").with_id(id);
        let stored = store
            .find_one_and_update(&RecordFilter::Id(id), renamed)
            .unwrap()
            .unwrap();

        assert_eq!(stored.id, Some(id));
        assert!(store.get(&RecordFilter::NaturalKey("CN-1".to_string())).is_none());
        assert!(store.get(&RecordFilter::NaturalKey("CN-9".to_string())).is_some());
    }

    #[test]
    fn test_bulk_write_outcomes() {
        let store: InMemoryStore<Campaign> = InMemoryStore::new();
        store.insert_many(vec![Campaign::new("CN-1", "a")]).unwrap();

        let result = store
            .bulk_write(vec![
                WriteOperation::UpdateOne {
                    filter: RecordFilter::NaturalKey("CN-1".to_string()),
                    replacement: Campaign::new("CN-1", "renamed"),
                    upsert: false,
                },
                WriteOperation::UpdateOne {
                    filter: RecordFilter::NaturalKey("CN-2".to_string()),
                    replacement: Campaign::new("CN-2", "b"),
                    upsert: false,
                },
                WriteOperation::UpdateOne {
                    filter: RecordFilter::NaturalKey("CN-3".to_string()),
                    replacement: Campaign::new("CN-3", "c"),
                    upsert: true,
                },
            ])
            .unwrap();

        assert_eq!(
            result.outcomes,
            vec![
                WriteOutcome::Modified,
                WriteOutcome::Unmatched,
                WriteOutcome::Inserted
            ]
        );
        assert_eq!((result.inserted_count, result.modified_count), (1, 1));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_injected_failure_applies_nothing() {
        let store: InMemoryStore<Campaign> = InMemoryStore::new();
        store.fail_next_calls(2, PersistenceError::Connection("refused".to_string()));

        assert!(store.insert_many(vec![Campaign::new("CN-1", "a")]).is_err());
        assert!(store.find_one(&RecordFilter::NaturalKey("CN-1".to_string())).is_err());
        assert!(store.insert_many(vec![Campaign::new("CN-1", "a")]).is_ok());
        assert_eq!(store.len(), 1);
        assert_eq!(store.call_count(), 3);
    }

    #[test]
    fn test_fail_after_calls_skips_ahead() {
        let store: InMemoryStore<Campaign> = InMemoryStore::new();
        store.fail_after_calls(1, PersistenceError::Timeout("slow".to_string()));

        assert!(store.insert_many(vec![Campaign::new("CN-1", "a")]).is_ok());
        assert!(store.insert_many(vec![Campaign::new("CN-2", "b")]).is_err());
        assert!(store.insert_many(vec![Campaign::new("CN-2", "b")]).is_ok());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_find_many_preserves_filter_order() {
        let store: InMemoryStore<Campaign> = InMemoryStore::new();
        store
            .insert_many(vec![Campaign::new("CN-1", "a"), Campaign::new("CN-2", "b")])
            .unwrap();

        let found = store
            .find_many(&[
                RecordFilter::NaturalKey("CN-2".to_string()),
                RecordFilter::NaturalKey("CN-9".to_string()),
                RecordFilter::NaturalKey("CN-1".to_string()),
            ])
            .unwrap();

        let keys: Vec<_> = found
            .iter()
            .map(|c| c.as_ref().map(|c| c.campaign_number.as_str()))
            .collect();
        assert_eq!(keys, vec![Some("CN-2"), None, Some("CN-1")]);
        assert_eq!(store.call_count(), 2);
    }
}
