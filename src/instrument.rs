//! Store decorators that report through `tracing`. They implement the same
//! [`RecordStore`] contract as the store they wrap, so they stack:
//! `TimingStore::new(LoggingStore::new(cabinet))`.

use std::time::Instant;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::construct::{Mutation, Predicate, Record, RecordId, RecordStore, Snapshot};
use crate::error::Result;

/// Logs every call with its arguments and outcome.
pub struct LoggingStore<S: RecordStore> {
    inner: S,
}

impl<S: RecordStore> LoggingStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
    pub fn into_inner(self) -> S {
        self.inner
    }
}

fn logged<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    match &result {
        Ok(_) => info!(operation, "succeeded"),
        Err(e) => warn!(operation, error = %e, "failed"),
    }
    result
}

impl<S: RecordStore> RecordStore for LoggingStore<S> {
    fn create(&mut self, record: Record, generate_id: bool) -> Result<RecordId> {
        info!(record = %record, generate_id, "create");
        logged("create", self.inner.create(record, generate_id))
    }
    fn edit(&mut self, id: RecordId, mutate: &dyn Fn(&mut Record)) -> Result<()> {
        info!(id, "edit");
        logged("edit", self.inner.edit(id, mutate))
    }
    fn delete(&mut self, id: RecordId) -> Result<()> {
        info!(id, "delete");
        logged("delete", self.inner.delete(id))
    }
    fn update_where(&mut self, predicate: &Predicate, mutation: &Mutation) -> usize {
        let count = self.inner.update_where(predicate, mutation);
        info!(count, "update_where");
        count
    }
    fn delete_where(&mut self, predicate: &Predicate) -> Vec<RecordId> {
        let ids = self.inner.delete_where(predicate);
        info!(?ids, "delete_where");
        ids
    }
    fn get(&self, id: RecordId) -> Option<&Record> {
        self.inner.get(id)
    }
    fn find_by_first_name(&self, first_name: &str) -> Vec<&Record> {
        let found = self.inner.find_by_first_name(first_name);
        info!(first_name, count = found.len(), "find_by_first_name");
        found
    }
    fn find_by_last_name(&self, last_name: &str) -> Vec<&Record> {
        let found = self.inner.find_by_last_name(last_name);
        info!(last_name, count = found.len(), "find_by_last_name");
        found
    }
    fn find_by_date_of_birth(&self, date_of_birth: NaiveDate) -> Vec<&Record> {
        let found = self.inner.find_by_date_of_birth(date_of_birth);
        info!(%date_of_birth, count = found.len(), "find_by_date_of_birth");
        found
    }
    fn records(&self) -> Box<dyn Iterator<Item = &Record> + '_> {
        self.inner.records()
    }
    fn count(&self) -> usize {
        self.inner.count()
    }
    fn snapshot(&self) -> Snapshot {
        let snapshot = self.inner.snapshot();
        info!(count = snapshot.len(), "snapshot");
        snapshot
    }
    fn restore(&mut self, snapshot: &Snapshot) -> usize {
        let restored = self.inner.restore(snapshot);
        info!(restored, "restore");
        restored
    }
    fn revision(&self) -> u64 {
        self.inner.revision()
    }
    fn instance(&self) -> u64 {
        self.inner.instance()
    }
    fn verify_indexes(&self) -> Result<()> {
        logged("verify_indexes", self.inner.verify_indexes())
    }
}

/// Logs how long every mutating call and lookup took.
pub struct TimingStore<S: RecordStore> {
    inner: S,
}

impl<S: RecordStore> TimingStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
    pub fn into_inner(self) -> S {
        self.inner
    }
}

macro_rules! timed {
    ($operation:literal, $call:expr) => {{
        let started = Instant::now();
        let outcome = $call;
        info!(
            operation = $operation,
            ms = started.elapsed().as_secs_f64() * 1000.0,
            "timed"
        );
        outcome
    }};
}

impl<S: RecordStore> RecordStore for TimingStore<S> {
    fn create(&mut self, record: Record, generate_id: bool) -> Result<RecordId> {
        timed!("create", self.inner.create(record, generate_id))
    }
    fn edit(&mut self, id: RecordId, mutate: &dyn Fn(&mut Record)) -> Result<()> {
        timed!("edit", self.inner.edit(id, mutate))
    }
    fn delete(&mut self, id: RecordId) -> Result<()> {
        timed!("delete", self.inner.delete(id))
    }
    fn update_where(&mut self, predicate: &Predicate, mutation: &Mutation) -> usize {
        timed!("update_where", self.inner.update_where(predicate, mutation))
    }
    fn delete_where(&mut self, predicate: &Predicate) -> Vec<RecordId> {
        timed!("delete_where", self.inner.delete_where(predicate))
    }
    fn get(&self, id: RecordId) -> Option<&Record> {
        self.inner.get(id)
    }
    fn find_by_first_name(&self, first_name: &str) -> Vec<&Record> {
        timed!("find_by_first_name", self.inner.find_by_first_name(first_name))
    }
    fn find_by_last_name(&self, last_name: &str) -> Vec<&Record> {
        timed!("find_by_last_name", self.inner.find_by_last_name(last_name))
    }
    fn find_by_date_of_birth(&self, date_of_birth: NaiveDate) -> Vec<&Record> {
        timed!("find_by_date_of_birth", self.inner.find_by_date_of_birth(date_of_birth))
    }
    fn records(&self) -> Box<dyn Iterator<Item = &Record> + '_> {
        self.inner.records()
    }
    fn count(&self) -> usize {
        self.inner.count()
    }
    fn snapshot(&self) -> Snapshot {
        timed!("snapshot", self.inner.snapshot())
    }
    fn restore(&mut self, snapshot: &Snapshot) -> usize {
        timed!("restore", self.inner.restore(snapshot))
    }
    fn revision(&self) -> u64 {
        self.inner.revision()
    }
    fn instance(&self) -> u64 {
        self.inner.instance()
    }
    fn verify_indexes(&self) -> Result<()> {
        self.inner.verify_indexes()
    }
}
