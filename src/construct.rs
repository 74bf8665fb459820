use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// other keepers use HashMap
use core::hash::{BuildHasher, BuildHasherDefault};
use std::collections::HashMap;
use std::hash::Hash;
use seahash::SeaHasher;

// used for dates of birth and their index
use chrono::NaiveDate;

// used to print out readable forms of a record
use std::fmt;

use tracing::{debug, info, warn};

// our own stuff that we need
use crate::datatype::{Decimal, DATE_FORMAT};
use crate::error::{CabinetError, Result};
use crate::projection::{Projector, Rows};
use crate::validation::{RuleValidator, ValidationRules, Validator};

// ------------- Record -------------
pub type RecordId = i32;

pub type RecordHasher = BuildHasherDefault<SeaHasher>;
pub type OtherHasher = BuildHasherDefault<SeaHasher>;

/// A compiled filter over records.
pub type Predicate = Arc<dyn Fn(&Record) -> bool + Send + Sync>;
/// A compiled in-place change to a record.
pub type Mutation = Arc<dyn Fn(&mut Record) + Send + Sync>;

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Record {
    pub id: RecordId,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub identification_number: Decimal,
    pub identification_letter: char,
    pub points: i16,
}
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "#{}, {}, {}, {}, {}{}, {}",
            self.id,
            self.first_name,
            self.last_name,
            self.date_of_birth.format(DATE_FORMAT),
            self.identification_letter,
            self.identification_number,
            self.points
        )
    }
}

// ------------- Lookups -------------
// Buckets keep insertion order, so they are lists rather than sets.
#[derive(Debug)]
pub struct Lookup<K, H = OtherHasher> {
    index: HashMap<K, Vec<RecordId>, H>,
}
impl<K: Eq + Hash, H: BuildHasher + Default> Lookup<K, H> {
    pub fn new() -> Self {
        Self {
            index: HashMap::<K, Vec<RecordId>, H>::default(),
        }
    }
    pub fn insert(&mut self, key: K, id: RecordId) {
        let bucket = self.index.entry(key).or_default();
        if !bucket.contains(&id) {
            bucket.push(id);
        }
    }
    pub fn remove(&mut self, key: &K, id: RecordId) -> bool {
        let Some(bucket) = self.index.get_mut(key) else {
            return false;
        };
        let before = bucket.len();
        bucket.retain(|kept| *kept != id);
        let removed = bucket.len() != before;
        if bucket.is_empty() {
            self.index.remove(key);
        }
        removed
    }
    pub fn lookup(&self, key: &K) -> &[RecordId] {
        self.index.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
    pub fn entries(&self) -> usize {
        self.index.values().map(Vec::len).sum()
    }
    pub fn len(&self) -> usize {
        self.index.len()
    }
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
impl<K: Eq + Hash, H: BuildHasher + Default> Default for Lookup<K, H> {
    fn default() -> Self {
        Self::new()
    }
}

fn name_key(name: &str) -> String {
    name.to_lowercase()
}

// ------------- Snapshot -------------
/// An immutable point-in-time copy of the live records, in list order.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    records: Arc<[Record]>,
}
impl Snapshot {
    pub fn records(&self) -> &[Record] {
        &self.records
    }
    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }
    pub fn len(&self) -> usize {
        self.records.len()
    }
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
impl From<Vec<Record>> for Snapshot {
    fn from(records: Vec<Record>) -> Self {
        Self { records: records.into() }
    }
}
impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ------------- Store contract -------------
/// Everything a front end may do with a collection of records. Decorators
/// (logging, timing, file mirroring) implement it by wrapping another store.
pub trait RecordStore {
    /// Inserts a record, either under a fresh id or replacing the live record
    /// holding `record.id`.
    fn create(&mut self, record: Record, generate_id: bool) -> Result<RecordId>;
    fn edit(&mut self, id: RecordId, mutate: &dyn Fn(&mut Record)) -> Result<()>;
    fn delete(&mut self, id: RecordId) -> Result<()>;
    /// Applies `mutation` to every match; records failing validation are skipped.
    fn update_where(&mut self, predicate: &Predicate, mutation: &Mutation) -> usize;
    fn delete_where(&mut self, predicate: &Predicate) -> Vec<RecordId>;
    fn get(&self, id: RecordId) -> Option<&Record>;
    fn find_by_first_name(&self, first_name: &str) -> Vec<&Record>;
    fn find_by_last_name(&self, last_name: &str) -> Vec<&Record>;
    fn find_by_date_of_birth(&self, date_of_birth: NaiveDate) -> Vec<&Record>;
    /// Live records in list order.
    fn records(&self) -> Box<dyn Iterator<Item = &Record> + '_>;
    fn count(&self) -> usize;
    fn snapshot(&self) -> Snapshot;
    /// Merges by id without validation, returning the number of records taken over.
    fn restore(&mut self, snapshot: &Snapshot) -> usize;
    /// Incremented by every committed change.
    fn revision(&self) -> u64;
    /// Distinguishes this store from every other store in the process.
    fn instance(&self) -> u64;
    fn verify_indexes(&self) -> Result<()>;

    fn select<'a>(&'a self, predicate: &'a Predicate, projector: &'a Projector) -> Rows<'a> {
        Rows::new(self.records(), predicate, projector)
    }
}

impl<S: RecordStore + ?Sized> RecordStore for Box<S> {
    fn create(&mut self, record: Record, generate_id: bool) -> Result<RecordId> {
        (**self).create(record, generate_id)
    }
    fn edit(&mut self, id: RecordId, mutate: &dyn Fn(&mut Record)) -> Result<()> {
        (**self).edit(id, mutate)
    }
    fn delete(&mut self, id: RecordId) -> Result<()> {
        (**self).delete(id)
    }
    fn update_where(&mut self, predicate: &Predicate, mutation: &Mutation) -> usize {
        (**self).update_where(predicate, mutation)
    }
    fn delete_where(&mut self, predicate: &Predicate) -> Vec<RecordId> {
        (**self).delete_where(predicate)
    }
    fn get(&self, id: RecordId) -> Option<&Record> {
        (**self).get(id)
    }
    fn find_by_first_name(&self, first_name: &str) -> Vec<&Record> {
        (**self).find_by_first_name(first_name)
    }
    fn find_by_last_name(&self, last_name: &str) -> Vec<&Record> {
        (**self).find_by_last_name(last_name)
    }
    fn find_by_date_of_birth(&self, date_of_birth: NaiveDate) -> Vec<&Record> {
        (**self).find_by_date_of_birth(date_of_birth)
    }
    fn records(&self) -> Box<dyn Iterator<Item = &Record> + '_> {
        (**self).records()
    }
    fn count(&self) -> usize {
        (**self).count()
    }
    fn snapshot(&self) -> Snapshot {
        (**self).snapshot()
    }
    fn restore(&mut self, snapshot: &Snapshot) -> usize {
        (**self).restore(snapshot)
    }
    fn revision(&self) -> u64 {
        (**self).revision()
    }
    fn instance(&self) -> u64 {
        (**self).instance()
    }
    fn verify_indexes(&self) -> Result<()> {
        (**self).verify_indexes()
    }
}

// ------------- Cabinet -------------
/// What a cabinet needs from its surroundings.
#[derive(Clone)]
pub struct CabinetConfig {
    pub validator: Arc<dyn Validator>,
}
impl CabinetConfig {
    pub fn new(validator: Arc<dyn Validator>) -> Self {
        Self { validator }
    }
}
impl Default for CabinetConfig {
    fn default() -> Self {
        Self::new(Arc::new(RuleValidator::new(ValidationRules::default_rules())))
    }
}

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

// The in-memory store: records keyed by id, the list order, and
// one lookup per indexed field.
pub struct Cabinet {
    kept: HashMap<RecordId, Record, RecordHasher>,
    order: Vec<RecordId>,
    first_name_lookup: Lookup<String>,
    last_name_lookup: Lookup<String>,
    date_of_birth_lookup: Lookup<NaiveDate>,
    validator: Arc<dyn Validator>,
    revision: u64,
    instance: u64,
}

impl Cabinet {
    pub fn new(config: CabinetConfig) -> Self {
        Self {
            kept: HashMap::default(),
            order: Vec::new(),
            first_name_lookup: Lookup::new(),
            last_name_lookup: Lookup::new(),
            date_of_birth_lookup: Lookup::new(),
            validator: config.validator,
            revision: 0,
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
        }
    }
    fn index(&mut self, record: &Record) {
        self.first_name_lookup.insert(name_key(&record.first_name), record.id);
        self.last_name_lookup.insert(name_key(&record.last_name), record.id);
        self.date_of_birth_lookup.insert(record.date_of_birth, record.id);
    }
    fn unindex(&mut self, record: &Record) {
        self.first_name_lookup.remove(&name_key(&record.first_name), record.id);
        self.last_name_lookup.remove(&name_key(&record.last_name), record.id);
        self.date_of_birth_lookup.remove(&record.date_of_birth, record.id);
    }
    // Starts at count + 1 and skips ids that are still live.
    fn next_id(&self) -> RecordId {
        let mut id = RecordId::try_from(self.order.len()).unwrap_or(RecordId::MAX - 1) + 1;
        while self.kept.contains_key(&id) {
            id += 1;
        }
        id
    }
    fn validate(&self, record: &Record) -> Result<()> {
        self.validator
            .validate(record)
            .map_err(|reason| CabinetError::Validation { id: record.id, reason })
    }
    fn resolve<'a>(&'a self, ids: &[RecordId]) -> Vec<&'a Record> {
        ids.iter().filter_map(|id| self.kept.get(id)).collect()
    }
    fn matching(&self, predicate: &Predicate) -> Vec<RecordId> {
        self.order
            .iter()
            .filter(|id| self.kept.get(*id).is_some_and(|record| predicate(record)))
            .copied()
            .collect()
    }
    // Swaps the record kept under `id` for `record`, moving its index entries
    // from the old values to the new ones. The caller has validated `record`.
    fn commit(&mut self, id: RecordId, record: Record) -> Result<()> {
        if record.id != id && self.kept.contains_key(&record.id) {
            return Err(CabinetError::Validation {
                id,
                reason: format!("id {} is already taken", record.id),
            });
        }
        let previous = self
            .kept
            .remove(&id)
            .ok_or(CabinetError::NotFound { id })?;
        self.unindex(&previous);
        self.index(&record);
        if record.id != id {
            if let Some(slot) = self.order.iter_mut().find(|slot| **slot == id) {
                *slot = record.id;
            }
        }
        self.kept.insert(record.id, record);
        self.revision += 1;
        Ok(())
    }
}

impl Default for Cabinet {
    fn default() -> Self {
        Self::new(CabinetConfig::default())
    }
}

impl RecordStore for Cabinet {
    fn create(&mut self, mut record: Record, generate_id: bool) -> Result<RecordId> {
        if generate_id {
            record.id = self.next_id();
        }
        self.validate(&record)?;
        let id = record.id;
        if let Some(previous) = self.kept.remove(&id) {
            debug!(id, "replacing live record");
            self.unindex(&previous);
            self.order.retain(|kept| *kept != id);
        }
        self.index(&record);
        self.order.push(id);
        self.kept.insert(id, record);
        self.revision += 1;
        Ok(id)
    }
    fn edit(&mut self, id: RecordId, mutate: &dyn Fn(&mut Record)) -> Result<()> {
        let mut scratch = self
            .kept
            .get(&id)
            .cloned()
            .ok_or(CabinetError::NotFound { id })?;
        mutate(&mut scratch);
        self.validate(&scratch)?;
        self.commit(id, scratch)
    }
    fn delete(&mut self, id: RecordId) -> Result<()> {
        let record = self.kept.remove(&id).ok_or(CabinetError::NotFound { id })?;
        self.unindex(&record);
        self.order.retain(|kept| *kept != id);
        self.revision += 1;
        Ok(())
    }
    fn update_where(&mut self, predicate: &Predicate, mutation: &Mutation) -> usize {
        let mut count = 0;
        for id in self.matching(predicate) {
            match self.edit(id, &**mutation) {
                Ok(()) => count += 1,
                Err(e) => debug!(id, error = %e, "record skipped by batch update"),
            }
        }
        info!(count, "batch update complete");
        count
    }
    fn delete_where(&mut self, predicate: &Predicate) -> Vec<RecordId> {
        let ids = self.matching(predicate);
        for id in &ids {
            if let Err(e) = self.delete(*id) {
                warn!(id, error = %e, "record vanished during batch delete");
            }
        }
        info!(count = ids.len(), "batch delete complete");
        ids
    }
    fn get(&self, id: RecordId) -> Option<&Record> {
        self.kept.get(&id)
    }
    fn find_by_first_name(&self, first_name: &str) -> Vec<&Record> {
        self.resolve(self.first_name_lookup.lookup(&name_key(first_name)))
    }
    fn find_by_last_name(&self, last_name: &str) -> Vec<&Record> {
        self.resolve(self.last_name_lookup.lookup(&name_key(last_name)))
    }
    fn find_by_date_of_birth(&self, date_of_birth: NaiveDate) -> Vec<&Record> {
        self.resolve(self.date_of_birth_lookup.lookup(&date_of_birth))
    }
    fn records(&self) -> Box<dyn Iterator<Item = &Record> + '_> {
        Box::new(self.order.iter().filter_map(|id| self.kept.get(id)))
    }
    fn count(&self) -> usize {
        self.order.len()
    }
    fn snapshot(&self) -> Snapshot {
        Snapshot::from(self.records().cloned().collect::<Vec<_>>())
    }
    // Imported data was validated when it was exported, so no validation here.
    fn restore(&mut self, snapshot: &Snapshot) -> usize {
        for record in snapshot {
            if let Some(existing) = self.kept.get_mut(&record.id) {
                let previous = std::mem::replace(existing, record.clone());
                self.unindex(&previous);
            } else {
                self.order.push(record.id);
                self.kept.insert(record.id, record.clone());
            }
            self.index(record);
        }
        if !snapshot.is_empty() {
            self.revision += 1;
        }
        info!(count = snapshot.len(), "restored records");
        snapshot.len()
    }
    fn revision(&self) -> u64 {
        self.revision
    }
    fn instance(&self) -> u64 {
        self.instance
    }
    fn verify_indexes(&self) -> Result<()> {
        if self.order.len() != self.kept.len() {
            return Err(CabinetError::Invariant(format!(
                "{} records listed but {} kept",
                self.order.len(),
                self.kept.len()
            )));
        }
        let live = self.kept.len();
        for (name, entries) in [
            ("first name", self.first_name_lookup.entries()),
            ("last name", self.last_name_lookup.entries()),
            ("date of birth", self.date_of_birth_lookup.entries()),
        ] {
            if entries != live {
                return Err(CabinetError::Invariant(format!(
                    "{name} index holds {entries} entries for {live} records"
                )));
            }
        }
        // with the entry counts equal, finding every record in its own bucket
        // means no bucket holds a stale entry
        for record in self.kept.values() {
            let found = [
                self.first_name_lookup.lookup(&name_key(&record.first_name)).contains(&record.id),
                self.last_name_lookup.lookup(&name_key(&record.last_name)).contains(&record.id),
                self.date_of_birth_lookup.lookup(&record.date_of_birth).contains(&record.id),
            ];
            if found.contains(&false) {
                return Err(CabinetError::Invariant(format!(
                    "record #{} is missing from an index bucket",
                    record.id
                )));
            }
        }
        Ok(())
    }
}
