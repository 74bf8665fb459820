// used for the record file
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use std::collections::HashMap;

// used to split identification numbers into their binary parts
use bigdecimal::num_bigint::{BigInt, Sign};
use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};
use chrono::{Datelike, NaiveDate};

use tracing::{debug, info, warn};

use crate::construct::{
    Cabinet, CabinetConfig, Mutation, Predicate, Record, RecordHasher, RecordId, RecordStore,
    Snapshot,
};
use crate::datatype::Decimal;
use crate::error::{CabinetError, Result};

// ------------- Layout -------------
// [reserved:i16][id:i32][first name:120][last name:120][year:i32][month:i32][day:i32]
// [identification number:16][points:i16][letter:2], all little endian
pub const NAME_SIZE: usize = 120;
pub const RECORD_SIZE: usize = 2 + 4 + NAME_SIZE * 2 + 4 * 3 + 16 + 2 + 2;
/// Bit of the reserved field marking a deleted record.
pub const TOMBSTONE: i16 = 4;
// the largest scale a 96 bit mantissa decimal carries
const MAX_SCALE: i64 = 28;

const ID_AT: usize = 2;
const FIRST_NAME_AT: usize = ID_AT + 4;
const LAST_NAME_AT: usize = FIRST_NAME_AT + NAME_SIZE;
const DATE_AT: usize = LAST_NAME_AT + NAME_SIZE;
const DECIMAL_AT: usize = DATE_AT + 12;
const POINTS_AT: usize = DECIMAL_AT + 16;
const LETTER_AT: usize = POINTS_AT + 2;

fn put_name(buffer: &mut [u8], name: &str) {
    for (slot, c) in buffer.iter_mut().zip(name.chars()) {
        *slot = if c.is_ascii() { c as u8 } else { b'?' };
    }
}

fn get_name(buffer: &[u8]) -> String {
    let end = buffer.iter().position(|b| *b == 0).unwrap_or(buffer.len());
    String::from_utf8_lossy(&buffer[..end]).into_owned()
}

fn i16_at(buffer: &[u8], at: usize) -> i16 {
    i16::from_le_bytes([buffer[at], buffer[at + 1]])
}
fn i32_at(buffer: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([buffer[at], buffer[at + 1], buffer[at + 2], buffer[at + 3]])
}
fn u32_at(buffer: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buffer[at], buffer[at + 1], buffer[at + 2], buffer[at + 3]])
}

/// Splits a decimal into lo, mid, hi and flags words: a 96 bit mantissa with
/// the scale in bits 16 to 23 of the flags and the sign in bit 31.
pub fn encode_decimal(value: &Decimal) -> Result<[u8; 16]> {
    let (_, scale) = value.as_bigint_and_exponent();
    let normalized: BigDecimal = if scale < 0 {
        value.with_scale(0)
    } else if scale > MAX_SCALE {
        value.with_scale_round(MAX_SCALE, RoundingMode::HalfEven)
    } else {
        (**value).clone()
    };
    let (mantissa, scale) = normalized.as_bigint_and_exponent();
    let magnitude = mantissa
        .magnitude()
        .to_u128()
        .filter(|m| *m >> 96 == 0)
        .ok_or_else(|| CabinetError::Persistence(format!("{value} does not fit in 96 bits")))?;
    let mut flags = (scale as u32) << 16;
    if mantissa.sign() == Sign::Minus {
        flags |= 0x8000_0000;
    }
    let mut bytes = [0u8; 16];
    bytes[0..4].copy_from_slice(&(magnitude as u32).to_le_bytes());
    bytes[4..8].copy_from_slice(&((magnitude >> 32) as u32).to_le_bytes());
    bytes[8..12].copy_from_slice(&((magnitude >> 64) as u32).to_le_bytes());
    bytes[12..16].copy_from_slice(&flags.to_le_bytes());
    Ok(bytes)
}

pub fn decode_decimal(bytes: &[u8]) -> Decimal {
    let magnitude = u128::from(u32_at(bytes, 0))
        | u128::from(u32_at(bytes, 4)) << 32
        | u128::from(u32_at(bytes, 8)) << 64;
    let flags = u32_at(bytes, 12);
    let scale = i64::from((flags >> 16) & 0xFF);
    let mut mantissa = BigInt::from(magnitude);
    if flags & 0x8000_0000 != 0 {
        mantissa = -mantissa;
    }
    Decimal::new(BigDecimal::new(mantissa, scale))
}

pub fn encode(record: &Record, reserved: i16) -> Result<[u8; RECORD_SIZE]> {
    let letter = u16::try_from(u32::from(record.identification_letter)).map_err(|_| {
        CabinetError::Persistence(format!(
            "letter '{}' of record #{} needs more than two bytes",
            record.identification_letter, record.id
        ))
    })?;
    let mut buffer = [0u8; RECORD_SIZE];
    buffer[0..ID_AT].copy_from_slice(&reserved.to_le_bytes());
    buffer[ID_AT..FIRST_NAME_AT].copy_from_slice(&record.id.to_le_bytes());
    put_name(&mut buffer[FIRST_NAME_AT..LAST_NAME_AT], &record.first_name);
    put_name(&mut buffer[LAST_NAME_AT..DATE_AT], &record.last_name);
    let date = record.date_of_birth;
    buffer[DATE_AT..DATE_AT + 4].copy_from_slice(&date.year().to_le_bytes());
    buffer[DATE_AT + 4..DATE_AT + 8].copy_from_slice(&(date.month() as i32).to_le_bytes());
    buffer[DATE_AT + 8..DECIMAL_AT].copy_from_slice(&(date.day() as i32).to_le_bytes());
    buffer[DECIMAL_AT..POINTS_AT].copy_from_slice(&encode_decimal(&record.identification_number)?);
    buffer[POINTS_AT..LETTER_AT].copy_from_slice(&record.points.to_le_bytes());
    buffer[LETTER_AT..RECORD_SIZE].copy_from_slice(&letter.to_le_bytes());
    Ok(buffer)
}

/// Decodes one slot; tombstoned slots yield `None`.
pub fn decode(buffer: &[u8]) -> Result<Option<Record>> {
    if buffer.len() < RECORD_SIZE {
        return Err(CabinetError::Persistence(format!(
            "slot holds {} bytes, expected {RECORD_SIZE}",
            buffer.len()
        )));
    }
    if i16_at(buffer, 0) & TOMBSTONE != 0 {
        return Ok(None);
    }
    let id = i32_at(buffer, ID_AT);
    let (year, month, day) = (
        i32_at(buffer, DATE_AT),
        i32_at(buffer, DATE_AT + 4),
        i32_at(buffer, DATE_AT + 8),
    );
    let date_of_birth = u32::try_from(month)
        .ok()
        .zip(u32::try_from(day).ok())
        .and_then(|(m, d)| NaiveDate::from_ymd_opt(year, m, d))
        .ok_or_else(|| {
            CabinetError::Persistence(format!("record #{id} has no valid date {year}-{month}-{day}"))
        })?;
    let letter = u16::from_le_bytes([buffer[LETTER_AT], buffer[LETTER_AT + 1]]);
    let identification_letter = char::from_u32(u32::from(letter)).ok_or_else(|| {
        CabinetError::Persistence(format!("record #{id} has an invalid letter {letter:#x}"))
    })?;
    Ok(Some(Record {
        id,
        first_name: get_name(&buffer[FIRST_NAME_AT..LAST_NAME_AT]),
        last_name: get_name(&buffer[LAST_NAME_AT..DATE_AT]),
        date_of_birth,
        identification_number: decode_decimal(&buffer[DECIMAL_AT..POINTS_AT]),
        identification_letter,
        points: i16_at(buffer, POINTS_AT),
    }))
}

// ------------- Record file -------------
/// Fixed width record slots. Live ids map to the offset of their slot, so
/// edits overwrite in place and deletes only flip the tombstone bit.
pub struct RecordFile {
    file: File,
    path: PathBuf,
    offsets: HashMap<RecordId, u64, RecordHasher>,
    end: u64,
}

impl RecordFile {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let end = file.metadata()?.len();
        Ok(Self { file, path: path.to_path_buf(), offsets: HashMap::default(), end })
    }
    /// Reads every live record and remembers where it lives.
    pub fn load(&mut self) -> Result<Vec<Record>> {
        let mut bytes = Vec::new();
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_to_end(&mut bytes)?;
        if bytes.len() % RECORD_SIZE != 0 {
            warn!(path = %self.path.display(), "record file ends with a partial slot");
        }
        self.offsets.clear();
        let mut records: Vec<Record> = Vec::new();
        for (slot, chunk) in bytes.chunks_exact(RECORD_SIZE).enumerate() {
            if let Some(record) = decode(chunk)? {
                let offset = (slot * RECORD_SIZE) as u64;
                if self.offsets.insert(record.id, offset).is_some() {
                    records.retain(|kept| kept.id != record.id);
                }
                records.push(record);
            }
        }
        self.end = (bytes.len() - bytes.len() % RECORD_SIZE) as u64;
        debug!(count = records.len(), path = %self.path.display(), "loaded record file");
        Ok(records)
    }
    /// Overwrites the slot of a live id, or appends a new slot.
    pub fn write(&mut self, record: &Record) -> Result<()> {
        let buffer = encode(record, 0)?;
        let offset = match self.offsets.get(&record.id) {
            Some(offset) => *offset,
            None => {
                let offset = self.end;
                self.end += RECORD_SIZE as u64;
                offset
            }
        };
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&buffer)?;
        self.offsets.insert(record.id, offset);
        Ok(())
    }
    pub fn tombstone(&mut self, id: RecordId) -> Result<()> {
        let offset = self.offsets.remove(&id).ok_or(CabinetError::NotFound { id })?;
        let mut reserved = [0u8; 2];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut reserved)?;
        let marked = i16::from_le_bytes(reserved) | TOMBSTONE;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&marked.to_le_bytes())?;
        Ok(())
    }
    pub fn len(&self) -> usize {
        self.offsets.len()
    }
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

// ------------- Persistent store -------------
/// Mirrors every committed change of the wrapped store into a record file.
/// The in-memory change stands even if the file write fails afterwards.
pub struct PersistentStore<S: RecordStore> {
    inner: S,
    file: RecordFile,
}

impl<S: RecordStore> PersistentStore<S> {
    /// Opens (or creates) the file and restores its live records into `inner`.
    pub fn open(path: &Path, mut inner: S) -> Result<Self> {
        let mut file = RecordFile::open(path)?;
        let records = file.load()?;
        let restored = inner.restore(&Snapshot::from(records));
        info!(restored, path = %path.display(), "record file opened");
        Ok(Self { inner, file })
    }
    pub fn inner(&self) -> &S {
        &self.inner
    }
    pub fn file(&self) -> &RecordFile {
        &self.file
    }
    fn mirror(&mut self, id: RecordId) -> Result<()> {
        match self.inner.get(id) {
            Some(record) => self.file.write(record),
            None => Err(CabinetError::NotFound { id }),
        }
    }
    fn matching(&self, predicate: &Predicate) -> Vec<RecordId> {
        self.inner.records().filter(|r| predicate(*r)).map(|r| r.id).collect()
    }
}

impl<S: RecordStore> RecordStore for PersistentStore<S> {
    fn create(&mut self, record: Record, generate_id: bool) -> Result<RecordId> {
        // a replaced record moves to the end of the list, so its slot moves too
        let replaces = !generate_id && self.inner.get(record.id).is_some();
        let id = self.inner.create(record, generate_id)?;
        if replaces {
            self.file.tombstone(id)?;
        }
        self.mirror(id)?;
        Ok(id)
    }
    fn edit(&mut self, id: RecordId, mutate: &dyn Fn(&mut Record)) -> Result<()> {
        // the mutation may move the record to another id
        let new_id = match self.inner.get(id) {
            Some(record) => {
                let mut moved = record.clone();
                mutate(&mut moved);
                moved.id
            }
            None => return Err(CabinetError::NotFound { id }),
        };
        self.inner.edit(id, mutate)?;
        if new_id != id {
            self.file.tombstone(id)?;
        }
        self.mirror(new_id)
    }
    fn delete(&mut self, id: RecordId) -> Result<()> {
        self.inner.delete(id)?;
        self.file.tombstone(id)
    }
    fn update_where(&mut self, predicate: &Predicate, mutation: &Mutation) -> usize {
        let mut count = 0;
        for id in self.matching(predicate) {
            match self.edit(id, &**mutation) {
                Ok(()) => count += 1,
                Err(e @ CabinetError::Persistence(_)) => {
                    warn!(id, error = %e, "updated record not written to file");
                    count += 1;
                }
                Err(e) => debug!(id, error = %e, "record skipped by batch update"),
            }
        }
        count
    }
    fn delete_where(&mut self, predicate: &Predicate) -> Vec<RecordId> {
        let ids = self.matching(predicate);
        for id in &ids {
            if let Err(e) = self.delete(*id) {
                warn!(id, error = %e, "batch delete incomplete for record");
            }
        }
        ids
    }
    fn get(&self, id: RecordId) -> Option<&Record> {
        self.inner.get(id)
    }
    fn find_by_first_name(&self, first_name: &str) -> Vec<&Record> {
        self.inner.find_by_first_name(first_name)
    }
    fn find_by_last_name(&self, last_name: &str) -> Vec<&Record> {
        self.inner.find_by_last_name(last_name)
    }
    fn find_by_date_of_birth(&self, date_of_birth: NaiveDate) -> Vec<&Record> {
        self.inner.find_by_date_of_birth(date_of_birth)
    }
    fn records(&self) -> Box<dyn Iterator<Item = &Record> + '_> {
        self.inner.records()
    }
    fn count(&self) -> usize {
        self.inner.count()
    }
    fn snapshot(&self) -> Snapshot {
        self.inner.snapshot()
    }
    fn restore(&mut self, snapshot: &Snapshot) -> usize {
        let restored = self.inner.restore(snapshot);
        for record in snapshot {
            if let Err(e) = self.file.write(record) {
                warn!(id = record.id, error = %e, "restored record not written to file");
            }
        }
        restored
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

// ------------- Persistence mode -------------
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PersistenceMode {
    InMemory,
    File(PathBuf),
}

/// Builds the core store for the given mode.
pub fn open_store(mode: &PersistenceMode, config: CabinetConfig) -> Result<Box<dyn RecordStore + Send + Sync>> {
    let cabinet = Cabinet::new(config);
    Ok(match mode {
        PersistenceMode::InMemory => Box::new(cabinet),
        PersistenceMode::File(path) => Box::new(PersistentStore::open(path, cabinet)?),
    })
}
