use crate::construct::{Predicate, Record};
use crate::field::{descriptors, FieldDescriptor};

/// One projected record: display strings in column order.
pub type Row = Vec<String>;

/// The getters of the selected fields, in the order they were requested.
#[derive(Clone, Debug)]
pub struct Projector {
    columns: Vec<&'static FieldDescriptor>,
}
impl Projector {
    pub fn new(columns: Vec<&'static FieldDescriptor>) -> Self {
        Self { columns }
    }
    /// Every field, in canonical order.
    pub fn all() -> Self {
        Self::new(descriptors().collect())
    }
    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|d| d.name.to_string()).collect()
    }
    pub fn project(&self, record: &Record) -> Row {
        self.columns.iter().map(|d| d.get(record)).collect()
    }
}

/// Lazily filters and projects records in a single forward pass.
pub struct Rows<'a> {
    records: Box<dyn Iterator<Item = &'a Record> + 'a>,
    predicate: &'a Predicate,
    projector: &'a Projector,
}
impl<'a> Rows<'a> {
    pub fn new(
        records: Box<dyn Iterator<Item = &'a Record> + 'a>,
        predicate: &'a Predicate,
        projector: &'a Projector,
    ) -> Self {
        Self { records, predicate, projector }
    }
}
impl Iterator for Rows<'_> {
    type Item = Row;
    fn next(&mut self) -> Option<Row> {
        let predicate = self.predicate;
        self.records
            .find(|record| predicate(*record))
            .map(|record| self.projector.project(record))
    }
}

/// Projects already selected records.
pub fn project<'a, I>(records: I, projector: &'a Projector) -> impl Iterator<Item = Row> + 'a
where
    I: IntoIterator<Item = &'a Record>,
    I::IntoIter: 'a,
{
    records.into_iter().map(move |record| projector.project(record))
}
