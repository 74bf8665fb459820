//! The query compiler: turns WHERE, SET, VALUES and select-list clauses into
//! predicates, mutations, records and projectors.
//!
//! WHERE clauses are flat. Comparisons are joined by `and`/`or` and folded
//! strictly from left to right with no precedence, so
//! `a = 1 or b = 2 and c = 3` means `(a = 1 or b = 2) and c = 3`.
//! Every entry point either succeeds completely or returns an error; nothing
//! is partially compiled.

use std::sync::Arc;

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::construct::{Mutation, Predicate, Record};
use crate::datatype::Value;
use crate::error::{CabinetError, Result};
use crate::field::{resolve, FieldDescriptor};
use crate::projection::Projector;

#[derive(Parser)]
#[grammar = "query.pest"]
pub struct ClauseParser;

/// A compiled unit of work. The fingerprint hashes the clause text and is a
/// memoization hint only; different clauses may share one.
#[derive(Clone)]
pub struct Query {
    pub predicate: Predicate,
    pub mutation: Option<Mutation>,
    pub projector: Option<Projector>,
    pub fingerprint: u64,
}
impl Query {
    pub fn matches(&self, record: &Record) -> bool {
        (self.predicate)(record)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Connective {
    And,
    Or,
}
impl Connective {
    fn keyword(self) -> &'static str {
        match self {
            Connective::And => "and",
            Connective::Or => "or",
        }
    }
    fn combine(self, left: Predicate, right: Predicate) -> Predicate {
        match self {
            Connective::And => Arc::new(move |r: &Record| left(r) && right(r)),
            Connective::Or => Arc::new(move |r: &Record| left(r) || right(r)),
        }
    }
}

pub fn accept_all() -> Predicate {
    Arc::new(|_: &Record| true)
}

fn fingerprint_of(segment: &str) -> u64 {
    seahash::hash(segment.as_bytes())
}

/// Compiles a WHERE clause. Blank text matches every record.
pub fn parse_where(text: &str) -> Result<Query> {
    let clause = parse_single(Rule::where_clause, text)?;
    let condition = clause.into_inner().find(|p| p.as_rule() == Rule::condition);
    compile_condition(condition)
}

/// Compiles a comma separated list of assignments into one mutation that
/// applies them left to right.
pub fn parse_set(text: &str) -> Result<Mutation> {
    let clause = parse_single(Rule::set_clause, text)?;
    let assignments = clause
        .into_inner()
        .find(|p| p.as_rule() == Rule::assignments)
        .ok_or_else(|| CabinetError::syntax("expected at least one assignment"))?;
    compile_assignments(assignments)
}

/// Builds a record from parallel lists of field names and raw values.
/// Every value is converted before any field is set.
pub fn parse_insert_values<N, V>(field_names: &[N], raw_values: &[V]) -> Result<Record>
where
    N: AsRef<str>,
    V: AsRef<str>,
{
    if field_names.len() != raw_values.len() {
        return Err(CabinetError::Arity { fields: field_names.len(), values: raw_values.len() });
    }
    let mut bound: Vec<(&'static FieldDescriptor, Value)> = Vec::with_capacity(field_names.len());
    for (name, raw) in field_names.iter().zip(raw_values) {
        let descriptor = resolve(name.as_ref())?;
        bound.push((descriptor, descriptor.convert(raw.as_ref())?));
    }
    let mut record = Record::default();
    for (descriptor, value) in bound {
        descriptor.set(&mut record, value);
    }
    Ok(record)
}

/// Resolves a comma separated field list, or `*` for every field.
pub fn parse_select(field_list: &str) -> Result<Projector> {
    let clause = parse_single(Rule::select_clause, field_list)?;
    let fields = clause
        .into_inner()
        .find(|p| p.as_rule() == Rule::field_list)
        .ok_or_else(|| CabinetError::syntax("expected a field list"))?;
    compile_field_list(fields)
}

fn parse_single(rule: Rule, text: &str) -> Result<Pair<'_, Rule>> {
    ClauseParser::parse(rule, text)?
        .next()
        .ok_or_else(|| CabinetError::syntax(format!("nothing to parse in '{text}'")))
}

// ------------- Pair compilers, shared with the statement engine -------------

/// The unquoted text of a `quoted` or `bare` value pair.
pub(crate) fn value_text<'i>(pair: &Pair<'i, Rule>) -> &'i str {
    match pair.as_rule() {
        Rule::quoted => pair.clone().into_inner().next().map(|t| t.as_str()).unwrap_or(""),
        _ => pair.as_str(),
    }
}

// A comparison or an assignment: a field pair followed by a value pair.
fn bind(pair: Pair<'_, Rule>) -> Result<(&'static FieldDescriptor, Value, String)> {
    let mut inner = pair.into_inner();
    let (Some(field), Some(value)) = (inner.next(), inner.next()) else {
        return Err(CabinetError::syntax("expected field = value"));
    };
    let descriptor = resolve(field.as_str())?;
    let raw = value_text(&value);
    let converted = descriptor.convert(raw)?;
    Ok((descriptor, converted, format!("{}={}", descriptor.name, raw)))
}

pub(crate) fn compile_condition(condition: Option<Pair<'_, Rule>>) -> Result<Query> {
    let Some(condition) = condition else {
        return Ok(Query { predicate: accept_all(), mutation: None, projector: None, fingerprint: 0 });
    };
    let mut predicate: Option<Predicate> = None;
    let mut connective = Connective::And;
    let mut fingerprint: u64 = 0;
    for pair in condition.into_inner() {
        match pair.as_rule() {
            Rule::comparison => {
                let (descriptor, value, segment) = bind(pair)?;
                fingerprint = fingerprint.wrapping_add(fingerprint_of(&segment));
                let comparison = descriptor.build_predicate(value);
                predicate = Some(match predicate {
                    None => comparison,
                    Some(running) => connective.combine(running, comparison),
                });
            }
            Rule::and_op | Rule::or_op => {
                connective = if pair.as_rule() == Rule::and_op { Connective::And } else { Connective::Or };
                fingerprint = fingerprint.wrapping_add(fingerprint_of(connective.keyword()));
            }
            _ => return Err(CabinetError::syntax(format!("unexpected '{}'", pair.as_str()))),
        }
    }
    Ok(Query {
        predicate: predicate.unwrap_or_else(accept_all),
        mutation: None,
        projector: None,
        fingerprint,
    })
}

pub(crate) fn compile_assignments(assignments: Pair<'_, Rule>) -> Result<Mutation> {
    let mut bound: Vec<(&'static FieldDescriptor, Value)> = Vec::new();
    for assignment in assignments.into_inner() {
        let (descriptor, value, _) = bind(assignment)?;
        bound.push((descriptor, value));
    }
    Ok(Arc::new(move |record: &mut Record| {
        for (descriptor, value) in &bound {
            descriptor.set(record, value.clone());
        }
    }))
}

pub(crate) fn compile_field_list(fields: Pair<'_, Rule>) -> Result<Projector> {
    let mut columns = Vec::new();
    for field in fields.into_inner() {
        match field.as_rule() {
            Rule::star => return Ok(Projector::all()),
            _ => columns.push(resolve(field.as_str())?),
        }
    }
    Ok(Projector::new(columns))
}

pub(crate) fn field_names<'i>(fields: Pair<'i, Rule>) -> Vec<&'i str> {
    fields.into_inner().map(|f| f.as_str()).collect()
}

pub(crate) fn value_list<'i>(values: Pair<'i, Rule>) -> Vec<&'i str> {
    values.into_inner().map(|v| value_text(&v)).collect()
}
