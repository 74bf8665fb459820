use std::collections::HashMap;
use std::sync::Mutex;

use pest::Parser;
use serde::Serialize;
use tracing::debug;

use crate::construct::{OtherHasher, Record, RecordId, RecordStore};
use crate::error::{CabinetError, Result};
use crate::projection::{Projector, Row};
use crate::query::{
    compile_assignments, compile_condition, compile_field_list, field_names, parse_insert_values,
    value_list, ClauseParser, Query, Rule,
};

/// A statement compiled against the field registry, ready to run.
#[derive(Clone)]
pub enum Statement {
    Insert { record: Record, generate_id: bool },
    Select { query: Query, text: String },
    Update { query: Query },
    Delete { query: Query },
}
impl Statement {
    pub fn is_read_only(&self) -> bool {
        matches!(self, Statement::Select { .. })
    }
}

#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    /// Records inserted, updated or deleted.
    pub affected: usize,
    /// Ids of inserted or deleted records.
    pub ids: Vec<RecordId>,
}

/// Selects remembered at once; the memo starts over when full.
const MEMO_CAPACITY: usize = 1024;

struct Memo {
    text: String,
    instance: u64,
    revision: u64,
    result: QueryResult,
}

/// Compiles and runs statements:
///
/// * `insert (firstname, lastname, ...) values ('John', 'Doe', ...)`
/// * `select firstname, lastname where points = '10' or letter = 'A'`
/// * `update set points = '99' where lastname = 'Lee'`
/// * `delete where id = '1'`
///
/// Select results are remembered per store until that store changes.
pub struct Engine {
    memo: Mutex<HashMap<u64, Memo, OtherHasher>>,
}

impl Engine {
    pub fn new() -> Self {
        Self { memo: Mutex::new(HashMap::default()) }
    }

    pub fn compile(&self, text: &str) -> Result<Statement> {
        let statement = ClauseParser::parse(Rule::statement, text)?
            .next()
            .and_then(|s| s.into_inner().next())
            .ok_or_else(|| CabinetError::syntax(format!("no statement in '{text}'")))?;
        let rule = statement.as_rule();
        let mut parts = statement.into_inner().filter(|p| {
            !matches!(
                p.as_rule(),
                Rule::kw_insert | Rule::kw_values | Rule::kw_select | Rule::kw_update | Rule::kw_set | Rule::kw_delete | Rule::kw_where
            )
        });
        match rule {
            Rule::insert => {
                let (Some(fields), Some(values)) = (parts.next(), parts.next()) else {
                    return Err(CabinetError::syntax("insert needs a field list and a value list"));
                };
                let names = field_names(fields);
                let record = parse_insert_values(&names, &value_list(values))?;
                let generate_id = !names.iter().any(|n| n.eq_ignore_ascii_case("id"));
                Ok(Statement::Insert { record, generate_id })
            }
            Rule::select => {
                let fields = parts.next().ok_or_else(|| CabinetError::syntax("select needs a field list"))?;
                let projector = compile_field_list(fields)?;
                let query = Query { projector: Some(projector), ..compile_condition(parts.next())? };
                Ok(Statement::Select { query, text: text.trim().to_string() })
            }
            Rule::update => {
                let assignments = parts.next().ok_or_else(|| CabinetError::syntax("update needs assignments"))?;
                let mutation = compile_assignments(assignments)?;
                let query = Query { mutation: Some(mutation), ..compile_condition(parts.next())? };
                Ok(Statement::Update { query })
            }
            Rule::delete => {
                let query = compile_condition(parts.next())?;
                Ok(Statement::Delete { query })
            }
            other => Err(CabinetError::syntax(format!("unexpected {other:?}"))),
        }
    }

    /// Compiles and runs one statement.
    pub fn execute(&self, store: &mut dyn RecordStore, text: &str) -> Result<QueryResult> {
        let statement = self.compile(text)?;
        self.run(store, statement)
    }

    /// Runs a statement; selects are answered without mutating.
    pub fn run(&self, store: &mut dyn RecordStore, statement: Statement) -> Result<QueryResult> {
        match statement {
            Statement::Insert { record, generate_id } => {
                let id = store.create(record, generate_id)?;
                Ok(QueryResult { affected: 1, ids: vec![id], ..Default::default() })
            }
            Statement::Update { query } => {
                let mutation = query
                    .mutation
                    .as_ref()
                    .ok_or_else(|| CabinetError::Invariant("update compiled without assignments".into()))?;
                let affected = store.update_where(&query.predicate, mutation);
                Ok(QueryResult { affected, ..Default::default() })
            }
            Statement::Delete { query } => {
                let ids = store.delete_where(&query.predicate);
                Ok(QueryResult { affected: ids.len(), ids, ..Default::default() })
            }
            select @ Statement::Select { .. } => self.run_read(&*store, &select),
        }
    }

    /// Runs a read-only statement.
    pub fn run_read(&self, store: &dyn RecordStore, statement: &Statement) -> Result<QueryResult> {
        let Statement::Select { query, text } = statement else {
            return Err(CabinetError::Invariant("a mutating statement needs exclusive access".into()));
        };
        let all = Projector::all();
        let projector = query.projector.as_ref().unwrap_or(&all);
        let key = query.fingerprint ^ seahash::hash(projector.headers().join(",").as_bytes());
        let (instance, revision) = (store.instance(), store.revision());
        {
            let memo = self.memo.lock().map_err(|e| CabinetError::Lock(e.to_string()))?;
            if let Some(kept) = memo.get(&key) {
                if kept.instance == instance && kept.revision == revision && kept.text == *text {
                    debug!(fingerprint = key, "select answered from memo");
                    return Ok(kept.result.clone());
                }
            }
        }
        let rows: Vec<Row> = store.select(&query.predicate, projector).collect();
        let result = QueryResult { columns: projector.headers(), rows, ..Default::default() };
        let mut memo = self.memo.lock().map_err(|e| CabinetError::Lock(e.to_string()))?;
        // stale answers can never hit again
        memo.retain(|_, kept| kept.instance == instance && kept.revision == revision);
        if memo.len() >= MEMO_CAPACITY {
            memo.clear();
        }
        memo.insert(key, Memo { text: text.clone(), instance, revision, result: result.clone() });
        Ok(result)
    }

    /// Number of remembered select results.
    pub fn memo_len(&self) -> usize {
        self.memo.lock().map(|memo| memo.len()).unwrap_or(0)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
