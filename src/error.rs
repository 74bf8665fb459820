use thiserror::Error;

use crate::query::Rule;

#[derive(Error, Debug)]
pub enum CabinetError {
    #[error("Syntax error: {message}")]
    Syntax { message: String, line: Option<usize>, col: Option<usize> },
    #[error("Unknown field: '{0}'")]
    UnknownField(String),
    #[error("Cannot convert '{value}' for field '{field}': {reason}")]
    Conversion { field: String, value: String, reason: String },
    #[error("Expected as many values as fields, got {fields} field(s) and {values} value(s)")]
    Arity { fields: usize, values: usize },
    #[error("Record #{id} is invalid: {reason}")]
    Validation { id: i32, reason: String },
    #[error("Record #{id} does not exist")]
    NotFound { id: i32 },
    #[error("Config error: {0}")]
    Config(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, CabinetError>;

impl CabinetError {
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax { message: message.into(), line: None, col: None }
    }
    pub fn conversion(field: &str, value: &str, reason: impl ToString) -> Self {
        Self::Conversion {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

// Helper conversions
impl From<std::io::Error> for CabinetError {
    fn from(e: std::io::Error) -> Self { Self::Persistence(e.to_string()) }
}

impl From<config::ConfigError> for CabinetError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}

impl From<pest::error::Error<Rule>> for CabinetError {
    fn from(e: pest::error::Error<Rule>) -> Self {
        let (line, col) = match e.line_col {
            pest::error::LineColLocation::Pos((l, c)) => (l, c),
            pest::error::LineColLocation::Span((l, c), _) => (l, c),
        };
        Self::Syntax { message: e.variant.message().to_string(), line: Some(line), col: Some(col) }
    }
}
