// used for dates of birth
use chrono::NaiveDate;
// used for identification numbers
use bigdecimal::BigDecimal;

// used when parsing a string to a decimal
use std::str::FromStr;
// used to print out readable forms of a value
use std::fmt;
// used to overload common operations for datatypes
use std::ops;

use lazy_static::lazy_static;
use regex::Regex;

/// The display format for dates, also the first format tried when parsing.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

lazy_static! {
    static ref ISO_DATE: Regex = Regex::new(r"^\d{4}-\d{1,2}-\d{1,2}$").unwrap();
    static ref US_DATE: Regex = Regex::new(r"^\d{1,2}/\d{1,2}/\d{4}$").unwrap();
}

/// A typed value carried from a converter to a setter or predicate builder.
#[derive(Eq, PartialEq, Hash, Clone, Debug)]
pub enum Value {
    Text(String),
    Date(NaiveDate),
    Decimal(Decimal),
    Int(i32),
    Short(i16),
    Letter(char),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Int(i) => write!(f, "{}", i),
            Value::Short(s) => write!(f, "{}", s),
            Value::Letter(c) => write!(f, "{}", c),
        }
    }
}

#[derive(Eq, PartialEq, Hash, PartialOrd, Ord, Clone, Debug, Default)]
pub struct Decimal(BigDecimal);

impl Decimal {
    pub fn new(value: BigDecimal) -> Self {
        Self(value)
    }
    pub fn from_str(s: &str) -> Option<Decimal> {
        match BigDecimal::from_str(s.trim()) {
            Ok(decimal) => Some(Decimal(decimal)),
            _ => None,
        }
    }
}
impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Self(BigDecimal::from(value))
    }
}
impl ops::Deref for Decimal {
    type Target = BigDecimal;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Parses `YYYY-MM-DD` or `MM/DD/YYYY`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if ISO_DATE.is_match(s) {
        NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
    } else if US_DATE.is_match(s) {
        NaiveDate::parse_from_str(s, "%m/%d/%Y").ok()
    } else {
        None
    }
}

/// Parses a value that must consist of exactly one character.
pub fn parse_letter(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}
