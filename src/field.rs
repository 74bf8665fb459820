//! The field registry: one descriptor per record field, binding its name to
//! a converter, a getter, a setter and a predicate builder.
//!
//! Descriptors are plain tables of function pointers, built once and shared
//! by the query compiler, the store and the projection.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use lazy_static::lazy_static;

use crate::construct::{OtherHasher, Predicate, Record};
use crate::datatype::{parse_date, parse_letter, Decimal, Value, DATE_FORMAT};
use crate::error::{CabinetError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    FirstName,
    LastName,
    DateOfBirth,
    IdentificationNumber,
    Points,
    Letter,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Id,
        Field::FirstName,
        Field::LastName,
        Field::DateOfBirth,
        Field::IdentificationNumber,
        Field::Points,
        Field::Letter,
    ];
    pub fn name(self) -> &'static str {
        descriptor(self).name
    }
}
impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

type Converter = fn(&str) -> std::result::Result<Value, String>;
type Getter = fn(&Record) -> String;
type Setter = fn(&mut Record, Value);
type PredicateBuilder = fn(Value) -> Predicate;

#[derive(Debug)]
pub struct FieldDescriptor {
    pub field: Field,
    pub name: &'static str,
    converter: Converter,
    getter: Getter,
    setter: Setter,
    predicate_builder: PredicateBuilder,
}

impl FieldDescriptor {
    pub fn convert(&self, text: &str) -> Result<Value> {
        (self.converter)(text).map_err(|reason| CabinetError::conversion(self.name, text, reason))
    }
    pub fn get(&self, record: &Record) -> String {
        (self.getter)(record)
    }
    // Values come from `convert` of the same descriptor, so the variant matches.
    pub fn set(&self, record: &mut Record, value: Value) {
        (self.setter)(record, value)
    }
    pub fn build_predicate(&self, value: Value) -> Predicate {
        (self.predicate_builder)(value)
    }
}

// ------------- Converters -------------
fn convert_int(text: &str) -> std::result::Result<Value, String> {
    text.trim().parse::<i32>().map(Value::Int).map_err(|e| e.to_string())
}
fn convert_text(text: &str) -> std::result::Result<Value, String> {
    Ok(Value::Text(text.to_string()))
}
fn convert_date(text: &str) -> std::result::Result<Value, String> {
    parse_date(text)
        .map(Value::Date)
        .ok_or_else(|| "expected a date as YYYY-MM-DD or MM/DD/YYYY".to_string())
}
fn convert_decimal(text: &str) -> std::result::Result<Value, String> {
    Decimal::from_str(text)
        .map(Value::Decimal)
        .ok_or_else(|| "expected a decimal number".to_string())
}
fn convert_short(text: &str) -> std::result::Result<Value, String> {
    text.trim().parse::<i16>().map(Value::Short).map_err(|e| e.to_string())
}
fn convert_letter(text: &str) -> std::result::Result<Value, String> {
    parse_letter(text)
        .map(Value::Letter)
        .ok_or_else(|| "expected exactly one character".to_string())
}

// ------------- Accessors -------------
macro_rules! accessors {
    ($member:ident, $variant:ident, $set:ident, $equals:ident) => {
        fn $set(record: &mut Record, value: Value) {
            if let Value::$variant(v) = value {
                record.$member = v;
            }
        }
        fn $equals(value: Value) -> Predicate {
            match value {
                Value::$variant(v) => Arc::new(move |record: &Record| record.$member == v),
                _ => Arc::new(|_: &Record| false),
            }
        }
    };
}

accessors!(id, Int, set_id, id_equals);
accessors!(first_name, Text, set_first_name, first_name_equals);
accessors!(last_name, Text, set_last_name, last_name_equals);
accessors!(date_of_birth, Date, set_date_of_birth, date_of_birth_equals);
accessors!(identification_number, Decimal, set_identification_number, identification_number_equals);
accessors!(points, Short, set_points, points_equals);
accessors!(identification_letter, Letter, set_letter, letter_equals);

// Ordered like Field::ALL.
static DESCRIPTORS: [FieldDescriptor; 7] = [
    FieldDescriptor {
        field: Field::Id,
        name: "id",
        converter: convert_int,
        getter: |r: &Record| r.id.to_string(),
        setter: set_id,
        predicate_builder: id_equals,
    },
    FieldDescriptor {
        field: Field::FirstName,
        name: "firstname",
        converter: convert_text,
        getter: |r: &Record| r.first_name.clone(),
        setter: set_first_name,
        predicate_builder: first_name_equals,
    },
    FieldDescriptor {
        field: Field::LastName,
        name: "lastname",
        converter: convert_text,
        getter: |r: &Record| r.last_name.clone(),
        setter: set_last_name,
        predicate_builder: last_name_equals,
    },
    FieldDescriptor {
        field: Field::DateOfBirth,
        name: "dateofbirth",
        converter: convert_date,
        getter: |r: &Record| r.date_of_birth.format(DATE_FORMAT).to_string(),
        setter: set_date_of_birth,
        predicate_builder: date_of_birth_equals,
    },
    FieldDescriptor {
        field: Field::IdentificationNumber,
        name: "identificationnumber",
        converter: convert_decimal,
        getter: |r: &Record| r.identification_number.to_string(),
        setter: set_identification_number,
        predicate_builder: identification_number_equals,
    },
    FieldDescriptor {
        field: Field::Points,
        name: "points",
        converter: convert_short,
        getter: |r: &Record| r.points.to_string(),
        setter: set_points,
        predicate_builder: points_equals,
    },
    FieldDescriptor {
        field: Field::Letter,
        name: "letter",
        converter: convert_letter,
        getter: |r: &Record| r.identification_letter.to_string(),
        setter: set_letter,
        predicate_builder: letter_equals,
    },
];

lazy_static! {
    static ref BY_NAME: HashMap<&'static str, Field, OtherHasher> =
        DESCRIPTORS.iter().map(|d| (d.name, d.field)).collect();
}

pub fn descriptor(field: Field) -> &'static FieldDescriptor {
    &DESCRIPTORS[field as usize]
}

/// All descriptors in canonical order.
pub fn descriptors() -> impl Iterator<Item = &'static FieldDescriptor> {
    DESCRIPTORS.iter()
}

/// Looks a field up by name, ignoring case and surrounding whitespace.
pub fn resolve(name: &str) -> Result<&'static FieldDescriptor> {
    let name = name.trim();
    BY_NAME
        .get(name.to_lowercase().as_str())
        .map(|field| descriptor(*field))
        .ok_or_else(|| CabinetError::UnknownField(name.to_string()))
}

pub fn convert(name: &str, text: &str) -> Result<Value> {
    resolve(name)?.convert(text)
}
