//! Record validation. The store only knows the [`Validator`] contract; the
//! rule sets below are what the command line and the server plug in.

use std::collections::HashMap;
use std::path::Path;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::construct::Record;
use crate::datatype::Decimal;
use crate::error::{CabinetError, Result};

pub trait Validator: Send + Sync {
    /// Returns the reason the record is rejected, if it is.
    fn validate(&self, record: &Record) -> std::result::Result<(), String>;
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LengthRule {
    pub min: usize,
    pub max: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DateRule {
    pub from: NaiveDate,
    // None means today
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RangeRule<T> {
    pub min: T,
    pub max: T,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ValidationRules {
    pub first_name: LengthRule,
    pub last_name: LengthRule,
    pub date_of_birth: DateRule,
    pub identification_number: RangeRule<i64>,
    pub identification_letters: String,
    pub points: RangeRule<i16>,
}

impl ValidationRules {
    pub fn default_rules() -> Self {
        Self {
            first_name: LengthRule { min: 2, max: 60 },
            last_name: LengthRule { min: 2, max: 60 },
            date_of_birth: DateRule {
                from: NaiveDate::from_ymd_opt(1950, 1, 1).unwrap_or_default(),
                to: None,
            },
            identification_number: RangeRule { min: 1, max: 999_999_999 },
            identification_letters: ('A'..='Z').collect(),
            points: RangeRule { min: 0, max: 1000 },
        }
    }
    pub fn custom_rules() -> Self {
        Self {
            first_name: LengthRule { min: 1, max: 30 },
            last_name: LengthRule { min: 1, max: 30 },
            date_of_birth: DateRule {
                from: NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or_default(),
                to: None,
            },
            identification_number: RangeRule { min: 0, max: 9_999_999_999 },
            identification_letters: ('A'..='Z').chain('a'..='z').collect(),
            points: RangeRule { min: -1000, max: 10_000 },
        }
    }
    /// Picks a rule set by name: `default`, `custom`, or one defined in `sets`.
    pub fn named(name: &str, sets: &HashMap<String, ValidationRules>) -> Result<Self> {
        if let Some(rules) = sets.get(name) {
            return Ok(rules.clone());
        }
        match name {
            "default" => Ok(Self::default_rules()),
            "custom" => Ok(Self::custom_rules()),
            other => Err(CabinetError::Config(format!("unknown validation rule set '{other}'"))),
        }
    }
}

/// Reads `{"default": {...}, "custom": {...}}` style rule sets from a JSON file.
pub fn load_rule_sets(path: &Path) -> Result<HashMap<String, ValidationRules>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CabinetError::Config(format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_str(&text)
        .map_err(|e| CabinetError::Config(format!("invalid rule sets in {}: {e}", path.display())))
}

#[derive(Clone, Debug)]
pub struct RuleValidator {
    rules: ValidationRules,
}

impl RuleValidator {
    pub fn new(rules: ValidationRules) -> Self {
        Self { rules }
    }
    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }
}

fn check_length(field: &str, value: &str, rule: &LengthRule) -> std::result::Result<(), String> {
    let length = value.trim().chars().count();
    if length < rule.min || length > rule.max {
        return Err(format!("{field} must be {} to {} characters long", rule.min, rule.max));
    }
    Ok(())
}

impl Validator for RuleValidator {
    fn validate(&self, record: &Record) -> std::result::Result<(), String> {
        let rules = &self.rules;
        check_length("first name", &record.first_name, &rules.first_name)?;
        check_length("last name", &record.last_name, &rules.last_name)?;

        let to = rules.date_of_birth.to.unwrap_or_else(|| Local::now().date_naive());
        if record.date_of_birth < rules.date_of_birth.from || record.date_of_birth > to {
            return Err(format!(
                "date of birth must be between {} and {}",
                rules.date_of_birth.from, to
            ));
        }

        let min = Decimal::from(rules.identification_number.min);
        let max = Decimal::from(rules.identification_number.max);
        if record.identification_number < min || record.identification_number > max {
            return Err(format!("identification number must be between {min} and {max}"));
        }

        if !rules.identification_letters.contains(record.identification_letter) {
            return Err(format!(
                "identification letter '{}' is not one of {}",
                record.identification_letter, rules.identification_letters
            ));
        }

        if record.points < rules.points.min || record.points > rules.points.max {
            return Err(format!(
                "points must be between {} and {}",
                rules.points.min, rules.points.max
            ));
        }
        Ok(())
    }
}

/// Accepts every record.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl Validator for AcceptAll {
    fn validate(&self, _record: &Record) -> std::result::Result<(), String> {
        Ok(())
    }
}
