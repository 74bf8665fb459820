use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use filecabinet::construct::{Cabinet, CabinetConfig, Record, RecordStore};
use filecabinet::datatype::Decimal;
use filecabinet::persist::PersistenceMode;
use filecabinet::settings::{Settings, Storage};
use filecabinet::validation::{load_rule_sets, RuleValidator, ValidationRules, Validator};
use filecabinet::CabinetError;

fn valid() -> Record {
    Record {
        id: 1,
        first_name: "Ann".to_string(),
        last_name: "Lee".to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 1).unwrap(),
        identification_number: Decimal::from(100),
        identification_letter: 'A',
        points: 50,
    }
}

#[test]
fn default_rules_check_every_field() {
    let validator = RuleValidator::new(ValidationRules::default_rules());
    assert!(validator.validate(&valid()).is_ok());

    let cases: Vec<(&str, Box<dyn Fn(&mut Record)>)> = vec![
        ("short first name", Box::new(|r: &mut Record| r.first_name = "A".into())),
        ("blank last name", Box::new(|r: &mut Record| r.last_name = "   ".into())),
        ("born too early", Box::new(|r: &mut Record| r.date_of_birth = NaiveDate::from_ymd_opt(1949, 12, 31).unwrap())),
        ("born tomorrow", Box::new(|r: &mut Record| r.date_of_birth = Local::now().date_naive().succ_opt().unwrap())),
        ("zero number", Box::new(|r: &mut Record| r.identification_number = Decimal::from(0))),
        ("lowercase letter", Box::new(|r: &mut Record| r.identification_letter = 'a')),
        ("negative points", Box::new(|r: &mut Record| r.points = -1)),
        ("too many points", Box::new(|r: &mut Record| r.points = 1001)),
    ];
    for (label, change) in cases {
        let mut record = valid();
        change(&mut record);
        assert!(validator.validate(&record).is_err(), "{label} should be rejected");
    }
}

#[test]
fn custom_rules_are_looser() {
    let validator = RuleValidator::new(ValidationRules::custom_rules());
    let mut record = valid();
    record.first_name = "A".into();
    record.identification_letter = 'a';
    record.points = -500;
    record.date_of_birth = NaiveDate::from_ymd_opt(1920, 1, 1).unwrap();
    assert!(validator.validate(&record).is_ok());
}

#[test]
fn rule_sets_are_picked_by_name() {
    let none = HashMap::new();
    assert_eq!(ValidationRules::named("default", &none).unwrap(), ValidationRules::default_rules());
    assert_eq!(ValidationRules::named("custom", &none).unwrap(), ValidationRules::custom_rules());
    assert!(matches!(ValidationRules::named("strict", &none), Err(CabinetError::Config(_))));
}

#[test]
fn rule_sets_load_from_json() {
    let mut strict = ValidationRules::default_rules();
    strict.points.max = 10;
    let sets = HashMap::from([("strict".to_string(), strict.clone())]);
    let path = std::env::temp_dir().join(format!("filecabinet_rules_{}.json", std::process::id()));
    std::fs::write(&path, serde_json::to_string(&sets).unwrap()).unwrap();
    let loaded = load_rule_sets(&path).expect("rule sets");
    let _ = std::fs::remove_file(&path);
    let picked = ValidationRules::named("strict", &loaded).unwrap();
    assert_eq!(picked, strict);

    let mut cabinet = Cabinet::new(CabinetConfig::new(Arc::new(RuleValidator::new(picked))));
    assert!(matches!(cabinet.create(valid(), true), Err(CabinetError::Validation { .. })));
}

#[test]
fn missing_rule_file_is_a_config_error() {
    let path = std::env::temp_dir().join("filecabinet_no_such_rules.json");
    assert!(matches!(load_rule_sets(&path), Err(CabinetError::Config(_))));
}

#[test]
fn settings_default_to_memory() {
    let settings = Settings::from_file("filecabinet_missing_settings").expect("defaults apply");
    assert_eq!(settings.storage, Storage::Memory);
    assert_eq!(settings.persistence_mode(), PersistenceMode::InMemory);
    assert_eq!(settings.rules, "default");
    assert!(settings.rules_file.is_none());
    assert_eq!(settings.validation_rules().unwrap(), ValidationRules::default_rules());
}

#[test]
fn settings_file_selects_storage_and_rules() {
    let name = std::env::temp_dir().join(format!("filecabinet_settings_{}", std::process::id()));
    let file = name.with_extension("toml");
    std::fs::write(&file, "storage = \"file\"\npath = \"people.db\"\nrules = \"custom\"\n").unwrap();
    let settings = Settings::from_file(name.to_str().unwrap()).expect("settings");
    let _ = std::fs::remove_file(&file);
    assert_eq!(settings.storage, Storage::File);
    assert_eq!(settings.persistence_mode(), PersistenceMode::File("people.db".into()));
    assert_eq!(settings.validation_rules().unwrap(), ValidationRules::custom_rules());
    assert!(settings.cabinet_config().is_ok());
}
