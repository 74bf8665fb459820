use std::sync::Arc;

use chrono::NaiveDate;
use filecabinet::construct::{Cabinet, CabinetConfig, Mutation, Predicate, Record, RecordStore};
use filecabinet::datatype::Decimal;
use filecabinet::projection::{project, Projector};
use filecabinet::query::{parse_select, parse_set, parse_where};
use filecabinet::validation::AcceptAll;
use filecabinet::CabinetError;

fn person(first: &str, last: &str, born: (i32, u32, u32), points: i16) -> Record {
    Record {
        id: 0,
        first_name: first.to_string(),
        last_name: last.to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(born.0, born.1, born.2).unwrap(),
        identification_number: Decimal::from(100),
        identification_letter: 'A',
        points,
    }
}

fn ann() -> Record {
    person("Ann", "Lee", (1990, 5, 1), 50)
}

fn seeded() -> Cabinet {
    let mut cabinet = Cabinet::default();
    cabinet.create(ann(), true).unwrap();
    cabinet.create(person("Bob", "Lee", (1985, 1, 20), 10), true).unwrap();
    cabinet.create(person("Cid", "Ray", (1990, 5, 1), 30), true).unwrap();
    cabinet
}

#[test]
fn create_then_delete_clears_indexes() {
    let mut cabinet = Cabinet::default();
    let id = cabinet.create(ann(), true).expect("valid record");
    assert_eq!(id, 1);
    assert_eq!(cabinet.find_by_first_name("Ann").len(), 1);
    cabinet.delete(1).expect("live record");
    assert!(cabinet.find_by_first_name("Ann").is_empty());
    assert!(cabinet.find_by_last_name("Lee").is_empty());
    assert!(cabinet.get(1).is_none());
    assert_eq!(cabinet.count(), 0);
    cabinet.verify_indexes().unwrap();
}

#[test]
fn generated_ids_stay_unique_after_deletes() {
    let mut cabinet = seeded();
    cabinet.delete(1).unwrap();
    // two live records, so the next id starts at 3 and skips to 4
    let id = cabinet.create(person("Dee", "Fox", (1970, 2, 2), 5), true).unwrap();
    assert_eq!(id, 4);
    assert_eq!(cabinet.count(), 3);
    cabinet.verify_indexes().unwrap();
}

#[test]
fn name_lookups_ignore_case() {
    let cabinet = seeded();
    let lees: Vec<i32> = cabinet.find_by_last_name("LEE").iter().map(|r| r.id).collect();
    assert_eq!(lees, vec![1, 2]);
    assert_eq!(cabinet.find_by_first_name("bob")[0].id, 2);
    assert!(cabinet.find_by_first_name("Nobody").is_empty());
}

#[test]
fn find_by_date_of_birth_returns_insertion_order() {
    let cabinet = seeded();
    let born = NaiveDate::from_ymd_opt(1990, 5, 1).unwrap();
    let ids: Vec<i32> = cabinet.find_by_date_of_birth(born).iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 3]);
}

#[test]
fn invalid_record_is_rejected_on_create() {
    let mut cabinet = Cabinet::default();
    let mut young = ann();
    young.date_of_birth = NaiveDate::from_ymd_opt(1949, 12, 31).unwrap();
    let err = cabinet.create(young, true).err().expect("too early");
    assert!(matches!(err, CabinetError::Validation { .. }));
    assert_eq!(cabinet.count(), 0);
    assert_eq!(cabinet.revision(), 0);
}

#[test]
fn failed_edit_leaves_record_and_indexes_untouched() {
    let mut cabinet = seeded();
    let before = cabinet.get(1).cloned().unwrap();
    let err = cabinet
        .edit(1, &|r: &mut Record| {
            r.first_name = "A".to_string();
            r.points = 5000;
        })
        .err()
        .expect("invalid edit");
    assert!(matches!(err, CabinetError::Validation { id: 1, .. }));
    assert_eq!(cabinet.get(1), Some(&before));
    assert_eq!(cabinet.find_by_first_name("Ann").len(), 1);
    assert!(cabinet.find_by_first_name("A").is_empty());
    cabinet.verify_indexes().unwrap();
}

#[test]
fn edit_moves_index_entries() {
    let mut cabinet = seeded();
    cabinet
        .edit(2, &|r: &mut Record| {
            r.last_name = "Moe".to_string();
            r.date_of_birth = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        })
        .unwrap();
    assert_eq!(cabinet.find_by_last_name("Lee").len(), 1);
    assert_eq!(cabinet.find_by_last_name("moe")[0].id, 2);
    assert_eq!(cabinet.find_by_date_of_birth(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()).len(), 1);
    assert!(cabinet.find_by_date_of_birth(NaiveDate::from_ymd_opt(1985, 1, 20).unwrap()).is_empty());
    cabinet.verify_indexes().unwrap();
}

#[test]
fn edit_to_a_taken_id_is_rejected() {
    let mut cabinet = seeded();
    let err = cabinet.edit(3, &|r: &mut Record| r.id = 1).err().expect("id 1 is live");
    assert!(matches!(err, CabinetError::Validation { .. }));
    assert_eq!(cabinet.get(3).map(|r| r.first_name.as_str()), Some("Cid"));
    cabinet.verify_indexes().unwrap();
}

#[test]
fn edit_and_delete_of_missing_ids_fail() {
    let mut cabinet = seeded();
    assert!(matches!(cabinet.delete(42), Err(CabinetError::NotFound { id: 42 })));
    assert!(matches!(cabinet.edit(42, &|_: &mut Record| {}), Err(CabinetError::NotFound { id: 42 })));
    assert_eq!(cabinet.count(), 3);
}

#[test]
fn create_with_a_live_id_replaces_it() {
    let mut cabinet = seeded();
    let mut replacement = person("Eve", "Kim", (1975, 7, 7), 1);
    replacement.id = 2;
    assert_eq!(cabinet.create(replacement, false).unwrap(), 2);
    assert_eq!(cabinet.count(), 3);
    assert!(cabinet.find_by_first_name("Bob").is_empty());
    assert_eq!(cabinet.find_by_first_name("Eve")[0].id, 2);
    cabinet.verify_indexes().unwrap();
}

#[test]
fn update_where_changes_only_matches() {
    let mut cabinet = seeded();
    let query = parse_where("lastname = 'Lee'").unwrap();
    let mutation = parse_set("points = '99'").unwrap();
    assert_eq!(cabinet.update_where(&query.predicate, &mutation), 2);
    assert_eq!(cabinet.get(1).unwrap().points, 99);
    assert_eq!(cabinet.get(2).unwrap().points, 99);
    assert_eq!(cabinet.get(3).unwrap().points, 30);
}

#[test]
fn update_where_skips_records_that_fail_validation() {
    let mut cabinet = seeded();
    cabinet.edit(2, &|r: &mut Record| r.points = 995).unwrap();
    let everyone: Predicate = Arc::new(|_: &Record| true);
    let add_ten: Mutation = Arc::new(|r: &mut Record| r.points += 10);
    // Bob would reach 1005, beyond the limit of 1000, and is skipped
    assert_eq!(cabinet.update_where(&everyone, &add_ten), 2);
    assert_eq!(cabinet.get(1).unwrap().points, 60);
    assert_eq!(cabinet.get(2).unwrap().points, 995);
    assert_eq!(cabinet.get(3).unwrap().points, 40);
}

#[test]
fn delete_where_reports_ids_in_list_order() {
    let mut cabinet = seeded();
    let query = parse_where("dateofbirth = '1990-05-01'").unwrap();
    assert_eq!(cabinet.delete_where(&query.predicate), vec![1, 3]);
    assert_eq!(cabinet.count(), 1);
    assert!(cabinet.delete_where(&query.predicate).is_empty());
    cabinet.verify_indexes().unwrap();
}

#[test]
fn select_projects_requested_columns() {
    let cabinet = seeded();
    let query = parse_where("lastname = 'Lee'").unwrap();
    let projector = parse_select("lastname, id, dateofbirth").unwrap();
    let rows: Vec<Vec<String>> = cabinet.select(&query.predicate, &projector).collect();
    assert_eq!(
        rows,
        vec![
            vec!["Lee".to_string(), "1".to_string(), "1990-05-01".to_string()],
            vec!["Lee".to_string(), "2".to_string(), "1985-01-20".to_string()],
        ]
    );
    assert_eq!(projector.headers(), vec!["lastname", "id", "dateofbirth"]);
}

#[test]
fn project_maps_found_records_in_header_order() {
    let cabinet = seeded();
    let projector = parse_select("firstname, id").unwrap();
    let mut lees = cabinet.find_by_last_name("lee");
    lees.sort_by_key(|r| r.id);
    let rows: Vec<Vec<String>> = project(lees, &projector).collect();
    assert_eq!(rows, vec![vec!["Ann".to_string(), "1".to_string()], vec!["Bob".to_string(), "2".to_string()]]);
    assert_eq!(project(Vec::new(), &projector).count(), 0);
    let everything = Projector::all();
    let full: Vec<Vec<String>> = project(cabinet.get(3), &everything).collect();
    assert_eq!(full[0].len(), everything.headers().len());
    assert_eq!(full[0][0], "3");
}

#[test]
fn revision_advances_on_every_change() {
    let mut cabinet = Cabinet::default();
    assert_eq!(cabinet.revision(), 0);
    cabinet.create(ann(), true).unwrap();
    cabinet.edit(1, &|r: &mut Record| r.points = 1).unwrap();
    cabinet.delete(1).unwrap();
    assert_eq!(cabinet.revision(), 3);
}

#[test]
fn indexes_agree_after_a_mixed_sequence() {
    let mut cabinet = Cabinet::new(CabinetConfig::new(Arc::new(AcceptAll)));
    for i in 0..20 {
        let first = if i % 2 == 0 { "Ann" } else { "Bob" };
        let last = if i % 3 == 0 { "Lee" } else { "Ray" };
        cabinet.create(person(first, last, (1980 + i, 1, 1), i as i16), true).unwrap();
    }
    let odd = parse_where("firstname = 'Bob'").unwrap();
    let rename = parse_set("firstname = 'Cid', lastname = 'Fox'").unwrap();
    assert_eq!(cabinet.update_where(&odd.predicate, &rename), 10);
    let lees = parse_where("lastname = 'Lee'").unwrap();
    let removed = cabinet.delete_where(&lees.predicate);
    assert!(!removed.is_empty());
    cabinet.create(person("Dee", "Lee", (1999, 9, 9), 1), true).unwrap();
    cabinet.verify_indexes().unwrap();
    assert_eq!(cabinet.find_by_first_name("Bob").len(), 0);
    assert_eq!(cabinet.find_by_last_name("Fox").len(), 10);
    assert_eq!(cabinet.find_by_last_name("Lee").len(), 1);
}
