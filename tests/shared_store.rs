use std::sync::{Arc, RwLock};
use std::thread;

use filecabinet::construct::{Cabinet, CabinetConfig, RecordStore};
use filecabinet::engine::Engine;
use filecabinet::instrument::{LoggingStore, TimingStore};
use filecabinet::server::{execute_shared, SharedStore};
use filecabinet::CabinetError;

fn insert(n: usize) -> String {
    format!(
        "insert (firstname, lastname, dateofbirth, identificationnumber, points, letter) values ('Worker{n}', 'Lee', '1980-01-01', '{}', '{n}', 'W')",
        n + 1
    )
}

fn shared() -> SharedStore {
    let store: Box<dyn RecordStore + Send + Sync> =
        Box::new(TimingStore::new(LoggingStore::new(Cabinet::new(CabinetConfig::default()))));
    Arc::new(RwLock::new(store))
}

#[test]
fn decorated_store_behaves_like_the_cabinet() {
    let mut store = TimingStore::new(LoggingStore::new(Cabinet::default()));
    let engine = Engine::new();
    engine.execute(&mut store, &insert(1)).unwrap();
    assert_eq!(store.count(), 1);
    assert_eq!(store.find_by_last_name("lee").len(), 1);
    assert!(matches!(store.delete(9), Err(CabinetError::NotFound { id: 9 })));
    let cabinet = store.into_inner().into_inner();
    cabinet.verify_indexes().unwrap();
}

#[test]
fn concurrent_statements_are_serialized() {
    let store = shared();
    let engine = Arc::new(Engine::new());
    let handles: Vec<_> = (0..8)
        .map(|n| {
            let store = Arc::clone(&store);
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                execute_shared(&store, &engine, &insert(n)).expect("insert");
                execute_shared(&store, &engine, "select id where lastname = 'Lee'").expect("select");
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    let result = execute_shared(&store, &engine, "select id").unwrap();
    assert_eq!(result.rows.len(), 8);
    let guard = store.read().unwrap();
    guard.verify_indexes().unwrap();
}

#[test]
fn errors_pass_through_the_lock() {
    let store = shared();
    let engine = Engine::new();
    assert!(matches!(
        execute_shared(&store, &engine, "select shoesize"),
        Err(CabinetError::UnknownField(_))
    ));
    assert!(matches!(
        execute_shared(&store, &engine, "delete where id = 1"),
        Ok(ref result) if result.affected == 0
    ));
}
