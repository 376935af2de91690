mod common;

use std::fs;

use arbor::persist::{ClosureRow, PersistenceMode, SqliteStore};
use arbor::schema::{Model, Table};
use arbor::settings::{BrokenLinkPolicy, Settings};
use arbor::telemetry::init_tracing;
use arbor::{ArborError, Resolver};
use common::{fetch, small_tree};
use rusqlite::types::Value;

// Declares a primary key its table does not list.
#[derive(Debug, Clone)]
struct Misdeclared {
    id: i64,
    parent_id: Option<i64>,
}

impl Model for Misdeclared {
    fn table() -> Table {
        Table::new("categories", "uuid", vec!["id", "parent_id"])
    }
    fn hydrate(row: &ClosureRow) -> arbor::Result<Self> {
        Ok(Misdeclared { id: row.get("id")?, parent_id: row.get("parent_id")? })
    }
    fn value(&self, column: &str) -> Option<Value> {
        match column {
            "id" => Some(Value::Integer(self.id)),
            "parent_id" => Some(self.parent_id.map_or(Value::Null, Value::Integer)),
            _ => None,
        }
    }
}

#[test]
fn unknown_parent_column_fails_before_any_query() {
    init_tracing();
    let store = small_tree();
    let resolver = Resolver::new(&store);
    let poetry = fetch(&store, 4);
    let err = resolver.ancestors_of(&poetry, "mother_id").unwrap_err();
    assert!(matches!(err, ArborError::Configuration(ref message) if message.contains("mother_id")));
    let err = resolver.descendants_of(&poetry, "mother_id", None).unwrap_err();
    assert!(matches!(err, ArborError::Configuration(_)));
    assert_eq!(store.round_trips(), 0);
}

#[test]
fn undeclared_primary_key_fails_before_any_query() {
    let store = small_tree();
    let resolver = Resolver::new(&store);
    let node = Misdeclared { id: 4, parent_id: Some(2) };
    let err = resolver.ancestors(&node).unwrap_err();
    assert!(matches!(err, ArborError::Configuration(ref message) if message.contains("uuid")));
    let err = resolver.descendants(&node).unwrap_err();
    assert!(matches!(err, ArborError::Configuration(_)));
    assert_eq!(store.round_trips(), 0);
}

#[test]
fn bad_ordering_fails_before_any_query() {
    let store = small_tree();
    let resolver = Resolver::new(&store);
    let root = fetch(&store, 1);
    for clause in ["weight desc", "position sideways", "position; drop table categories"] {
        let err = resolver.descendants_of(&root, "parent_id", Some(clause)).unwrap_err();
        assert!(matches!(err, ArborError::Configuration(_)), "{clause}: {err}");
    }
    assert_eq!(store.round_trips(), 0);
}

#[test]
fn missing_table_surfaces_as_a_persistence_error() {
    let store = SqliteStore::open(PersistenceMode::InMemory).expect("store");
    let resolver = Resolver::new(&store);
    let orphan = common::Category {
        id: 2,
        parent_id: Some(1),
        name: String::from("orphan"),
        position: 0,
    };
    let err = resolver.ancestors(&orphan).unwrap_err();
    assert!(matches!(err, ArborError::Persistence(_)));
}

#[test]
fn described_table_matches_the_model() {
    let store = small_tree();
    let table = store.describe("categories").expect("describe");
    assert_eq!(table.primary_key(), "id");
    assert!(table.has_column("parent_id"));
    assert!(table.require("position").is_ok());
    assert!(table.require("weight").is_err());
}

#[test]
fn settings_load_from_file() {
    let path = std::env::temp_dir().join("arbor_settings_test.toml");
    fs::write(&path, "broken_links = \"truncate\"\nlog_queries = true\ndatabase = \"arbor_test.db\"\n")
        .expect("write settings");
    let settings = Settings::load(path.to_str().expect("utf-8 path")).expect("settings");
    assert_eq!(settings.broken_links, BrokenLinkPolicy::Truncate);
    assert!(settings.log_queries);
    assert_eq!(settings.persistence_mode(), PersistenceMode::File(String::from("arbor_test.db")));
    let _ = fs::remove_file(&path);
}

#[test]
fn missing_settings_file_means_defaults() {
    let settings = Settings::load("arbor_settings_that_do_not_exist").expect("settings");
    assert_eq!(settings.broken_links, BrokenLinkPolicy::Fail);
    assert_eq!(settings.persistence_mode(), PersistenceMode::InMemory);
    let store = SqliteStore::from_settings(&settings).expect("store");
    assert_eq!(store.round_trips(), 0);
}

#[test]
fn file_mode_store_resolves_like_memory() {
    let path = std::env::temp_dir().join("arbor_file_mode_test.db");
    let _ = fs::remove_file(&path);
    let store = SqliteStore::open(PersistenceMode::File(path.to_string_lossy().into_owned()))
        .expect("store")
        .log_queries(true);
    store
        .connection()
        .execute_batch(
            "create table categories (id integer primary key, parent_id integer, name text, position integer);
             insert into categories values (1, null, 'root', 0), (2, 1, 'books', 0), (3, 2, 'poetry', 0);",
        )
        .expect("seed");
    let resolver = Resolver::new(&store);
    let chain = resolver.ancestors(&fetch(&store, 3)).expect("ancestors");
    assert_eq!(chain.iter().map(|a| a.id).collect::<Vec<_>>(), vec![2, 1]);
    drop(resolver);
    drop(store);
    let _ = fs::remove_file(&path);
}
