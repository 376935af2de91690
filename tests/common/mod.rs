#![allow(dead_code)]

use arbor::persist::{ClosureRow, PersistenceMode, SqliteStore};
use arbor::schema::{Model, Table, TreeOptions};
use arbor::{ArborError, Result};
use rusqlite::types::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
    pub position: i64,
}

impl Model for Category {
    fn table() -> Table {
        Table::new("categories", "id", vec!["id", "parent_id", "name", "position"])
    }
    fn tree() -> TreeOptions {
        TreeOptions {
            foreign_key: String::from("parent_id"),
            order: Some(String::from("position")),
        }
    }
    fn hydrate(row: &ClosureRow) -> Result<Self> {
        Ok(Category {
            id: row.get("id")?,
            parent_id: row.get("parent_id")?,
            name: row.get("name")?,
            position: row.get("position")?,
        })
    }
    fn value(&self, column: &str) -> Option<Value> {
        match column {
            "id" => Some(Value::Integer(self.id)),
            "parent_id" => Some(self.parent_id.map_or(Value::Null, Value::Integer)),
            "name" => Some(Value::Text(self.name.clone())),
            "position" => Some(Value::Integer(self.position)),
            _ => None,
        }
    }
    fn supports(&self, capability: &str) -> bool {
        capability == "path_label"
    }
    fn call(&self, capability: &str, args: &[Value]) -> Result<Value> {
        match capability {
            "path_label" => {
                let separator = match args.first() {
                    Some(Value::Text(s)) => s.clone(),
                    _ => String::from("/"),
                };
                Ok(Value::Text(format!("{separator}{}", self.name)))
            }
            _ => Err(ArborError::Unsupported {
                table: Self::table().name().to_string(),
                capability: capability.to_string(),
            }),
        }
    }
}

pub fn open() -> SqliteStore {
    let store = SqliteStore::open(PersistenceMode::InMemory).expect("store");
    store
        .connection()
        .execute_batch(
            "create table categories (
                id integer primary key,
                parent_id integer,
                name text not null,
                position integer not null default 0
            );",
        )
        .unwrap();
    store
}

pub fn insert(store: &SqliteStore, id: i64, parent_id: Option<i64>, name: &str, position: i64) {
    store
        .connection()
        .execute(
            "insert into categories (id, parent_id, name, position) values (?1, ?2, ?3, ?4)",
            rusqlite::params![id, parent_id, name, position],
        )
        .unwrap();
}

/// The tree (1,null),(2,1),(3,1),(4,2). Positions: 4 < 2 < 3.
pub fn small_tree() -> SqliteStore {
    let store = open();
    insert(&store, 1, None, "root", 0);
    insert(&store, 2, Some(1), "books", 1);
    insert(&store, 3, Some(1), "music", 2);
    insert(&store, 4, Some(2), "poetry", 0);
    store
}

/// Loads a record straight from the table, outside the Store contract.
pub fn fetch(store: &SqliteStore, id: i64) -> Category {
    store
        .connection()
        .query_row(
            "select id, parent_id, name, position from categories where id = ?1",
            [id],
            |row| {
                Ok(Category {
                    id: row.get(0)?,
                    parent_id: row.get(1)?,
                    name: row.get(2)?,
                    position: row.get(3)?,
                })
            },
        )
        .unwrap()
}

/// A linear chain 1 <- 2 <- ... <- depth + 1, inserted in one statement.
pub fn chain(store: &SqliteStore, depth: i64) {
    store
        .connection()
        .execute(
            "insert into categories (id, parent_id, name, position)
             with recursive seq(n) as (select 1 union all select n + 1 from seq where n < ?1)
             select n, nullif(n - 1, 0), 'n' || n, 0 from seq",
            [depth + 1],
        )
        .unwrap();
}
