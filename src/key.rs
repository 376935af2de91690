// used for persistence
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};

// used to print out readable forms of a key
use std::fmt;

// used for the call-scoped indexes
use core::hash::BuildHasherDefault;
use seahash::SeaHasher;

use crate::error::{ArborError, Result};

pub type KeyHasher = BuildHasherDefault<SeaHasher>;

// ------------- Key -------------
// The value of a primary key or a self-referential foreign key. An absent
// (NULL) foreign key is modelled as Option<Key>::None, never as a Key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Integer(i64),
    Text(String),
    Blob(Vec<u8>),
}

impl Key {
    /// Reads a key out of a raw column value. NULL yields `None`.
    pub fn from_value(column: &str, value: &Value) -> Result<Option<Key>> {
        match value {
            Value::Null => Ok(None),
            Value::Integer(i) => Ok(Some(Key::Integer(*i))),
            Value::Text(s) => Ok(Some(Key::Text(s.clone()))),
            Value::Blob(b) => Ok(Some(Key::Blob(b.clone()))),
            Value::Real(r) => Err(ArborError::InvalidKey {
                column: column.to_string(),
                message: format!("real value {r} cannot identify a row"),
            }),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Integer(i) => write!(f, "{i}"),
            Key::Text(s) => write!(f, "'{s}'"),
            Key::Blob(b) => {
                write!(f, "x'")?;
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                write!(f, "'")
            }
        }
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Integer(i)
    }
}
impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Text(s.to_string())
    }
}
impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Text(s)
    }
}

impl ToSql for Key {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Key::Integer(i) => ToSqlOutput::from(*i),
            Key::Text(s) => ToSqlOutput::from(s.as_str()),
            Key::Blob(b) => ToSqlOutput::from(b.as_slice()),
        })
    }
}
impl FromSql for Key {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(i) => Ok(Key::Integer(i)),
            ValueRef::Text(t) => String::from_utf8(t.to_vec())
                .map(Key::Text)
                .map_err(|e| FromSqlError::Other(Box::new(e))),
            ValueRef::Blob(b) => Ok(Key::Blob(b.to_vec())),
            ValueRef::Null | ValueRef::Real(_) => Err(FromSqlError::InvalidType),
        }
    }
}
