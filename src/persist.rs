//! Synchronous key-value persistence.
//!
//! The browser origin of this layer means the whole interface is three
//! operations on string keys and string values. SQLite carries the same
//! contract here: one `Storage` table, read and written synchronously,
//! shared by every session opened against the same [`Persistor`].

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Result;

/// Key used by the startup availability probe, never left behind.
const PROBE_KEY: &str = "routeflow.test";

// ------------- PersistenceMode -------------
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum PersistenceMode {
    /// Shared storage for the lifetime of the process only.
    InMemory,
    /// Durable storage at the given path.
    File(String),
    /// Storage cannot be used at all; every read is empty and every write
    /// is a no-op. This is the private-browsing / quota-exhausted case.
    Disabled,
}

// ------------- Persistor -------------
pub struct Persistor {
    db: Option<Connection>,
}

impl Persistor {
    pub fn new(mode: PersistenceMode) -> Result<Self> {
        let db = match mode {
            PersistenceMode::InMemory => Some(Connection::open_in_memory()?),
            PersistenceMode::File(path) => Some(Connection::open(path)?),
            PersistenceMode::Disabled => None,
        };
        if let Some(connection) = &db {
            connection.execute_batch(
                "
                create table if not exists Storage (
                    Key text not null,
                    Value text not null,
                    constraint unique_and_referenceable_Key primary key (
                        Key
                    )
                );
                ",
            )?;
        }
        Ok(Self { db })
    }

    /// Trial write-then-delete, mirroring how the site decides at startup
    /// whether storage can be used for admin data at all.
    pub fn probe(&mut self) -> bool {
        if self.db.is_none() {
            return false;
        }
        self.set_item(PROBE_KEY, "1").is_ok() && self.remove_item(PROBE_KEY).is_ok()
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        let Some(db) = &self.db else {
            return Ok(None);
        };
        let value = db
            .query_row(
                "select Value from Storage where Key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        let Some(db) = &self.db else {
            return Ok(());
        };
        db.execute(
            "
            insert into Storage (Key, Value) values (?, ?)
                on conflict (Key) do update set Value = excluded.Value
            ",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn remove_item(&mut self, key: &str) -> Result<()> {
        let Some(db) = &self.db else {
            return Ok(());
        };
        db.execute("delete from Storage where Key = ?", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_values_by_key() {
        let mut persistor = Persistor::new(PersistenceMode::InMemory).unwrap();
        assert!(persistor.probe());
        assert_eq!(persistor.get_item("routeflow.blogPosts").unwrap(), None);
        persistor.set_item("routeflow.blogPosts", "[]").unwrap();
        persistor.set_item("routeflow.blogPosts", "[1]").unwrap();
        assert_eq!(
            persistor.get_item("routeflow.blogPosts").unwrap().as_deref(),
            Some("[1]")
        );
        persistor.remove_item("routeflow.blogPosts").unwrap();
        assert_eq!(persistor.get_item("routeflow.blogPosts").unwrap(), None);
    }

    #[test]
    fn disabled_mode_reads_nothing_and_swallows_writes() {
        let mut persistor = Persistor::new(PersistenceMode::Disabled).unwrap();
        assert!(!persistor.probe());
        persistor.set_item("k", "v").unwrap();
        assert_eq!(persistor.get_item("k").unwrap(), None);
    }
}
