use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::ObjectMeta;
use super::tables::*;

impl Database {
    // ========================================================================
    // Object metadata
    // ========================================================================

    /// Record (or overwrite) the metadata for an object key
    pub fn put_object_meta(&self, key: &str, meta: &ObjectMeta) -> Result<(), DatabaseError> {
        debug_assert!(!key.is_empty(), "object key must not be empty");

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(OBJECT_META)?;
            let data = rmp_serde::to_vec_named(meta)?;
            table.insert(key, data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get the metadata for an object key
    pub fn get_object_meta(&self, key: &str) -> Result<Option<ObjectMeta>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(OBJECT_META)?;

        match table.get(key)? {
            Some(data) => {
                let meta: ObjectMeta = rmp_serde::from_slice(data.value())?;
                Ok(Some(meta))
            }
            None => Ok(None),
        }
    }
}
