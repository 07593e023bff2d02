use crate::error::AppError;
use crate::storage::{KvHandle, KvStore};
use redb::{Database, ReadableTable, TableDefinition, TableError};
use std::fs;
use std::path::{Path, PathBuf};

const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("records");

/// One redb file per model table.
#[derive(Debug, Clone)]
pub struct RedbStore {
    path: PathBuf,
}

impl RedbStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        RedbStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KvStore for RedbStore {
    fn open(&self) -> Result<Box<dyn KvHandle>, AppError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let db = Database::create(&self.path)?;
        Ok(Box::new(RedbHandle { db }))
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn destroy(&self) -> Result<(), AppError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

struct RedbHandle {
    db: Database,
}

impl KvHandle for RedbHandle {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AppError> {
        let read_tx = self.db.begin_read()?;
        let table = match read_tx.open_table(RECORDS) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let value = table.get(key)?.map(|guard| guard.value().to_vec());
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), AppError> {
        let write_tx = self.db.begin_write()?;
        {
            let mut table = write_tx.open_table(RECORDS)?;
            table.insert(key, value)?;
        }
        write_tx.commit()?;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<bool, AppError> {
        let write_tx = self.db.begin_write()?;
        let removed = {
            let mut table = write_tx.open_table(RECORDS)?;
            let removed = table.remove(key)?.is_some();
            removed
        };
        write_tx.commit()?;
        Ok(removed)
    }

    fn keys(&self) -> Result<Vec<String>, AppError> {
        let read_tx = self.db.begin_read()?;
        let table = match read_tx.open_table(RECORDS) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut keys = Vec::new();
        for entry in table.iter()? {
            let (key, _) = entry?;
            keys.push(key.value().to_string());
        }
        Ok(keys)
    }

    fn close(self: Box<Self>) -> Result<(), AppError> {
        drop(self.db);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn random_store() -> RedbStore {
        RedbStore::new(env::temp_dir().join("redorm").join("test").join(format!("store_{}.redb", rand::random::<u64>())))
    }

    #[test]
    fn reads_on_fresh_file_see_nothing() {
        let store = random_store();
        let handle = store.open().unwrap();
        assert_eq!(handle.get("missing").unwrap(), None);
        assert!(handle.keys().unwrap().is_empty());
        handle.close().unwrap();
        store.destroy().unwrap();
    }

    #[test]
    fn writes_survive_reopen() {
        let store = random_store();
        let mut handle = store.open().unwrap();
        handle.set("b", b"2").unwrap();
        handle.set("a", b"1").unwrap();
        handle.set("a", b"3").unwrap();
        handle.close().unwrap();

        let mut handle = store.open().unwrap();
        assert_eq!(handle.get("a").unwrap().as_deref(), Some(&b"3"[..]));
        assert_eq!(handle.keys().unwrap(), vec!["a".to_string(), "b".to_string()]);
        assert!(handle.delete("a").unwrap());
        assert!(!handle.delete("a").unwrap());
        assert!(!handle.contains("a").unwrap());
        handle.close().unwrap();

        store.destroy().unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn concurrent_open_is_rejected() {
        let store = random_store();
        let handle = store.open().unwrap();
        let err = store.open().err().unwrap();
        assert!(matches!(err, AppError::Database(redb::DatabaseError::DatabaseAlreadyOpen)), "{err}");
        drop(handle);
        assert!(store.open().is_ok());
        store.destroy().unwrap();
    }
}
