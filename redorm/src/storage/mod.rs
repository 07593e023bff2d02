pub mod memory;
pub mod redb_store;

use crate::error::AppError;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

/// An open key-value handle. Every `set`/`delete` is durable once it returns.
pub trait KvHandle {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AppError>;
    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), AppError>;
    /// Returns whether the key was present.
    fn delete(&mut self, key: &str) -> Result<bool, AppError>;
    fn contains(&self, key: &str) -> Result<bool, AppError> {
        Ok(self.get(key)?.is_some())
    }
    fn keys(&self) -> Result<Vec<String>, AppError>;
    fn close(self: Box<Self>) -> Result<(), AppError>;
}

/// Location of one table's persistent store; handles are opened per operation.
pub trait KvStore: Send + Sync {
    fn open(&self) -> Result<Box<dyn KvHandle>, AppError>;
    fn location(&self) -> String;
    /// Removes the persisted data entirely.
    fn destroy(&self) -> Result<(), AppError>;
}

/// Opens a handle for the duration of `f`; it is released on success and failure alike.
pub fn with_handle<S, T, F>(store: &S, f: F) -> Result<T, AppError>
where
    S: KvStore + ?Sized,
    F: FnOnce(&mut dyn KvHandle) -> Result<T, AppError>,
{
    let mut handle = store.open()?;
    match f(handle.as_mut()) {
        Ok(value) => {
            handle.close()?;
            Ok(value)
        }
        Err(err) => {
            drop(handle);
            Err(err)
        }
    }
}
