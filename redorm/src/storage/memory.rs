use crate::error::AppError;
use crate::storage::{KvHandle, KvStore};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

type Entries = Arc<Mutex<BTreeMap<String, Vec<u8>>>>;

/// In-process store with the same single-open discipline as a file-backed one.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    name: String,
    entries: Entries,
    open: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        MemoryStore { name: name.into(), ..MemoryStore::default() }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl KvStore for MemoryStore {
    fn open(&self) -> Result<Box<dyn KvHandle>, AppError> {
        if self.open.swap(true, Ordering::SeqCst) {
            return Err(AppError::StoreBusy(format!("{} is already open", self.location())));
        }
        Ok(Box::new(MemoryHandle { entries: Arc::clone(&self.entries), open: Arc::clone(&self.open) }))
    }

    fn location(&self) -> String {
        format!("memory://{}", self.name)
    }

    fn destroy(&self) -> Result<(), AppError> {
        self.entries.lock()?.clear();
        Ok(())
    }
}

struct MemoryHandle {
    entries: Entries,
    open: Arc<AtomicBool>,
}

impl KvHandle for MemoryHandle {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AppError> {
        Ok(self.entries.lock()?.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), AppError> {
        self.entries.lock()?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<bool, AppError> {
        Ok(self.entries.lock()?.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>, AppError> {
        Ok(self.entries.lock()?.keys().cloned().collect())
    }

    fn close(self: Box<Self>) -> Result<(), AppError> {
        Ok(())
    }
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        self.open.store(false, Ordering::SeqCst);
    }
}
