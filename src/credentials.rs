use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;

/// Round-robin pool of YouTube Data API keys.
///
/// An empty pool is valid and means no credentials are available.
#[derive(Debug, Default)]
pub struct CredentialPool {
    keys: Vec<String>,
    cursor: AtomicUsize,
}

impl CredentialPool {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The key at the cursor, or `None` for an empty pool.
    pub fn current(&self) -> Option<String> {
        if self.keys.is_empty() {
            return None;
        }
        let idx = self.cursor.load(Ordering::Acquire) % self.keys.len();
        self.keys.get(idx).cloned()
    }

    /// Advance the cursor and return the new current key.
    ///
    /// Pools with one key (or none) are left untouched, so callers compare the
    /// returned key with the one they used to detect that nothing changed.
    pub fn rotate(&self) -> Option<String> {
        let size = self.keys.len();
        if size <= 1 {
            return self.current();
        }
        let prev = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| Some((i + 1) % size))
            .unwrap_or_else(|i| i);
        let next = (prev + 1) % size;
        debug!("Rotated API key to index {next} of {size}");
        self.keys.get(next).cloned()
    }
}

/// Short form of a key that is safe to write to logs.
pub fn mask(key: &str) -> String {
    let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    format!("...{tail}")
}
