//! In-memory storage backend.
//!
//! Holds values in a map guarded by an async mutex. Honors TTLs by
//! recording an expiry instant checked on read. Used by tests and for
//! ephemeral runs where persistence is not required.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct Entry {
	value: Vec<u8>,
	expires_at: Option<Instant>,
}

impl Entry {
	fn expired(&self) -> bool {
		self.expires_at.is_some_and(|at| Instant::now() >= at)
	}
}

#[derive(Default)]
pub struct MemoryStorage {
	entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let mut entries = self.entries.lock().await;
		match entries.get(key) {
			Some(entry) if entry.expired() => {
				entries.remove(key);
				Err(StorageError::NotFound)
			}
			Some(entry) => Ok(entry.value.clone()),
			None => Err(StorageError::NotFound),
		}
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let entry = Entry {
			value,
			expires_at: ttl.map(|ttl| Instant::now() + ttl),
		};
		self.entries.lock().await.insert(key.to_string(), entry);
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		self.entries.lock().await.remove(key);
		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let mut entries = self.entries.lock().await;
		match entries.get(key) {
			Some(entry) if entry.expired() => {
				entries.remove(key);
				Ok(false)
			}
			Some(_) => Ok(true),
			None => Ok(false),
		}
	}
}

/// Creates a memory storage backend. No configuration parameters.
pub fn create_storage(_config: &toml::Value) -> Box<dyn StorageInterface> {
	Box::new(MemoryStorage::new())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn ttl_expires_values() {
		let storage = MemoryStorage::new();
		storage
			.set_bytes("k", b"v".to_vec(), Some(Duration::from_millis(10)))
			.await
			.unwrap();

		assert!(storage.exists("k").await.unwrap());
		tokio::time::sleep(Duration::from_millis(20)).await;
		assert!(!storage.exists("k").await.unwrap());
	}
}
