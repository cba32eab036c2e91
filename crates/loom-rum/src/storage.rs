// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Namespaced key-value persistence.
//!
//! Values are stored as JSON documents. [`FileStorage`] keeps one file per key
//! and replaces it atomically; [`MemoryStorage`] is a shared in-process map.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::StorageError;

/// Raw byte-level key-value store.
///
/// Implementations must make `write_raw` atomic: a concurrent `read_raw`
/// observes either the previous value or the new one in full.
pub trait KeyValueStorage: Send + Sync {
	/// Returns the stored bytes, or `None` when the key has no value.
	fn read_raw(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

	/// Stores `value` under `key`, replacing any previous value.
	fn write_raw(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

	/// Removes the value for `key`. Fails with [`StorageError::NoValueForKey`] if absent.
	fn delete(&self, key: &str) -> Result<(), StorageError>;

	fn contains(&self, key: &str) -> Result<bool, StorageError> {
		Ok(self.read_raw(key)?.is_some())
	}
}

impl dyn KeyValueStorage {
	/// Reads and decodes a typed value.
	pub fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
		match self.read_raw(key)? {
			Some(bytes) => serde_json::from_slice(&bytes)
				.map(Some)
				.map_err(|source| StorageError::TypeMismatch {
					key: key.to_string(),
					source,
				}),
			None => Ok(None),
		}
	}

	/// Stores a value under a key that must not already hold one.
	pub fn insert<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
		if self.contains(key)? {
			return Err(StorageError::InsertIntoExistingKey(key.to_string()));
		}
		self.update(key, value)
	}

	/// Stores a value, replacing any previous one.
	pub fn update<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
		let bytes = serde_json::to_vec(value)?;
		self.write_raw(key, &bytes)
	}
}

fn validate_key(key: &str) -> Result<(), StorageError> {
	if key.is_empty()
		|| !key
			.bytes()
			.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
	{
		return Err(StorageError::InvalidKey(key.to_string()));
	}
	Ok(())
}

/// File-backed storage: `<dir>/<namespace>.<key>.json`.
#[derive(Debug)]
pub struct FileStorage {
	dir: PathBuf,
	namespace: String,
	tmp_counter: AtomicU64,
}

impl FileStorage {
	pub fn new(dir: impl Into<PathBuf>, namespace: impl Into<String>) -> Result<Self, StorageError> {
		let namespace = namespace.into();
		validate_key(&namespace)?;
		Ok(Self {
			dir: dir.into(),
			namespace,
			tmp_counter: AtomicU64::new(0),
		})
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	pub fn namespace(&self) -> &str {
		&self.namespace
	}

	fn key_path(&self, key: &str) -> Result<PathBuf, StorageError> {
		validate_key(key)?;
		Ok(self.dir.join(format!("{}.{key}.json", self.namespace)))
	}
}

impl KeyValueStorage for FileStorage {
	fn read_raw(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
		let path = self.key_path(key)?;
		match std::fs::read(&path) {
			Ok(bytes) => Ok(Some(bytes)),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(e.into()),
		}
	}

	fn write_raw(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
		let path = self.key_path(key)?;
		std::fs::create_dir_all(&self.dir)?;

		let seq = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
		let tmp_path = self.dir.join(format!(
			"{}.{key}.json.{}.{seq}.tmp",
			self.namespace,
			std::process::id()
		));

		if let Err(e) = std::fs::write(&tmp_path, value) {
			let _ = std::fs::remove_file(&tmp_path);
			return Err(e.into());
		}
		if let Err(e) = std::fs::rename(&tmp_path, &path) {
			let _ = std::fs::remove_file(&tmp_path);
			return Err(e.into());
		}

		debug!(key, path = %path.display(), bytes = value.len(), "wrote storage key");
		Ok(())
	}

	fn delete(&self, key: &str) -> Result<(), StorageError> {
		let path = self.key_path(key)?;
		match std::fs::remove_file(&path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				Err(StorageError::NoValueForKey(key.to_string()))
			}
			Err(e) => Err(e.into()),
		}
	}
}

/// In-memory storage. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
	values: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of stored keys.
	pub fn len(&self) -> usize {
		self.values.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.read().is_empty()
	}
}

impl KeyValueStorage for MemoryStorage {
	fn read_raw(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
		validate_key(key)?;
		Ok(self.values.read().get(key).cloned())
	}

	fn write_raw(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
		validate_key(key)?;
		self.values.write().insert(key.to_string(), value.to_vec());
		Ok(())
	}

	fn delete(&self, key: &str) -> Result<(), StorageError> {
		validate_key(key)?;
		match self.values.write().remove(key) {
			Some(_) => Ok(()),
			None => Err(StorageError::NoValueForKey(key.to_string())),
		}
	}
}
