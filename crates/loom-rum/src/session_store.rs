// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Durable session history.
//!
//! History is kept in ascending `start` order (oldest first) with unique ids.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use loom_rum_core::SessionItem;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::StorageError;
use crate::storage::KeyValueStorage;

/// Storage key of the session history.
pub const SESSIONS_KEY: &str = "sessions";

/// Reads, writes and prunes the persisted session history.
#[derive(Clone)]
pub struct SessionStore {
	storage: Arc<dyn KeyValueStorage>,
	clock: Arc<dyn Clock>,
}

impl SessionStore {
	pub fn new(storage: Arc<dyn KeyValueStorage>, clock: Arc<dyn Clock>) -> Self {
		Self { storage, clock }
	}

	/// Reads the persisted history. Missing history is an empty list.
	pub fn read(&self) -> Result<Vec<SessionItem>, StorageError> {
		let items: Option<Vec<SessionItem>> = self.storage.read(SESSIONS_KEY)?;
		Ok(normalize(items.unwrap_or_default()))
	}

	/// Reads the persisted history, treating unreadable data as empty.
	pub fn read_or_empty(&self) -> Vec<SessionItem> {
		match self.read() {
			Ok(items) => items,
			Err(e) => {
				warn!(error = %e, "failed to read session history, starting empty");
				Vec::new()
			}
		}
	}

	/// Replaces the persisted history.
	pub fn write(&self, items: &[SessionItem]) -> Result<(), StorageError> {
		self.storage.update(SESSIONS_KEY, &items)?;
		debug!(count = items.len(), "persisted session history");
		Ok(())
	}

	/// Applies the retention bounds to the persisted history and writes it back.
	///
	/// Returns the retained items.
	pub fn prune(
		&self,
		max_capacity: Option<usize>,
		max_lifetime: Option<Duration>,
	) -> Result<Vec<SessionItem>, StorageError> {
		let items = self.read()?;
		let before = items.len();
		let retained = prune_items(items, self.clock.now(), max_capacity, max_lifetime);

		if retained.len() != before {
			debug!(
				removed = before - retained.len(),
				retained = retained.len(),
				"pruned session history"
			);
			self.write(&retained)?;
		}
		Ok(retained)
	}
}

impl std::fmt::Debug for SessionStore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SessionStore").finish_non_exhaustive()
	}
}

/// Orders items by ascending start and drops duplicate ids, keeping the later entry.
pub fn normalize(items: Vec<SessionItem>) -> Vec<SessionItem> {
	let mut seen = HashSet::new();
	let mut unique: Vec<SessionItem> = items
		.into_iter()
		.rev()
		.filter(|item| seen.insert(item.id().clone()))
		.collect();
	unique.reverse();
	unique.sort_by_key(|item| item.start());
	unique
}

/// Removes items at or past `max_lifetime`, then the oldest items beyond `max_capacity`.
///
/// `items` must be in ascending start order.
pub fn prune_items(
	mut items: Vec<SessionItem>,
	now: DateTime<Utc>,
	max_capacity: Option<usize>,
	max_lifetime: Option<Duration>,
) -> Vec<SessionItem> {
	if let Some(lifetime) = max_lifetime {
		if let Some(cutoff) = chrono::Duration::from_std(lifetime)
			.ok()
			.and_then(|lifetime| now.checked_sub_signed(lifetime))
		{
			items.retain(|item| item.start() > cutoff);
		}
	}

	if let Some(capacity) = max_capacity {
		if items.len() > capacity {
			let excess = items.len() - capacity;
			items.drain(..excess);
		}
	}

	items
}
