// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persisted history of application lifecycle states.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use loom_rum_core::{AppState, AppStateEvent};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::storage::KeyValueStorage;

/// Storage key of the app state history.
pub const APP_STATE_KEY: &str = "appStateEvents";

/// Maximum number of retained app state events.
pub const MAX_APP_STATE_EVENTS: usize = 100;

/// Maximum age of retained app state events: 30 days.
pub const MAX_APP_STATE_LIFETIME: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Answers which application state was current at a point in time.
pub trait AppStateProvider: Send + Sync {
	fn app_state_for(&self, timestamp: DateTime<Utc>) -> Option<AppState>;
}

/// Records lifecycle transitions and keeps a bounded history of them.
pub struct AppStateModel {
	storage: Arc<dyn KeyValueStorage>,
	clock: Arc<dyn Clock>,
	events: RwLock<Vec<AppStateEvent>>,
	/// Serializes writes so storage always ends with the newest snapshot.
	write: Mutex<()>,
}

impl AppStateModel {
	pub fn new(storage: Arc<dyn KeyValueStorage>, clock: Arc<dyn Clock>) -> Self {
		let mut events = match storage.read::<Vec<AppStateEvent>>(APP_STATE_KEY) {
			Ok(events) => events.unwrap_or_default(),
			Err(e) => {
				warn!(error = %e, "failed to read app state history, starting empty");
				Vec::new()
			}
		};
		events.sort_by_key(|event| event.timestamp);

		Self {
			storage,
			clock,
			events: RwLock::new(events),
			write: Mutex::new(()),
		}
	}

	/// Records a transition at the current time.
	pub fn record(&self, state: AppState) {
		let now = self.clock.now();
		{
			let mut events = self.events.write();
			events.push(AppStateEvent {
				timestamp: now,
				state,
			});
			prune_events(&mut events, now);
		}
		debug!(state = %state, "recorded app state");

		let _write = self.write.lock();
		let snapshot = self.events.read().clone();
		if let Err(e) = self.storage.update(APP_STATE_KEY, &snapshot) {
			warn!(error = %e, "failed to persist app state history");
		}
	}

	/// Retained events, oldest first.
	pub fn events(&self) -> Vec<AppStateEvent> {
		self.events.read().clone()
	}
}

impl AppStateProvider for AppStateModel {
	/// The last state recorded strictly before `timestamp`.
	fn app_state_for(&self, timestamp: DateTime<Utc>) -> Option<AppState> {
		let events = self.events.read();
		let idx = events.partition_point(|event| event.timestamp < timestamp);
		events.get(idx.checked_sub(1)?).map(|event| event.state)
	}
}

impl std::fmt::Debug for AppStateModel {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AppStateModel")
			.field("events", &self.events.read().len())
			.finish_non_exhaustive()
	}
}

fn prune_events(events: &mut Vec<AppStateEvent>, now: DateTime<Utc>) {
	if let Some(cutoff) = chrono::Duration::from_std(MAX_APP_STATE_LIFETIME)
		.ok()
		.and_then(|lifetime| now.checked_sub_signed(lifetime))
	{
		events.retain(|event| event.timestamp > cutoff);
	}
	if events.len() > MAX_APP_STATE_EVENTS {
		let excess = events.len() - MAX_APP_STATE_EVENTS;
		events.drain(..excess);
	}
}
