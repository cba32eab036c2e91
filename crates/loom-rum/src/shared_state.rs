// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Read-only view of agent state for event producers.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::app_state::AppStateProvider;
use crate::manager::SessionManager;

/// State that event producers attach to every event they build.
pub trait AgentSharedState: Send + Sync {
	/// Id of the current session. May rotate the session.
	fn session_id(&self) -> String;

	/// Application state at `timestamp`, if known.
	fn application_state(&self, timestamp: DateTime<Utc>) -> Option<String>;
}

/// Delegates to the session manager and the app state provider without caching.
#[derive(Clone)]
pub struct SharedState {
	session: Arc<SessionManager>,
	app_state: Arc<dyn AppStateProvider>,
}

impl SharedState {
	pub fn new(session: Arc<SessionManager>, app_state: Arc<dyn AppStateProvider>) -> Self {
		Self { session, app_state }
	}
}

impl AgentSharedState for SharedState {
	fn session_id(&self) -> String {
		self.session.current_session_id()
	}

	fn application_state(&self, timestamp: DateTime<Utc>) -> Option<String> {
		self.app_state
			.app_state_for(timestamp)
			.map(|state| state.to_string())
	}
}

impl std::fmt::Debug for SharedState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SharedState")
			.field("session", &self.session)
			.finish_non_exhaustive()
	}
}
