// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The RUM agent: wires storage, sessions, user and app state together.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use loom_rum_core::{AppState, RandomNumberProvider, SystemRandomNumberProvider};
use parking_lot::RwLock;
use tracing::info;

use crate::app_state::{AppStateModel, AppStateProvider};
use crate::clock::{Clock, SystemClock};
use crate::config::{RumConfig, SessionConfig};
use crate::error::{Result, RumError};
use crate::manager::SessionManager;
use crate::session_store::SessionStore;
use crate::shared_state::SharedState;
use crate::storage::{FileStorage, KeyValueStorage};
use crate::user::UserModel;

/// Builder for constructing a [`RumAgent`].
pub struct RumAgentBuilder {
	config: RumConfig,
	storage: Option<Arc<dyn KeyValueStorage>>,
	clock: Option<Arc<dyn Clock>>,
	random: Option<Arc<dyn RandomNumberProvider>>,
	app_state_provider: Option<Arc<dyn AppStateProvider>>,
}

impl RumAgentBuilder {
	pub fn new() -> Self {
		Self {
			config: RumConfig::default(),
			storage: None,
			clock: None,
			random: None,
			app_state_provider: None,
		}
	}

	/// Replaces the whole configuration.
	pub fn config(mut self, config: RumConfig) -> Self {
		self.config = config;
		self
	}

	/// Sets the session sample rate (0.0-1.0). Validated by [`build`](Self::build).
	pub fn session_sample_rate(mut self, rate: f64) -> Self {
		self.config.session.sample_rate = rate;
		self
	}

	pub fn session_timeout(mut self, timeout: Duration) -> Self {
		self.config.session.timeout = timeout;
		self
	}

	pub fn max_session_length(mut self, max_length: Duration) -> Self {
		self.config.session.max_length = max_length;
		self
	}

	/// Stores state as files in `dir` instead of the default data directory.
	pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.config.storage.dir = Some(dir.into());
		self
	}

	/// Uses a custom storage backend. Overrides the storage directory.
	pub fn storage(mut self, storage: Arc<dyn KeyValueStorage>) -> Self {
		self.storage = Some(storage);
		self
	}

	pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = Some(clock);
		self
	}

	pub fn random(mut self, random: Arc<dyn RandomNumberProvider>) -> Self {
		self.random = Some(random);
		self
	}

	/// Answers app state queries from `provider` instead of the recorded history.
	pub fn app_state_provider(mut self, provider: Arc<dyn AppStateProvider>) -> Self {
		self.app_state_provider = Some(provider);
		self
	}

	pub fn build(self) -> Result<RumAgent> {
		self.config.validate()?;

		let storage: Arc<dyn KeyValueStorage> = match self.storage {
			Some(storage) => storage,
			None => {
				let dir = self.config.storage.resolve_dir()?;
				Arc::new(FileStorage::new(dir, self.config.storage.namespace.clone())?)
			}
		};
		let clock: Arc<dyn Clock> = match self.clock {
			Some(clock) => clock,
			None => Arc::new(SystemClock),
		};
		let random: Arc<dyn RandomNumberProvider> = match self.random {
			Some(random) => random,
			None => Arc::new(SystemRandomNumberProvider),
		};

		let store = SessionStore::new(storage.clone(), clock.clone());
		let session = Arc::new(SessionManager::new(
			store,
			&self.config,
			clock.clone(),
			random,
		)?);

		let app_state = Arc::new(AppStateModel::new(storage.clone(), clock));
		let provider: Arc<dyn AppStateProvider> = match self.app_state_provider {
			Some(provider) => provider,
			None => app_state.clone(),
		};
		let shared_state = SharedState::new(session.clone(), provider);

		info!(
			sample_rate = self.config.session.sample_rate,
			namespace = %self.config.storage.namespace,
			"RUM agent initialized"
		);

		Ok(RumAgent {
			inner: Arc::new(RumAgentInner {
				config: RwLock::new(self.config),
				session,
				user: UserModel::new(storage),
				app_state,
				shared_state,
				closed: AtomicBool::new(false),
			}),
		})
	}
}

impl Default for RumAgentBuilder {
	fn default() -> Self {
		Self::new()
	}
}

struct RumAgentInner {
	config: RwLock<RumConfig>,
	session: Arc<SessionManager>,
	user: UserModel,
	app_state: Arc<AppStateModel>,
	shared_state: SharedState,
	closed: AtomicBool,
}

/// Handle to a running agent. Cheap to clone.
#[derive(Clone)]
pub struct RumAgent {
	inner: Arc<RumAgentInner>,
}

impl RumAgent {
	pub fn builder() -> RumAgentBuilder {
		RumAgentBuilder::new()
	}

	/// The session manager.
	pub fn session(&self) -> &Arc<SessionManager> {
		&self.inner.session
	}

	/// The read-only facade handed to event producers.
	pub fn shared_state(&self) -> SharedState {
		self.inner.shared_state.clone()
	}

	/// Recorded app state history.
	pub fn app_state(&self) -> &AppStateModel {
		&self.inner.app_state
	}

	pub fn config(&self) -> RumConfig {
		self.inner.config.read().clone()
	}

	/// The installation's user identifier, created on first use.
	pub fn user_identifier(&self) -> Result<String> {
		self.check_closed()?;
		Ok(self.inner.user.prepare_identifier())
	}

	pub fn current_session_id(&self) -> Result<String> {
		self.check_closed()?;
		Ok(self.inner.session.current_session_id())
	}

	/// Applies session settings received at runtime, such as from remote configuration.
	pub fn apply_session_config(&self, config: SessionConfig) -> Result<()> {
		self.check_closed()?;
		self.inner.session.apply_config(&config)?;
		self.inner.config.write().session = config;
		Ok(())
	}

	pub fn did_become_active(&self) -> Result<()> {
		self.check_closed()?;
		self.inner.app_state.record(AppState::Active);
		Ok(())
	}

	pub fn will_resign_active(&self) -> Result<()> {
		self.check_closed()?;
		self.inner.app_state.record(AppState::Inactive);
		Ok(())
	}

	pub fn did_enter_background(&self) -> Result<()> {
		self.check_closed()?;
		self.inner.app_state.record(AppState::Background);
		self.inner.session.did_enter_background();
		Ok(())
	}

	pub fn will_enter_foreground(&self) -> Result<()> {
		self.check_closed()?;
		self.inner.app_state.record(AppState::Foreground);
		self.inner.session.will_enter_foreground();
		Ok(())
	}

	pub fn will_terminate(&self) -> Result<()> {
		self.check_closed()?;
		self.inner.app_state.record(AppState::Terminate);
		self.inner.session.will_terminate();
		Ok(())
	}

	/// Ends the current session and flushes pending writes. Safe to call more than once.
	pub fn shutdown(&self) -> Result<()> {
		if self.inner.closed.swap(true, Ordering::SeqCst) {
			return Ok(());
		}

		self.inner.session.shutdown();
		info!("RUM agent shutdown");
		Ok(())
	}

	pub fn is_closed(&self) -> bool {
		self.inner.closed.load(Ordering::SeqCst)
	}

	fn check_closed(&self) -> Result<()> {
		if self.inner.closed.load(Ordering::SeqCst) {
			return Err(RumError::AgentShutdown);
		}
		Ok(())
	}
}

impl std::fmt::Debug for RumAgent {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RumAgent")
			.field("session", &self.inner.session)
			.field("closed", &self.is_closed())
			.finish_non_exhaustive()
	}
}
