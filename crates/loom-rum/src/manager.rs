// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The session state machine.
//!
//! Sessions rotate lazily: every access to the current session checks the
//! rotation triggers and rotates on the spot if one fired. There is no timer.
//!
//! # Concurrency
//!
//! Session state sits behind a read-write lock; the common path takes only the
//! read lock and performs no I/O. Rotation is claimed under a mutex that
//! re-checks the trigger, so concurrent callers that observe the same expired
//! session produce exactly one new session.
//!
//! Listeners run with no lock held. While a rotation is underway, readers get
//! the outgoing session until the new one is installed, on any thread and
//! without blocking. Rotation or end requests made during that window are
//! deferred and replayed once the rotation finishes, provided the session they
//! targeted is still current.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use loom_rum_core::{
	RandomNumberProvider, SamplingDecision, SessionId, SessionItem, SessionSampler,
};
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::{RumConfig, SessionConfig};
use crate::error::Result;
use crate::notify::{ListenerId, Notifier, SessionNotification};
use crate::session_store::{prune_items, SessionStore};
use crate::writer::HistoryWriter;

/// Why a session was replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationReason {
	/// No session existed yet.
	ColdStart,
	/// The inactivity timeout elapsed.
	Inactivity,
	/// The session reached its maximum length.
	MaxLength,
	/// The session was ended explicitly.
	Ended,
	/// The app returned from a background stay longer than the timeout.
	Background,
	/// Rotation was requested explicitly.
	Forced,
}

impl RotationReason {
	pub fn as_str(&self) -> &'static str {
		match self {
			RotationReason::ColdStart => "cold_start",
			RotationReason::Inactivity => "inactivity",
			RotationReason::MaxLength => "max_length",
			RotationReason::Ended => "ended",
			RotationReason::Background => "background",
			RotationReason::Forced => "forced",
		}
	}
}

impl std::fmt::Display for RotationReason {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone)]
struct CurrentSession {
	item: SessionItem,
	decision: SamplingDecision,
}

#[derive(Debug, Clone, Copy)]
struct SessionPolicy {
	timeout: Duration,
	max_length: Duration,
}

#[derive(Debug, Clone, Copy)]
struct Retention {
	capacity: usize,
	lifetime: Duration,
}

struct SessionState {
	current: Option<CurrentSession>,
	/// Ascending by start; includes the current session.
	history: Vec<SessionItem>,
	sampler: SessionSampler,
	policy: SessionPolicy,
}

/// A request that arrived while a rotation was underway, with the session it
/// targeted.
#[derive(Debug, Clone)]
enum Deferred {
	Rotate(SessionId, RotationReason),
	End(SessionId),
}

#[derive(Debug, Default)]
struct RotationState {
	in_progress: bool,
	deferred: Vec<Deferred>,
}

/// Releases a claimed rotation if a listener panics before it finishes.
struct ReleaseOnPanic<'a>(&'a Mutex<RotationState>);

impl Drop for ReleaseOnPanic<'_> {
	fn drop(&mut self) {
		if std::thread::panicking() {
			let mut rotation = self.0.lock();
			rotation.in_progress = false;
			rotation.deferred.clear();
		}
	}
}

impl SessionState {
	fn close_in_history(&mut self, id: &SessionId) {
		if let Some(item) = self.history.iter_mut().rev().find(|item| item.id() == id) {
			item.close();
		}
	}
}

/// Owns the current session and the in-memory mirror of session history.
pub struct SessionManager {
	state: RwLock<SessionState>,
	/// Held briefly to claim, install and finish a rotation; never across listeners.
	rotation: Mutex<RotationState>,
	/// Last activity on the current session, in Unix milliseconds.
	last_activity_ms: AtomicI64,
	background_since: Mutex<Option<DateTime<Utc>>>,
	retention: Retention,
	clock: Arc<dyn Clock>,
	random: Arc<dyn RandomNumberProvider>,
	writer: HistoryWriter,
	notifier: Notifier,
}

impl SessionManager {
	/// Creates a manager over `store`, loading and pruning persisted history.
	///
	/// A session left open by a previous run is marked closed. No session is
	/// created until the first access.
	pub fn new(
		store: SessionStore,
		config: &RumConfig,
		clock: Arc<dyn Clock>,
		random: Arc<dyn RandomNumberProvider>,
	) -> Result<Self> {
		config.validate()?;
		let sampler = SessionSampler::with_probability(config.session.sample_rate)?;
		let retention = Retention {
			capacity: config.storage.history_capacity,
			lifetime: config.storage.history_lifetime,
		};

		let loaded = store.read_or_empty();
		let mut history = prune_items(
			loaded.clone(),
			clock.now(),
			Some(retention.capacity),
			Some(retention.lifetime),
		);
		if let Some(last) = history.last_mut() {
			if last.close() {
				info!(session_id = %last.id(), "closed session left open by previous run");
			}
		}

		let writer = HistoryWriter::spawn(store);
		if history != loaded {
			writer.persist(history.clone());
		}

		debug!(
			sessions = history.len(),
			sample_rate = config.session.sample_rate,
			timeout_secs = config.session.timeout.as_secs(),
			max_length_secs = config.session.max_length.as_secs(),
			"session manager initialized"
		);

		Ok(Self {
			state: RwLock::new(SessionState {
				current: None,
				history,
				sampler,
				policy: SessionPolicy {
					timeout: config.session.timeout,
					max_length: config.session.max_length,
				},
			}),
			rotation: Mutex::new(RotationState::default()),
			last_activity_ms: AtomicI64::new(0),
			background_since: Mutex::new(None),
			retention,
			clock,
			random,
			writer,
			notifier: Notifier::new(),
		})
	}

	/// Id of the current session, rotating first if needed.
	pub fn current_session_id(&self) -> String {
		self.current().item.id().to_string()
	}

	/// Record of the current session, rotating first if needed.
	pub fn current_session_item(&self) -> SessionItem {
		self.current().item
	}

	/// Sampling decision of the current session, rotating first if needed.
	///
	/// Decided once when the session starts.
	pub fn current_sampling_decision(&self) -> SamplingDecision {
		self.current().decision
	}

	pub fn is_sampled(&self) -> bool {
		self.current_sampling_decision().is_sampled()
	}

	/// Id of the session that was active at `timestamp`.
	///
	/// A session covers `[start, start + max_length]`, cut short by the start
	/// of the next session. The start is inclusive, so a timestamp equal to a
	/// session's start belongs to that session rather than its predecessor.
	/// `max_length` is the currently configured value; changing it through
	/// [`apply_config`](Self::apply_config) also changes lookups of past
	/// sessions, since history records only start times.
	///
	/// Returns `None` for timestamps before the oldest retained session or past
	/// the end of the covering session. Lookups do not count as activity and
	/// never rotate.
	pub fn session_id_for(&self, timestamp: DateTime<Utc>) -> Option<String> {
		let state = self.state.read();
		let history = &state.history;

		let idx = history.partition_point(|item| item.start() <= timestamp);
		let item = history.get(idx.checked_sub(1)?)?;

		let elapsed = timestamp - item.start();
		if exceeds(elapsed, state.policy.max_length) {
			return None;
		}
		Some(item.id().to_string())
	}

	/// Snapshot of the retained session history, oldest first.
	pub fn history(&self) -> Vec<SessionItem> {
		self.state.read().history.clone()
	}

	/// Replaces the current session unconditionally.
	///
	/// During another rotation, for example from a session listener, the
	/// request is deferred until that rotation finishes and dropped if the
	/// session it targeted has been replaced by then.
	pub fn rotate_session(&self) {
		self.rotate_now(RotationReason::Forced, None);
	}

	/// Closes the current session and waits for it to be persisted.
	///
	/// The next access starts a new session. During another rotation the request
	/// is deferred like [`rotate_session`](Self::rotate_session) and does not wait.
	pub fn end_session(&self) {
		self.end_now(None);
	}

	/// Records that the app moved to the background.
	pub fn did_enter_background(&self) {
		let now = self.clock.now();
		*self.background_since.lock() = Some(now);
		debug!(at = %now, "app entered background");
	}

	/// Records that the app is returning to the foreground, rotating if the
	/// background stay outlasted the session timeout.
	pub fn will_enter_foreground(&self) {
		let Some(since) = self.background_since.lock().take() else {
			return;
		};

		let now = self.clock.now();
		let timeout = self.state.read().policy.timeout;
		if exceeds(now - since, timeout) {
			debug!(
				background_secs = (now - since).num_seconds(),
				"background stay exceeded session timeout"
			);
			self.rotate_now(RotationReason::Background, None);
		}
	}

	/// Ends the session because the app is terminating.
	pub fn will_terminate(&self) {
		self.end_session();
	}

	/// Applies new session settings.
	///
	/// The sample rate affects the next session only; the current session
	/// keeps its decision. Timeout and max length apply immediately.
	pub fn apply_config(&self, config: &SessionConfig) -> Result<()> {
		config.validate()?;
		let mut state = self.state.write();
		state.sampler.configure(config.sample_rate)?;
		state.policy = SessionPolicy {
			timeout: config.timeout,
			max_length: config.max_length,
		};
		info!(
			sample_rate = config.sample_rate,
			timeout_secs = config.timeout.as_secs(),
			max_length_secs = config.max_length.as_secs(),
			"session configuration updated"
		);
		Ok(())
	}

	/// Registers a callback for session notifications.
	pub fn add_listener<F>(&self, listener: F) -> ListenerId
	where
		F: Fn(&SessionNotification) + Send + Sync + 'static,
	{
		self.notifier.add_listener(listener)
	}

	pub fn remove_listener(&self, id: ListenerId) -> bool {
		self.notifier.remove_listener(id)
	}

	/// Subscribes to session notifications over a broadcast channel.
	pub fn subscribe(&self) -> broadcast::Receiver<SessionNotification> {
		self.notifier.subscribe()
	}

	/// Blocks until queued history snapshots are persisted.
	pub fn flush(&self) {
		self.writer.flush();
	}

	/// Ends the session and stops the background writer.
	pub(crate) fn shutdown(&self) {
		self.end_session();
		self.writer.shutdown();
	}

	fn current(&self) -> CurrentSession {
		let now = self.clock.now();
		{
			let state = self.state.read();
			if let Some(current) = state.current.as_ref() {
				if self.rotation_trigger(current, &state.policy, now).is_none() {
					self.touch(now);
					return current.clone();
				}
			}
		}
		self.rotate_if_needed()
	}

	fn rotate_if_needed(&self) -> CurrentSession {
		let mut rotation = self.rotation.lock();
		let now = self.clock.now();

		let outgoing = {
			let state = self.state.read();
			match state.current.as_ref() {
				Some(current) if rotation.in_progress => return current.clone(),
				Some(current) => match self.rotation_trigger(current, &state.policy, now) {
					Some(reason) => Some((current.item.id().clone(), reason)),
					None => {
						self.touch(now);
						return current.clone();
					}
				},
				None => None,
			}
		};

		let Some((previous, reason)) = outgoing else {
			return self.install(now, RotationReason::ColdStart, None);
		};
		rotation.in_progress = true;
		drop(rotation);

		let current = self.replace(previous, now, reason);
		self.finish_rotation();
		current
	}

	/// Rotates unless a rotation is underway, in which case the request is
	/// deferred until it finishes. With `target`, only rotates while that
	/// session is still current.
	fn rotate_now(&self, reason: RotationReason, target: Option<&SessionId>) {
		let mut rotation = self.rotation.lock();
		let now = self.clock.now();

		let previous = self
			.state
			.read()
			.current
			.as_ref()
			.map(|current| current.item.id().clone());
		if target.is_some() && target != previous.as_ref() {
			return;
		}

		let Some(previous) = previous else {
			self.install(now, reason, None);
			return;
		};
		if rotation.in_progress {
			debug!(
				session_id = %previous,
				reason = %reason,
				"deferring rotation until the running rotation finishes"
			);
			rotation.deferred.push(Deferred::Rotate(previous, reason));
			return;
		}
		rotation.in_progress = true;
		drop(rotation);

		self.replace(previous, now, reason);
		self.finish_rotation();
	}

	fn end_now(&self, target: Option<&SessionId>) {
		{
			let mut rotation = self.rotation.lock();
			let snapshot = {
				let mut state = self.state.write();
				let Some(current) = state.current.as_mut() else {
					return;
				};
				if target.is_some_and(|target| target != current.item.id()) {
					return;
				}
				if rotation.in_progress {
					debug!(
						session_id = %current.item.id(),
						"deferring end of session until the running rotation finishes"
					);
					rotation.deferred.push(Deferred::End(current.item.id().clone()));
					return;
				}
				if !current.item.close() {
					return;
				}
				let id = current.item.id().clone();
				state.close_in_history(&id);
				info!(session_id = %id, "session ended");
				state.history.clone()
			};
			self.writer.persist(snapshot);
		}
		self.writer.flush();
	}

	/// Replaces `previous` with a new session. Runs with `in_progress` set and
	/// the rotation mutex released, so listeners may call back freely.
	fn replace(
		&self,
		previous: SessionId,
		now: DateTime<Utc>,
		reason: RotationReason,
	) -> CurrentSession {
		let _release = ReleaseOnPanic(&self.rotation);
		self.notifier
			.notify(SessionNotification::WillReset(previous.to_string()));

		let current = {
			let _rotation = self.rotation.lock();
			self.install(now, reason, Some(&previous))
		};

		self.notifier
			.notify(SessionNotification::DidReset(current.item.id().to_string()));
		current
	}

	/// Clears `in_progress` and replays requests deferred while listeners ran.
	fn finish_rotation(&self) {
		let deferred = {
			let mut rotation = self.rotation.lock();
			rotation.in_progress = false;
			std::mem::take(&mut rotation.deferred)
		};
		for request in deferred {
			match request {
				Deferred::Rotate(id, reason) => self.rotate_now(reason, Some(&id)),
				Deferred::End(id) => self.end_now(Some(&id)),
			}
		}
	}

	/// Creates a session, closes the outgoing one in history, and queues the
	/// snapshot. Callers hold the rotation mutex.
	fn install(
		&self,
		now: DateTime<Utc>,
		reason: RotationReason,
		previous: Option<&SessionId>,
	) -> CurrentSession {
		let item = SessionItem::new(SessionId::generate(), now);
		let sampler = self.state.read().sampler.clone();
		let decision = sampler.decide(self.random.as_ref());
		let current = CurrentSession {
			item: item.clone(),
			decision,
		};

		let snapshot = {
			let mut state = self.state.write();
			if let Some(previous) = state.current.take() {
				state.close_in_history(previous.item.id());
			}
			state.history.push(item.clone());
			let history = std::mem::take(&mut state.history);
			state.history = prune_items(
				history,
				now,
				Some(self.retention.capacity),
				Some(self.retention.lifetime),
			);
			state.current = Some(current.clone());
			self.last_activity_ms
				.store(now.timestamp_millis(), Ordering::SeqCst);
			state.history.clone()
		};

		self.writer.persist(snapshot);

		info!(
			session_id = %item.id(),
			previous_session_id = previous.map(|id| id.as_str()),
			reason = %reason,
			decision = %decision,
			"session started"
		);
		current
	}

	fn rotation_trigger(
		&self,
		current: &CurrentSession,
		policy: &SessionPolicy,
		now: DateTime<Utc>,
	) -> Option<RotationReason> {
		if current.item.is_closed() {
			return Some(RotationReason::Ended);
		}

		let last_activity = DateTime::<Utc>::from_timestamp_millis(
			self.last_activity_ms.load(Ordering::SeqCst),
		)
		.unwrap_or_else(|| current.item.start());
		if exceeds(now - last_activity, policy.timeout) {
			return Some(RotationReason::Inactivity);
		}

		if exceeds(now - current.item.start(), policy.max_length) {
			return Some(RotationReason::MaxLength);
		}

		None
	}

	fn touch(&self, now: DateTime<Utc>) {
		self.last_activity_ms
			.fetch_max(now.timestamp_millis(), Ordering::SeqCst);
	}
}

impl std::fmt::Debug for SessionManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.state.read();
		f.debug_struct("SessionManager")
			.field(
				"current_session_id",
				&state.current.as_ref().map(|c| c.item.id().to_string()),
			)
			.field("history_len", &state.history.len())
			.finish_non_exhaustive()
	}
}

/// True when `elapsed` is strictly longer than `limit`. Negative spans never exceed.
fn exceeds(elapsed: chrono::Duration, limit: Duration) -> bool {
	elapsed.to_std().is_ok_and(|elapsed| elapsed > limit)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::clock::ManualClock;
	use crate::storage::MemoryStorage;
	use chrono::TimeZone;
	use loom_rum_core::ScriptedRandomNumberProvider;

	struct Fixture {
		manager: Arc<SessionManager>,
		clock: Arc<ManualClock>,
		random: Arc<ScriptedRandomNumberProvider>,
		storage: MemoryStorage,
	}

	fn t0() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
	}

	fn fixture_with(config: RumConfig, storage: MemoryStorage) -> Fixture {
		let clock = Arc::new(ManualClock::new(t0()));
		let random = Arc::new(ScriptedRandomNumberProvider::default());
		let store = SessionStore::new(Arc::new(storage.clone()), clock.clone());
		let manager = SessionManager::new(store, &config, clock.clone(), random.clone()).unwrap();
		Fixture {
			manager: Arc::new(manager),
			clock,
			random,
			storage,
		}
	}

	fn fixture() -> Fixture {
		fixture_with(RumConfig::default(), MemoryStorage::new())
	}

	fn secs(n: i64) -> chrono::Duration {
		chrono::Duration::seconds(n)
	}

	#[test]
	fn test_cold_start_creates_session() {
		let f = fixture();
		assert!(f.manager.history().is_empty());

		let id = f.manager.current_session_id();
		let item = f.manager.current_session_item();
		assert_eq!(item.id().as_str(), id);
		assert_eq!(item.start(), t0());
		assert!(!item.is_closed());
		assert_eq!(f.manager.history(), vec![item]);
	}

	#[test]
	fn test_stable_within_window() {
		let f = fixture();
		let id = f.manager.current_session_id();
		for _ in 0..10 {
			f.clock.advance(secs(60));
			assert_eq!(f.manager.current_session_id(), id);
		}
	}

	#[test]
	fn test_activity_extends_timeout() {
		let f = fixture();
		let id = f.manager.current_session_id();

		f.clock.advance(secs(800));
		assert_eq!(f.manager.current_session_id(), id);
		f.clock.advance(secs(800));
		assert_eq!(f.manager.current_session_id(), id);
	}

	#[test]
	fn test_timeout_boundary_is_exclusive() {
		let f = fixture();
		let id = f.manager.current_session_id();

		f.clock.advance(secs(900));
		assert_eq!(f.manager.current_session_id(), id);

		f.clock.advance(secs(901));
		assert_ne!(f.manager.current_session_id(), id);
	}

	#[test]
	fn test_rotation_closes_previous_in_history() {
		let f = fixture();
		let first = f.manager.current_session_id();
		f.clock.advance(secs(1000));
		let second = f.manager.current_session_id();

		let history = f.manager.history();
		assert_eq!(history.len(), 2);
		assert_eq!(history[0].id().as_str(), first);
		assert!(history[0].is_closed());
		assert_eq!(history[1].id().as_str(), second);
		assert!(!history[1].is_closed());
	}

	#[test]
	fn test_sampling_decided_once_per_session() {
		let mut config = RumConfig::default();
		config.session.sample_rate = 0.5;
		let f = fixture_with(config, MemoryStorage::new());

		f.random.push([0.9]);
		assert!(!f.manager.is_sampled());
		assert!(!f.manager.is_sampled());
		assert_eq!(f.random.requested_ranges().len(), 1);

		f.manager
			.apply_config(&SessionConfig {
				sample_rate: 1.0,
				..Default::default()
			})
			.unwrap();
		assert!(!f.manager.is_sampled());

		f.manager.rotate_session();
		assert!(f.manager.is_sampled());
		assert_eq!(f.random.requested_ranges().len(), 1);
	}

	#[test]
	fn test_end_session_starts_new_on_next_access() {
		let f = fixture();
		let first = f.manager.current_session_id();

		f.manager.end_session();
		let stored: Vec<SessionItem> = SessionStore::new(Arc::new(f.storage.clone()), f.clock.clone())
			.read()
			.unwrap();
		assert!(stored[0].is_closed());

		let second = f.manager.current_session_id();
		assert_ne!(first, second);
	}

	#[test]
	fn test_end_session_without_session_is_noop() {
		let f = fixture();
		f.manager.end_session();
		assert!(f.manager.history().is_empty());
	}

	#[test]
	fn test_background_longer_than_timeout_rotates() {
		let f = fixture();
		let id = f.manager.current_session_id();

		f.manager.did_enter_background();
		f.clock.advance(secs(300));
		f.manager.will_enter_foreground();
		assert_eq!(f.manager.current_session_id(), id);

		f.manager.did_enter_background();
		f.clock.advance(secs(100));
		let _ = f.manager.current_session_id();
		f.clock.advance(secs(850));
		f.manager.will_enter_foreground();
		assert_ne!(f.manager.current_session_id(), id);
	}

	#[test]
	fn test_foreground_without_background_is_noop() {
		let f = fixture();
		let id = f.manager.current_session_id();
		f.manager.will_enter_foreground();
		assert_eq!(f.manager.current_session_id(), id);
	}

	#[test]
	fn test_will_terminate_closes_session() {
		let f = fixture();
		f.manager.current_session_id();
		f.manager.will_terminate();
		assert!(f.manager.history()[0].is_closed());
	}

	#[test]
	fn test_restart_closes_dangling_session() {
		let storage = MemoryStorage::new();
		let first = fixture_with(RumConfig::default(), storage.clone());
		let id = first.manager.current_session_id();
		first.manager.flush();

		let second = fixture_with(RumConfig::default(), storage);
		let history = second.manager.history();
		assert_eq!(history.len(), 1);
		assert_eq!(history[0].id().as_str(), id);
		assert!(history[0].is_closed());
		assert_ne!(second.manager.current_session_id(), id);
	}

	#[test]
	fn test_history_capacity_applies_on_rotation() {
		let mut config = RumConfig::default();
		config.storage.history_capacity = 3;
		let f = fixture_with(config, MemoryStorage::new());

		for _ in 0..5 {
			f.manager.rotate_session();
		}
		assert_eq!(f.manager.history().len(), 3);
	}

	#[test]
	fn test_apply_config_rejects_invalid() {
		let f = fixture();
		let result = f.manager.apply_config(&SessionConfig {
			sample_rate: 2.0,
			..Default::default()
		});
		assert!(result.is_err());
	}

	#[test]
	fn test_apply_config_changes_timeout() {
		let f = fixture();
		let id = f.manager.current_session_id();
		f.manager
			.apply_config(&SessionConfig {
				timeout: Duration::from_secs(60),
				..Default::default()
			})
			.unwrap();

		f.clock.advance(secs(61));
		assert_ne!(f.manager.current_session_id(), id);
	}

	#[test]
	fn test_session_id_for_ignores_future_of_last_session() {
		let f = fixture();
		let id = f.manager.current_session_id();

		assert_eq!(f.manager.session_id_for(t0() - secs(1)), None);
		assert_eq!(f.manager.session_id_for(t0()), Some(id.clone()));
		assert_eq!(f.manager.session_id_for(t0() + secs(3600)), Some(id));
		assert_eq!(f.manager.session_id_for(t0() + secs(4 * 3600 + 1)), None);
	}

	#[test]
	fn test_listener_reading_current_session_does_not_deadlock() {
		let f = fixture();
		let first = f.manager.current_session_id();

		let seen = Arc::new(Mutex::new(Vec::new()));
		let manager = Arc::downgrade(&f.manager);
		let sink = seen.clone();
		f.manager.add_listener(move |n| {
			if let Some(manager) = manager.upgrade() {
				sink.lock().push((n.clone(), manager.current_session_id()));
				if let SessionNotification::WillReset(_) = n {
					manager.rotate_session();
				}
			}
		});

		f.manager.rotate_session();
		let second = f.manager.current_session_id();

		let seen = seen.lock();
		assert_eq!(seen.len(), 2);
		assert_eq!(seen[0], (SessionNotification::WillReset(first.clone()), first));
		assert_eq!(seen[1], (SessionNotification::DidReset(second.clone()), second));
		assert_eq!(f.manager.history().len(), 2);
	}

	#[test]
	fn test_listener_waiting_on_another_thread_does_not_deadlock() {
		let f = fixture();
		let first = f.manager.current_session_id();

		let handed_off = Arc::new(Mutex::new(Vec::new()));
		let manager = Arc::downgrade(&f.manager);
		let sink = handed_off.clone();
		f.manager.add_listener(move |n| {
			let Some(manager) = manager.upgrade() else {
				return;
			};
			if let SessionNotification::WillReset(_) = n {
				let id = std::thread::spawn(move || manager.current_session_id())
					.join()
					.unwrap();
				sink.lock().push(id);
			}
		});

		f.clock.advance(secs(901));
		let (tx, rx) = std::sync::mpsc::channel();
		let rotating = f.manager.clone();
		std::thread::spawn(move || {
			let _ = tx.send(rotating.current_session_id());
		});

		let second = rx
			.recv_timeout(Duration::from_secs(5))
			.expect("rotation should not block on the listener");
		assert_ne!(second, first);
		assert_eq!(*handed_off.lock(), vec![first]);
		assert_eq!(f.manager.history().len(), 2);
	}

	#[test]
	fn test_end_session_from_listener_is_deferred() {
		let f = fixture();
		let first = f.manager.current_session_id();

		let ended = Arc::new(std::sync::atomic::AtomicBool::new(false));
		let manager = Arc::downgrade(&f.manager);
		let once = ended.clone();
		f.manager.add_listener(move |n| {
			if let (SessionNotification::DidReset(_), Some(manager)) = (n, manager.upgrade()) {
				if !once.swap(true, Ordering::SeqCst) {
					manager.end_session();
				}
			}
		});

		f.manager.rotate_session();
		let history = f.manager.history();
		assert_eq!(history.len(), 2);
		assert_eq!(history[0].id().as_str(), first);
		assert!(history.iter().all(|item| item.is_closed()));

		f.manager.flush();
		let stored = SessionStore::new(Arc::new(f.storage.clone()), f.clock.clone())
			.read()
			.unwrap();
		assert!(stored.iter().all(|item| item.is_closed()));

		let third = f.manager.current_session_id();
		assert_ne!(third, first);
		assert_ne!(third, history[1].id().as_str());
		assert_eq!(f.manager.history().len(), 3);
	}

	#[test]
	fn test_session_id_for_uses_current_max_length() {
		let f = fixture();
		let id = f.manager.current_session_id();
		assert_eq!(f.manager.session_id_for(t0() + secs(3600)), Some(id));

		f.manager
			.apply_config(&SessionConfig {
				max_length: Duration::from_secs(1800),
				..Default::default()
			})
			.unwrap();
		assert_eq!(f.manager.session_id_for(t0() + secs(3600)), None);
	}

	#[test]
	fn test_cold_start_sends_no_notifications() {
		let f = fixture();
		let count = Arc::new(Mutex::new(0));
		let sink = count.clone();
		f.manager.add_listener(move |_| *sink.lock() += 1);

		f.manager.current_session_id();
		assert_eq!(*count.lock(), 0);

		f.manager.rotate_session();
		assert_eq!(*count.lock(), 2);
	}

	#[test]
	fn test_exceeds_is_strict() {
		assert!(!exceeds(secs(10), Duration::from_secs(10)));
		assert!(exceeds(secs(11), Duration::from_secs(10)));
		assert!(!exceeds(secs(-5), Duration::from_secs(0)));
	}
}
