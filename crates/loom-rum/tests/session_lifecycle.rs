// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashSet;
use std::sync::{Arc, Barrier};

use chrono::{DateTime, TimeZone, Utc};
use loom_rum::{
	AgentSharedState, FileStorage, KeyValueStorage, ManualClock, MemoryStorage, RumAgent, RumError,
	SamplingDecision, ScriptedRandomNumberProvider, SessionConfig, SessionItem,
	SessionNotification, SessionStore, StorageError,
};
use loom_rum_core::identifier;
use parking_lot::Mutex;
use tempfile::TempDir;

fn t0() -> DateTime<Utc> {
	Utc.with_ymd_and_hms(2025, 4, 14, 8, 30, 0).unwrap()
}

fn secs(n: i64) -> chrono::Duration {
	chrono::Duration::seconds(n)
}

struct Harness {
	agent: RumAgent,
	clock: Arc<ManualClock>,
	random: Arc<ScriptedRandomNumberProvider>,
	storage: MemoryStorage,
}

fn harness(sample_rate: f64) -> Harness {
	harness_on(MemoryStorage::new(), sample_rate)
}

fn harness_on(storage: MemoryStorage, sample_rate: f64) -> Harness {
	let clock = Arc::new(ManualClock::new(t0()));
	let random = Arc::new(ScriptedRandomNumberProvider::default());
	let agent = RumAgent::builder()
		.session_sample_rate(sample_rate)
		.storage(Arc::new(storage.clone()))
		.clock(clock.clone())
		.random(random.clone())
		.build()
		.unwrap();
	Harness {
		agent,
		clock,
		random,
		storage,
	}
}

#[test]
fn test_sampling_decision_is_cached_for_the_session() {
	let h = harness(0.5);
	h.random.push([0.3, 0.9]);
	let session = h.agent.session();

	assert_eq!(session.current_sampling_decision(), SamplingDecision::Sampled);
	for _ in 0..5 {
		h.clock.advance(secs(30));
		assert!(session.is_sampled());
	}
	assert_eq!(h.random.requested_ranges(), vec![0.0..=1.0]);

	h.agent
		.apply_session_config(SessionConfig {
			sample_rate: 0.1,
			..Default::default()
		})
		.unwrap();
	assert!(session.is_sampled());

	session.rotate_session();
	assert_eq!(session.current_sampling_decision(), SamplingDecision::NotSampled);
	assert_eq!(h.random.remaining(), 0);
}

#[test]
fn test_boundary_sample_rates_never_draw() {
	let never = harness(0.0);
	let always = harness(1.0);

	for _ in 0..20 {
		never.agent.session().rotate_session();
		always.agent.session().rotate_session();
		assert!(!never.agent.session().is_sampled());
		assert!(always.agent.session().is_sampled());
	}
	assert!(never.random.requested_ranges().is_empty());
	assert!(always.random.requested_ranges().is_empty());
}

#[test]
fn test_concurrent_readers_see_one_session() {
	let h = harness(1.0);
	let threads = 16;
	let barrier = Arc::new(Barrier::new(threads));

	let handles: Vec<_> = (0..threads)
		.map(|_| {
			let session = h.agent.session().clone();
			let barrier = barrier.clone();
			std::thread::spawn(move || {
				barrier.wait();
				(0..100)
					.map(|_| session.current_session_id())
					.collect::<Vec<_>>()
			})
		})
		.collect();

	let ids: HashSet<String> = handles
		.into_iter()
		.flat_map(|handle| handle.join().unwrap())
		.collect();
	assert_eq!(ids.len(), 1);
	assert_eq!(h.agent.session().history().len(), 1);
}

#[test]
fn test_concurrent_expiry_rotates_once() {
	let h = harness(1.0);
	let first = h.agent.session().current_session_id();
	h.clock.advance(secs(901));

	let threads = 16;
	let barrier = Arc::new(Barrier::new(threads));
	let handles: Vec<_> = (0..threads)
		.map(|_| {
			let session = h.agent.session().clone();
			let barrier = barrier.clone();
			std::thread::spawn(move || {
				barrier.wait();
				session.current_session_id()
			})
		})
		.collect();

	let ids: HashSet<String> = handles
		.into_iter()
		.map(|handle| handle.join().unwrap())
		.collect();
	let fresh: Vec<&String> = ids.iter().filter(|id| **id != first).collect();
	assert_eq!(fresh.len(), 1);
	assert_eq!(h.agent.session().history().len(), 2);
	assert_eq!(&h.agent.session().current_session_id(), fresh[0]);
}

#[test]
fn test_inactivity_timeout_rotates() {
	let idle = harness(1.0);
	let first = idle.agent.session().current_session_id();
	idle.clock.advance(secs(901));
	assert_ne!(idle.agent.session().current_session_id(), first);

	let active = harness(1.0);
	let first = active.agent.session().current_session_id();
	active.clock.advance(secs(100));
	assert_eq!(active.agent.session().current_session_id(), first);
}

#[test]
fn test_max_length_rotates_despite_activity() {
	let h = harness(1.0);
	let session = h.agent.session();
	let first = session.current_session_id();

	for _ in 0..240 {
		h.clock.advance(secs(60));
		assert_eq!(session.current_session_id(), first);
	}

	h.clock.advance(secs(60));
	let second = session.current_session_id();
	assert_ne!(second, first);
	assert_eq!(session.current_session_item().start(), t0() + secs(241 * 60));
}

#[test]
fn test_session_ids_use_identifier_alphabet() {
	let h = harness(1.0);
	let alphabet: HashSet<u8> = identifier::ALPHABET.iter().copied().collect();

	let mut ids = HashSet::new();
	for _ in 0..200 {
		h.agent.session().rotate_session();
		let id = h.agent.session().current_session_id();
		assert_eq!(id.len(), identifier::DEFAULT_LENGTH);
		assert!(id.bytes().all(|b| alphabet.contains(&b)));
		assert!(ids.insert(id));
	}
}

#[test]
fn test_history_round_trips_across_restart() {
	let tmp = TempDir::new().unwrap();
	let clock = Arc::new(ManualClock::new(t0()));

	let mut closed = SessionItem::new("firstSession_1".parse().unwrap(), t0() - secs(7200));
	closed.close();
	let open = SessionItem::new("second-Session-2".parse().unwrap(), t0() - secs(60));
	let items = vec![closed, open];

	{
		let storage = FileStorage::new(tmp.path(), "loom.rum").unwrap();
		SessionStore::new(Arc::new(storage), clock.clone())
			.write(&items)
			.unwrap();
	}

	let storage = FileStorage::new(tmp.path(), "loom.rum").unwrap();
	let read = SessionStore::new(Arc::new(storage), clock).read().unwrap();
	assert_eq!(read, items);
}

#[test]
fn test_rotation_persists_closed_flags() {
	let h = harness(1.0);
	let session = h.agent.session();

	let first = session.current_session_id();
	h.clock.advance(secs(901));
	let second = session.current_session_id();
	h.clock.advance(secs(60));
	session.rotate_session();
	let third = session.current_session_id();
	session.flush();

	let stored = SessionStore::new(Arc::new(h.storage.clone()), h.clock.clone())
		.read()
		.unwrap();
	let ids: Vec<&str> = stored.iter().map(|item| item.id().as_str()).collect();
	assert_eq!(ids, vec![first.as_str(), second.as_str(), third.as_str()]);
	assert!(stored[0].is_closed());
	assert!(stored[1].is_closed());
	assert!(!stored[2].is_closed());
}

#[test]
fn test_restart_closes_previous_session_and_starts_fresh() {
	let tmp = TempDir::new().unwrap();
	let clock = Arc::new(ManualClock::new(t0()));

	let first = RumAgent::builder()
		.storage_dir(tmp.path())
		.clock(clock.clone())
		.build()
		.unwrap();
	let first_id = first.current_session_id().unwrap();
	first.session().flush();
	drop(first);

	clock.advance(secs(30));
	let second = RumAgent::builder()
		.storage_dir(tmp.path())
		.clock(clock.clone())
		.build()
		.unwrap();

	let history = second.session().history();
	assert_eq!(history.len(), 1);
	assert_eq!(history[0].id().as_str(), first_id);
	assert!(history[0].is_closed());

	let second_id = second.current_session_id().unwrap();
	assert_ne!(second_id, first_id);
	second.shutdown().unwrap();
}

#[test]
fn test_historical_lookup() {
	let storage = MemoryStorage::new();
	let h = harness_on(storage.clone(), 1.0);
	let session = h.agent.session();

	let a = session.current_session_id();
	h.clock.advance(secs(3600));
	session.rotate_session();
	let b = session.current_session_id();
	h.clock.advance(secs(3600));
	session.rotate_session();
	let c = session.current_session_id();
	h.agent.shutdown().unwrap();

	let restarted = harness_on(storage, 1.0);
	let lookup = |ts| restarted.agent.session().session_id_for(ts);

	assert_eq!(lookup(t0() - secs(1)), None);
	assert_eq!(lookup(t0()), Some(a.clone()));
	assert_eq!(lookup(t0() + secs(1800)), Some(a));
	assert_eq!(lookup(t0() + secs(3600)), Some(b.clone()));
	assert_eq!(lookup(t0() + secs(5400)), Some(b));
	assert_eq!(lookup(t0() + secs(7300)), Some(c));
}

#[test]
fn test_user_identifier_is_shared_across_agents() {
	let storage = MemoryStorage::new();
	assert!(!storage.contains("userIdentifier").unwrap());

	let first = harness_on(storage.clone(), 1.0);
	let id = first.agent.user_identifier().unwrap();
	assert_eq!(id.len(), 32);
	assert!(storage.contains("userIdentifier").unwrap());

	let second = harness_on(storage.clone(), 1.0);
	assert_eq!(second.agent.user_identifier().unwrap(), id);
	assert_eq!(first.agent.user_identifier().unwrap(), id);
}

#[test]
fn test_notification_ordering() {
	let h = harness(1.0);
	let session = h.agent.session().clone();
	let old = session.current_session_id();

	let observed = Arc::new(Mutex::new(Vec::new()));
	let sink = observed.clone();
	let reader = Arc::downgrade(&session);
	session.add_listener(move |notification| {
		let current = reader.upgrade().map(|s| s.current_session_id());
		sink.lock().push((notification.clone(), current));
	});

	h.clock.advance(secs(901));
	let new = session.current_session_id();
	assert_ne!(new, old);

	let observed = observed.lock();
	assert_eq!(
		*observed,
		vec![
			(SessionNotification::WillReset(old.clone()), Some(old)),
			(SessionNotification::DidReset(new.clone()), Some(new)),
		]
	);
}

#[tokio::test]
async fn test_notifications_reach_broadcast_subscribers() {
	let h = harness(1.0);
	let mut rx = h.agent.session().subscribe();

	let old = h.agent.session().current_session_id();
	h.agent.session().rotate_session();
	let new = h.agent.session().current_session_id();

	assert_eq!(rx.recv().await.unwrap(), SessionNotification::WillReset(old));
	assert_eq!(rx.recv().await.unwrap(), SessionNotification::DidReset(new));
}

struct BrokenStorage;

impl KeyValueStorage for BrokenStorage {
	fn read_raw(&self, _key: &str) -> Result<Option<Vec<u8>>, StorageError> {
		Err(StorageError::Io(std::io::Error::new(
			std::io::ErrorKind::PermissionDenied,
			"storage unavailable",
		)))
	}

	fn write_raw(&self, _key: &str, _value: &[u8]) -> Result<(), StorageError> {
		Err(StorageError::Io(std::io::Error::new(
			std::io::ErrorKind::PermissionDenied,
			"storage unavailable",
		)))
	}

	fn delete(&self, key: &str) -> Result<(), StorageError> {
		Err(StorageError::NoValueForKey(key.to_string()))
	}
}

#[test]
fn test_sessions_work_without_persistence() {
	let clock = Arc::new(ManualClock::new(t0()));
	let agent = RumAgent::builder()
		.storage(Arc::new(BrokenStorage))
		.clock(clock.clone())
		.build()
		.unwrap();

	let first = agent.current_session_id().unwrap();
	clock.advance(secs(901));
	let second = agent.current_session_id().unwrap();
	assert_ne!(first, second);
	assert_eq!(agent.session().history().len(), 2);

	let user = agent.user_identifier().unwrap();
	assert_eq!(agent.user_identifier().unwrap(), user);

	agent.did_enter_background().unwrap();
	agent.shutdown().unwrap();
}

#[test]
fn test_calls_after_shutdown_fail() {
	let h = harness(1.0);
	h.agent.current_session_id().unwrap();
	h.agent.shutdown().unwrap();
	assert!(matches!(
		h.agent.user_identifier(),
		Err(RumError::AgentShutdown)
	));
	assert!(!h.storage.is_empty());
}

#[test]
fn test_background_longer_than_timeout_starts_new_session() {
	let h = harness(1.0);
	let first = h.agent.current_session_id().unwrap();

	h.agent.did_enter_background().unwrap();
	h.clock.advance(secs(1000));
	h.agent.will_enter_foreground().unwrap();

	let second = h.agent.current_session_id().unwrap();
	assert_ne!(first, second);
	assert_eq!(h.agent.shared_state().session_id(), second);
}
