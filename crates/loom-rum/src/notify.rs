// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session reset notifications.
//!
//! Both notifications carry only the relevant session id. Listeners that need
//! more state query the session manager themselves.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

/// Capacity of the broadcast channel used by async subscribers.
pub const BROADCAST_CAPACITY: usize = 64;

/// A session lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotification {
	/// Sent with the outgoing session id before the new session is installed.
	WillReset(String),
	/// Sent with the new session id once it is current.
	DidReset(String),
}

impl SessionNotification {
	pub fn session_id(&self) -> &str {
		match self {
			SessionNotification::WillReset(id) | SessionNotification::DidReset(id) => id,
		}
	}

	pub fn name(&self) -> &'static str {
		match self {
			SessionNotification::WillReset(_) => "session_will_reset",
			SessionNotification::DidReset(_) => "session_did_reset",
		}
	}
}

/// Handle returned by listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&SessionNotification) + Send + Sync>;

/// Fan-out of notifications to registered callbacks and broadcast subscribers.
pub(crate) struct Notifier {
	listeners: RwLock<Vec<(ListenerId, Listener)>>,
	next_id: AtomicU64,
	sender: broadcast::Sender<SessionNotification>,
}

impl Notifier {
	pub(crate) fn new() -> Self {
		let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
		Self {
			listeners: RwLock::new(Vec::new()),
			next_id: AtomicU64::new(1),
			sender,
		}
	}

	pub(crate) fn add_listener<F>(&self, listener: F) -> ListenerId
	where
		F: Fn(&SessionNotification) + Send + Sync + 'static,
	{
		let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
		self.listeners.write().push((id, Arc::new(listener)));
		id
	}

	pub(crate) fn remove_listener(&self, id: ListenerId) -> bool {
		let mut listeners = self.listeners.write();
		let before = listeners.len();
		listeners.retain(|(listener_id, _)| *listener_id != id);
		listeners.len() != before
	}

	pub(crate) fn subscribe(&self) -> broadcast::Receiver<SessionNotification> {
		self.sender.subscribe()
	}

	/// Delivers to callbacks in registration order, then to broadcast subscribers.
	///
	/// The listener list is not locked while callbacks run, so callbacks may
	/// register or remove listeners.
	pub(crate) fn notify(&self, notification: SessionNotification) {
		let listeners: Vec<Listener> = self
			.listeners
			.read()
			.iter()
			.map(|(_, listener)| Arc::clone(listener))
			.collect();

		for listener in listeners {
			listener(&notification);
		}

		// No subscribers is fine.
		let _ = self.sender.send(notification);
	}
}
