// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background persistence of session history snapshots.
//!
//! Rotation hands a full history snapshot to a dedicated writer thread and
//! returns immediately. Snapshots queued back to back are coalesced so only the
//! newest one reaches storage.

use std::sync::mpsc;
use std::thread::JoinHandle;

use loom_rum_core::SessionItem;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::session_store::SessionStore;

/// Command sent to the writer thread.
#[derive(Debug)]
pub enum WriterCommand {
	/// Persist a full history snapshot.
	Persist(Vec<SessionItem>),
	/// Acknowledge once every earlier command has been handled.
	Flush(mpsc::Sender<()>),
	/// Drain and stop.
	Shutdown,
}

/// Handle to the history writer thread.
pub struct HistoryWriter {
	store: SessionStore,
	tx: Mutex<Option<mpsc::Sender<WriterCommand>>>,
	handle: Mutex<Option<JoinHandle<()>>>,
}

impl HistoryWriter {
	/// Starts the writer thread. If the thread cannot be spawned, snapshots are
	/// written inline by the caller instead.
	pub fn spawn(store: SessionStore) -> Self {
		let (tx, rx) = mpsc::channel();
		let worker_store = store.clone();

		let spawned = std::thread::Builder::new()
			.name("loom-rum-writer".to_string())
			.spawn(move || run(worker_store, rx));

		match spawned {
			Ok(handle) => Self {
				store,
				tx: Mutex::new(Some(tx)),
				handle: Mutex::new(Some(handle)),
			},
			Err(e) => {
				warn!(error = %e, "failed to spawn session writer thread, writing inline");
				Self::inline(store)
			}
		}
	}

	/// A writer that persists on the calling thread.
	pub fn inline(store: SessionStore) -> Self {
		Self {
			store,
			tx: Mutex::new(None),
			handle: Mutex::new(None),
		}
	}

	/// Queues a snapshot for persistence without waiting for it.
	pub fn persist(&self, items: Vec<SessionItem>) {
		let items = {
			let tx = self.tx.lock();
			match tx.as_ref() {
				Some(tx) => match tx.send(WriterCommand::Persist(items)) {
					Ok(()) => return,
					Err(mpsc::SendError(cmd)) => match cmd {
						WriterCommand::Persist(items) => items,
						_ => return,
					},
				},
				None => items,
			}
		};
		write_snapshot(&self.store, &items);
	}

	/// Blocks until every queued snapshot has been written.
	pub fn flush(&self) {
		let (ack_tx, ack_rx) = mpsc::channel();
		{
			let tx = self.tx.lock();
			let Some(tx) = tx.as_ref() else {
				return;
			};
			if tx.send(WriterCommand::Flush(ack_tx)).is_err() {
				warn!("session writer thread is gone, nothing to flush");
				return;
			}
		}
		if ack_rx.recv().is_err() {
			warn!("session writer thread stopped before acknowledging flush");
		}
	}

	/// Drains the queue and stops the writer thread. Later snapshots are written inline.
	pub fn shutdown(&self) {
		if let Some(tx) = self.tx.lock().take() {
			let _ = tx.send(WriterCommand::Shutdown);
		}
		if let Some(handle) = self.handle.lock().take() {
			if handle.join().is_err() {
				error!("session writer thread panicked");
			}
		}
	}

	pub fn is_running(&self) -> bool {
		self.tx.lock().is_some()
	}
}

impl Drop for HistoryWriter {
	fn drop(&mut self) {
		self.shutdown();
	}
}

impl std::fmt::Debug for HistoryWriter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HistoryWriter")
			.field("running", &self.is_running())
			.finish_non_exhaustive()
	}
}

fn run(store: SessionStore, rx: mpsc::Receiver<WriterCommand>) {
	debug!("session writer started");
	let mut pending = None;

	loop {
		let cmd = match pending.take() {
			Some(cmd) => cmd,
			None => match rx.recv() {
				Ok(cmd) => cmd,
				Err(_) => break,
			},
		};

		match cmd {
			WriterCommand::Persist(mut items) => {
				let mut coalesced = 0usize;
				loop {
					match rx.try_recv() {
						Ok(WriterCommand::Persist(next)) => {
							items = next;
							coalesced += 1;
						}
						Ok(other) => {
							pending = Some(other);
							break;
						}
						Err(_) => break,
					}
				}
				if coalesced > 0 {
					debug!(coalesced, "coalesced session history snapshots");
				}
				write_snapshot(&store, &items);
			}
			WriterCommand::Flush(ack) => {
				let _ = ack.send(());
			}
			WriterCommand::Shutdown => break,
		}
	}

	info!("session writer stopped");
}

fn write_snapshot(store: &SessionStore, items: &[SessionItem]) {
	if let Err(e) = store.write(items) {
		warn!(error = %e, count = items.len(), "failed to persist session history");
	}
}
