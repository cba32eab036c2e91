// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session identity records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RumCoreError;
use crate::identifier;

/// Opaque identifier of a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
	/// Generates a fresh random identifier.
	#[must_use]
	pub fn generate() -> Self {
		Self(identifier::generate())
	}

	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}

	#[must_use]
	pub fn into_string(self) -> String {
		self.0
	}
}

impl std::fmt::Display for SessionId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

impl std::str::FromStr for SessionId {
	type Err = RumCoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if identifier::is_valid(s) {
			Ok(Self(s.to_string()))
		} else {
			Err(RumCoreError::InvalidSessionId(s.to_string()))
		}
	}
}

impl AsRef<str> for SessionId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl From<SessionId> for String {
	fn from(id: SessionId) -> Self {
		id.0
	}
}

/// Durable record of one session.
///
/// The id and start never change after creation. `closed` only moves from
/// unset to `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionItem {
	id: SessionId,
	start: DateTime<Utc>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	closed: Option<bool>,
}

impl SessionItem {
	/// Creates an open session record.
	#[must_use]
	pub fn new(id: SessionId, start: DateTime<Utc>) -> Self {
		Self {
			id,
			start,
			closed: None,
		}
	}

	/// Creates a session record that is already closed.
	#[must_use]
	pub fn closed(id: SessionId, start: DateTime<Utc>) -> Self {
		Self {
			id,
			start,
			closed: Some(true),
		}
	}

	#[must_use]
	pub fn id(&self) -> &SessionId {
		&self.id
	}

	#[must_use]
	pub fn start(&self) -> DateTime<Utc> {
		self.start
	}

	/// Raw closed flag as persisted; `None` means the flag was never set.
	#[must_use]
	pub fn closed_flag(&self) -> Option<bool> {
		self.closed
	}

	#[must_use]
	pub fn is_closed(&self) -> bool {
		self.closed.unwrap_or(false)
	}

	/// Marks the session closed. Returns false if it already was.
	pub fn close(&mut self) -> bool {
		if self.is_closed() {
			return false;
		}
		self.closed = Some(true);
		true
	}
}
