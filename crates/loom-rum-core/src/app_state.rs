// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Application lifecycle states recorded alongside sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
	Active,
	Inactive,
	Background,
	Foreground,
	Terminate,
}

impl std::fmt::Display for AppState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			AppState::Active => write!(f, "active"),
			AppState::Inactive => write!(f, "inactive"),
			AppState::Background => write!(f, "background"),
			AppState::Foreground => write!(f, "foreground"),
			AppState::Terminate => write!(f, "terminate"),
		}
	}
}

/// A state transition observed at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppStateEvent {
	pub timestamp: DateTime<Utc>,
	pub state: AppState,
}
