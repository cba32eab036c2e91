// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Real user monitoring session runtime for Loom.
//!
//! Decides which session every telemetry event belongs to, rotates sessions on
//! inactivity and maximum length, keeps a bounded session history across
//! restarts, and samples telemetry per session.
//!
//! # Example
//!
//! ```rust,no_run
//! use loom_rum::{AgentSharedState, RumAgent};
//!
//! let agent = RumAgent::builder()
//!     .session_sample_rate(0.5)
//!     .build()?;
//!
//! let shared = agent.shared_state();
//! println!("event belongs to session {}", shared.session_id());
//! if agent.session().is_sampled() {
//!     // export the event
//! }
//!
//! agent.shutdown()?;
//! # Ok::<(), loom_rum::RumError>(())
//! ```
//!
//! # Session lifecycle
//!
//! - The first access creates a session. Every access counts as activity.
//! - An access more than `session.timeout` after the last activity, or more
//!   than `session.max_length` after the session started, starts a new session.
//! - Listeners receive [`SessionNotification::WillReset`] with the outgoing id
//!   before the new session is visible, and [`SessionNotification::DidReset`]
//!   with the new id once it is current.

pub mod agent;
pub mod app_state;
pub mod clock;
pub mod config;
pub mod error;
pub mod manager;
pub mod notify;
pub mod session_store;
pub mod shared_state;
pub mod storage;
pub mod user;
pub mod writer;

pub use agent::{RumAgent, RumAgentBuilder};
pub use app_state::{AppStateModel, AppStateProvider};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigLayer, RumConfig, SessionConfig, StorageConfig};
pub use error::{ConfigError, Result, RumError, StorageError};
pub use manager::{RotationReason, SessionManager};
pub use notify::{ListenerId, SessionNotification};
pub use session_store::SessionStore;
pub use shared_state::{AgentSharedState, SharedState};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
pub use user::UserModel;

pub use loom_rum_core::{
	AppState, AppStateEvent, RandomNumberProvider, SamplingDecision, ScriptedRandomNumberProvider,
	SessionId, SessionItem, SessionSampler, SystemRandomNumberProvider,
};
