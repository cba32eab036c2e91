// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for Loom real user monitoring.
//!
//! This crate holds the I/O-free building blocks of RUM session tracking:
//!
//! - [`SessionItem`] - durable identity record of one session
//! - [`SessionSampler`] - per-session statistical sampling decision
//! - [`RandomNumberProvider`] - injectable uniform random source
//! - [`identifier`] - NanoID-style random string identifiers
//!
//! ## Example
//!
//! ```rust
//! use loom_rum_core::{SessionSampler, SystemRandomNumberProvider};
//!
//! let sampler = SessionSampler::with_probability(0.25).unwrap();
//! let decision = sampler.decide(&SystemRandomNumberProvider);
//! println!("session is {decision}");
//! ```

pub mod app_state;
pub mod error;
pub mod identifier;
pub mod random;
pub mod sampling;
pub mod session;

pub use app_state::{AppState, AppStateEvent};
pub use error::RumCoreError;
pub use random::{RandomNumberProvider, ScriptedRandomNumberProvider, SystemRandomNumberProvider};
pub use sampling::{SamplingDecision, SessionSampler};
pub use session::{SessionId, SessionItem};

/// Result type for RUM core operations.
pub type Result<T> = std::result::Result<T, RumCoreError>;
