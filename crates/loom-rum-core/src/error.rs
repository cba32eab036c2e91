// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the RUM core types.

use thiserror::Error;

/// Errors that can occur when constructing RUM core values.
#[derive(Debug, Error, PartialEq)]
pub enum RumCoreError {
	/// Session identifier is empty or contains characters outside the identifier alphabet.
	#[error("invalid session ID: {0}")]
	InvalidSessionId(String),

	/// Sampling probability is not a finite number within [0.0, 1.0].
	#[error("invalid sample rate: {0} (expected a value within 0.0..=1.0)")]
	InvalidSampleRate(f64),
}
