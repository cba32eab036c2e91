// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-session statistical sampling.
//!
//! A session is kept when a single draw from `[lower_bound, upper_bound]` is
//! less than or equal to the configured probability. Probability `1.0`
//! always keeps and `0.0` always drops; neither consumes a draw.

use serde::{Deserialize, Serialize};

use crate::error::RumCoreError;
use crate::random::RandomNumberProvider;

/// Outcome of a sampling decision for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingDecision {
	/// Telemetry for the session is retained.
	Sampled,
	/// Telemetry for the session is dropped.
	NotSampled,
}

impl SamplingDecision {
	#[must_use]
	pub fn is_sampled(self) -> bool {
		matches!(self, SamplingDecision::Sampled)
	}
}

impl From<bool> for SamplingDecision {
	fn from(sampled: bool) -> Self {
		if sampled {
			SamplingDecision::Sampled
		} else {
			SamplingDecision::NotSampled
		}
	}
}

impl std::fmt::Display for SamplingDecision {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			SamplingDecision::Sampled => write!(f, "sampled"),
			SamplingDecision::NotSampled => write!(f, "not_sampled"),
		}
	}
}

/// Decides whether a session is sampled.
///
/// The sampler holds no per-session state. Callers decide once per session
/// and cache the result; [`SessionSampler::configure`] only affects decisions
/// made afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSampler {
	probability: f64,
	lower_bound: f64,
	upper_bound: f64,
}

impl SessionSampler {
	/// Creates a sampler that keeps every session.
	#[must_use]
	pub fn new() -> Self {
		Self {
			probability: 1.0,
			lower_bound: 0.0,
			upper_bound: 1.0,
		}
	}

	/// Creates a sampler with the given probability.
	pub fn with_probability(probability: f64) -> Result<Self, RumCoreError> {
		let mut sampler = Self::new();
		sampler.configure(probability)?;
		Ok(sampler)
	}

	/// Sets the sampling probability for subsequent decisions.
	///
	/// Rejects values that are not finite or fall outside `[0.0, 1.0]`,
	/// leaving the previous probability in place.
	pub fn configure(&mut self, probability: f64) -> Result<(), RumCoreError> {
		if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
			return Err(RumCoreError::InvalidSampleRate(probability));
		}
		self.probability = probability;
		Ok(())
	}

	#[must_use]
	pub fn probability(&self) -> f64 {
		self.probability
	}

	#[must_use]
	pub fn lower_bound(&self) -> f64 {
		self.lower_bound
	}

	#[must_use]
	pub fn upper_bound(&self) -> f64 {
		self.upper_bound
	}

	/// Makes a sampling decision, drawing at most one random number.
	pub fn decide(&self, random: &dyn RandomNumberProvider) -> SamplingDecision {
		if !(0.0..=1.0).contains(&self.lower_bound)
			|| !(0.0..=1.0).contains(&self.upper_bound)
			|| self.lower_bound > self.upper_bound
		{
			return SamplingDecision::NotSampled;
		}

		if self.probability >= 1.0 {
			return SamplingDecision::Sampled;
		}
		if self.probability <= 0.0 {
			return SamplingDecision::NotSampled;
		}

		let draw = random.random_number(self.lower_bound..=self.upper_bound);
		let decision = SamplingDecision::from(draw <= self.probability);

		tracing::trace!(
			draw,
			probability = self.probability,
			decision = %decision,
			"sampling decision"
		);

		decision
	}
}

impl Default for SessionSampler {
	fn default() -> Self {
		Self::new()
	}
}
