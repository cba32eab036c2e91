// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Uniform random number sources used for sampling decisions.

use std::collections::VecDeque;
use std::ops::RangeInclusive;
use parking_lot::Mutex;
use rand::Rng;

/// A source of uniformly distributed numbers over a closed interval.
pub trait RandomNumberProvider: Send + Sync {
	/// Returns a number uniformly distributed over `range`, bounds included.
	fn random_number(&self, range: RangeInclusive<f64>) -> f64;
}

/// Random provider backed by the thread-local system generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRandomNumberProvider;

impl RandomNumberProvider for SystemRandomNumberProvider {
	fn random_number(&self, range: RangeInclusive<f64>) -> f64 {
		rand::thread_rng().gen_range(range)
	}
}

/// Deterministic provider that replays a fixed script of numbers.
///
/// Intended for tests. Every requested range is recorded so assertions can
/// check what the caller asked for.
///
/// # Panics
///
/// [`RandomNumberProvider::random_number`] panics once the script is
/// exhausted: a test that draws more numbers than it scripted is a setup bug.
#[derive(Debug, Default)]
pub struct ScriptedRandomNumberProvider {
	state: Mutex<ScriptState>,
}

#[derive(Debug, Default)]
struct ScriptState {
	remaining: VecDeque<f64>,
	requested: Vec<RangeInclusive<f64>>,
}

impl ScriptedRandomNumberProvider {
	/// Creates a provider that returns `numbers` in order.
	pub fn new(numbers: impl IntoIterator<Item = f64>) -> Self {
		Self {
			state: Mutex::new(ScriptState {
				remaining: numbers.into_iter().collect(),
				requested: Vec::new(),
			}),
		}
	}

	/// Appends numbers to the end of the script.
	pub fn push(&self, numbers: impl IntoIterator<Item = f64>) {
		self.lock().remaining.extend(numbers);
	}

	/// Numbers not yet drawn.
	pub fn remaining(&self) -> usize {
		self.lock().remaining.len()
	}

	/// Ranges requested so far, in call order.
	pub fn requested_ranges(&self) -> Vec<RangeInclusive<f64>> {
		self.lock().requested.clone()
	}

	fn lock(&self) -> parking_lot::MutexGuard<'_, ScriptState> {
		self.state.lock()
	}
}

impl RandomNumberProvider for ScriptedRandomNumberProvider {
	fn random_number(&self, range: RangeInclusive<f64>) -> f64 {
		let mut state = self.lock();
		state.requested.push(range.clone());
		match state.remaining.pop_front() {
			Some(value) => value,
			None => {
				drop(state);
				panic!("scripted random number provider exhausted (requested range {range:?})");
			}
		}
	}
}
