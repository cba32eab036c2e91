// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Random string identifiers for sessions and users.
//!
//! Identifiers are drawn uniformly, with replacement, from a URL-safe
//! 64-character alphabet. Uniqueness rests on collision probability alone:
//! 21 characters give 126 bits of entropy, so collisions are not tracked.

use rand::RngCore;

/// The identifier alphabet: `[A-Za-z0-9_-]`.
pub const ALPHABET: &[u8; 64] =
	b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// Default identifier length.
pub const DEFAULT_LENGTH: usize = 21;

const HEX_ALPHABET: &[u8; 16] = b"0123456789abcdef";

/// Generates an identifier of [`DEFAULT_LENGTH`] characters.
#[must_use]
pub fn generate() -> String {
	generate_with_length(DEFAULT_LENGTH)
}

/// Generates an identifier of exactly `length` characters from [`ALPHABET`].
///
/// Each call draws from the calling thread's own generator, so concurrent
/// callers share no mutable state.
#[must_use]
pub fn generate_with_length(length: usize) -> String {
	// 256 is a multiple of 64, so masking a byte keeps the draw uniform.
	encode(length, ALPHABET, 63)
}

/// Generates a lowercase hexadecimal identifier of exactly `length` characters.
#[must_use]
pub fn generate_hex(length: usize) -> String {
	encode(length, HEX_ALPHABET, 15)
}

/// Returns true if every character of `value` belongs to [`ALPHABET`].
#[must_use]
pub fn is_valid(value: &str) -> bool {
	!value.is_empty() && value.bytes().all(|b| ALPHABET.contains(&b))
}

fn encode(length: usize, alphabet: &[u8], mask: u8) -> String {
	let mut bytes = vec![0u8; length];
	rand::thread_rng().fill_bytes(&mut bytes);

	bytes
		.into_iter()
		.map(|b| alphabet[usize::from(b & mask)] as char)
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use std::collections::HashSet;

	#[test]
	fn test_default_length() {
		assert_eq!(generate().len(), DEFAULT_LENGTH);
	}

	#[test]
	fn test_alphabet_has_64_unique_characters() {
		let unique: HashSet<u8> = ALPHABET.iter().copied().collect();
		assert_eq!(unique.len(), 64);
	}

	#[test]
	fn test_zero_length() {
		assert!(generate_with_length(0).is_empty());
	}

	#[test]
	fn test_no_duplicates_in_ten_thousand() {
		let ids: HashSet<String> = (0..10_000).map(|_| generate()).collect();
		assert_eq!(ids.len(), 10_000);
	}

	#[test]
	fn test_concurrent_generation() {
		let handles: Vec<_> = (0..8)
			.map(|_| std::thread::spawn(|| (0..500).map(|_| generate()).collect::<Vec<_>>()))
			.collect();

		let mut all = HashSet::new();
		for handle in handles {
			for id in handle.join().unwrap() {
				assert_eq!(id.len(), DEFAULT_LENGTH);
				assert!(all.insert(id));
			}
		}
		assert_eq!(all.len(), 4_000);
	}

	#[test]
	fn test_hex_identifier() {
		let id = generate_hex(32);
		assert_eq!(id.len(), 32);
		assert!(id.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
	}

	#[test]
	fn test_is_valid() {
		assert!(is_valid("abc_DEF-123"));
		assert!(!is_valid(""));
		assert!(!is_valid("has space"));
		assert!(!is_valid("dot.ted"));
	}

	proptest! {
		#[test]
		fn generated_ids_have_requested_length_and_alphabet(length in 0usize..256) {
			let id = generate_with_length(length);
			prop_assert_eq!(id.len(), length);
			prop_assert!(id.bytes().all(|b| ALPHABET.contains(&b)));
		}
	}
}
