// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Installation-scoped user identifier.

use std::sync::{Arc, OnceLock};

use loom_rum_core::identifier;
use tracing::{debug, info, warn};

use crate::error::StorageError;
use crate::storage::KeyValueStorage;

/// Storage key of the user identifier.
pub const USER_IDENTIFIER_KEY: &str = "userIdentifier";

/// Length of a generated user identifier (hex characters).
pub const USER_IDENTIFIER_LENGTH: usize = 32;

/// Provides one identifier per installation, created once and kept across sessions.
pub struct UserModel {
	storage: Arc<dyn KeyValueStorage>,
	identifier: OnceLock<String>,
}

impl UserModel {
	pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
		Self {
			storage,
			identifier: OnceLock::new(),
		}
	}

	/// Returns the stored identifier, generating and storing one if none exists.
	///
	/// Storage failures are logged; the generated identifier is still returned
	/// and stays stable for the lifetime of this model.
	pub fn prepare_identifier(&self) -> String {
		self.identifier.get_or_init(|| self.load_or_create()).clone()
	}

	fn load_or_create(&self) -> String {
		match self.storage.read::<String>(USER_IDENTIFIER_KEY) {
			Ok(Some(id)) if !id.is_empty() => {
				debug!("loaded user identifier");
				return id;
			}
			Ok(_) => {}
			Err(StorageError::TypeMismatch { .. }) => {
				warn!("stored user identifier is unreadable, replacing it");
				let id = identifier::generate_hex(USER_IDENTIFIER_LENGTH);
				if let Err(e) = self.storage.update(USER_IDENTIFIER_KEY, &id) {
					warn!(error = %e, "failed to persist user identifier");
				}
				return id;
			}
			Err(e) => {
				warn!(error = %e, "failed to read user identifier");
			}
		}

		let id = identifier::generate_hex(USER_IDENTIFIER_LENGTH);
		match self.storage.insert(USER_IDENTIFIER_KEY, &id) {
			Ok(()) => {
				info!("created user identifier");
				id
			}
			Err(StorageError::InsertIntoExistingKey(_)) => {
				// Another instance stored one first.
				match self.storage.read::<String>(USER_IDENTIFIER_KEY) {
					Ok(Some(existing)) if !existing.is_empty() => existing,
					_ => id,
				}
			}
			Err(e) => {
				warn!(error = %e, "failed to persist user identifier");
				id
			}
		}
	}
}

impl std::fmt::Debug for UserModel {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("UserModel")
			.field("prepared", &self.identifier.get().is_some())
			.finish_non_exhaustive()
	}
}
