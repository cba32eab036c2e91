// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the RUM session runtime.

use std::path::PathBuf;

use loom_rum_core::RumCoreError;
use thiserror::Error;

/// Result type alias for RUM operations.
pub type Result<T> = std::result::Result<T, RumError>;

/// Errors raised by key-value storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
	/// I/O error reading or writing the backing files.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// Value could not be encoded or decoded.
	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	/// Key contains characters that cannot be stored.
	#[error("invalid storage key: {0}")]
	InvalidKey(String),

	/// Insert attempted on a key that already holds a value.
	#[error("key already holds a value: {0}")]
	InsertIntoExistingKey(String),

	/// Delete attempted on a key with no value.
	#[error("no value for key: {0}")]
	NoValueForKey(String),

	/// Stored data does not decode into the requested type.
	#[error("stored value for key {key} does not match the expected type: {source}")]
	TypeMismatch {
		key: String,
		#[source]
		source: serde_json::Error,
	},
}

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// I/O error reading a config file.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// TOML parsing error.
	#[error("TOML parse error in {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	/// Environment variable could not be parsed.
	#[error("environment error: {0}")]
	Env(String),

	/// A value failed validation.
	#[error("invalid value for {field}: {message}")]
	InvalidValue { field: String, message: String },
}

impl ConfigError {
	/// Create an invalid value error.
	pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
		Self::InvalidValue {
			field: field.into(),
			message: message.into(),
		}
	}
}

/// Top-level errors of the RUM agent.
#[derive(Debug, Error)]
pub enum RumError {
	/// The agent has been shut down.
	#[error("RUM agent has been shut down")]
	AgentShutdown,

	/// Storage backend failure.
	#[error("storage error: {0}")]
	Storage(#[from] StorageError),

	/// Configuration failure.
	#[error("configuration error: {0}")]
	Config(#[from] ConfigError),

	/// Invalid core value, such as an out-of-range sample rate.
	#[error(transparent)]
	Core(#[from] RumCoreError),
}
