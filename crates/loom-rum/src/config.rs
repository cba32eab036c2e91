// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Agent configuration.
//!
//! Configuration is assembled from layers, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. A TOML file (optional)
//! 3. Environment variables: `LOOM_RUM_<SECTION>__<FIELD>`, for example
//!    `LOOM_RUM_SESSION__SAMPLE_RATE=0.25`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ConfigError;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "LOOM_RUM_";

/// Default inactivity timeout: 15 minutes.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(15 * 60);
/// Default hard cap on session length: 4 hours.
pub const DEFAULT_MAX_SESSION_LENGTH: Duration = Duration::from_secs(4 * 60 * 60);
/// Default number of retained session records.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;
/// Default retention of session records: 31 days.
pub const DEFAULT_HISTORY_LIFETIME: Duration = Duration::from_secs(31 * 24 * 60 * 60);
/// Default storage namespace.
pub const DEFAULT_NAMESPACE: &str = "loom.rum";

/// Complete agent configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RumConfig {
	pub session: SessionConfig,
	pub storage: StorageConfig,
}

/// Session rotation and sampling policy.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
	/// Probability that a session is sampled (0.0-1.0).
	pub sample_rate: f64,
	/// Inactivity after which the session rotates.
	pub timeout: Duration,
	/// Maximum session length regardless of activity.
	pub max_length: Duration,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			sample_rate: 1.0,
			timeout: DEFAULT_SESSION_TIMEOUT,
			max_length: DEFAULT_MAX_SESSION_LENGTH,
		}
	}
}

impl SessionConfig {
	pub fn validate(&self) -> Result<(), ConfigError> {
		if !self.sample_rate.is_finite() || !(0.0..=1.0).contains(&self.sample_rate) {
			return Err(ConfigError::invalid_value(
				"session.sample_rate",
				format!("must be within 0.0..=1.0, got {}", self.sample_rate),
			));
		}
		if self.timeout.is_zero() {
			return Err(ConfigError::invalid_value(
				"session.timeout_secs",
				"must be greater than zero",
			));
		}
		if self.max_length.is_zero() {
			return Err(ConfigError::invalid_value(
				"session.max_length_secs",
				"must be greater than zero",
			));
		}
		if self.max_length < self.timeout {
			warn!(
				timeout_secs = self.timeout.as_secs(),
				max_length_secs = self.max_length.as_secs(),
				"session max length is shorter than the inactivity timeout"
			);
		}
		Ok(())
	}
}

/// Persistence settings.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
	/// Directory for persisted state. `None` resolves to the XDG data directory.
	pub dir: Option<PathBuf>,
	/// Prefix applied to every stored key.
	pub namespace: String,
	/// Maximum number of retained session records.
	pub history_capacity: usize,
	/// Maximum age of retained session records.
	pub history_lifetime: Duration,
}

impl Default for StorageConfig {
	fn default() -> Self {
		Self {
			dir: None,
			namespace: DEFAULT_NAMESPACE.to_string(),
			history_capacity: DEFAULT_HISTORY_CAPACITY,
			history_lifetime: DEFAULT_HISTORY_LIFETIME,
		}
	}
}

impl StorageConfig {
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.namespace.is_empty()
			|| !self
				.namespace
				.bytes()
				.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
		{
			return Err(ConfigError::invalid_value(
				"storage.namespace",
				"must be non-empty and contain only [A-Za-z0-9._-]",
			));
		}
		if self.history_capacity == 0 {
			return Err(ConfigError::invalid_value(
				"storage.history_capacity",
				"must be at least 1",
			));
		}
		if self.history_lifetime.is_zero() {
			return Err(ConfigError::invalid_value(
				"storage.history_lifetime_secs",
				"must be greater than zero",
			));
		}
		Ok(())
	}

	/// Resolves the storage directory, falling back to `<data_dir>/loom/rum`.
	pub fn resolve_dir(&self) -> Result<PathBuf, ConfigError> {
		if let Some(dir) = &self.dir {
			return Ok(dir.clone());
		}
		dirs::data_dir()
			.map(|dir| dir.join("loom").join("rum"))
			.ok_or_else(|| {
				ConfigError::Io(std::io::Error::new(
					std::io::ErrorKind::NotFound,
					"could not determine XDG data directory",
				))
			})
	}
}

impl RumConfig {
	/// Loads configuration from defaults, an optional TOML file and the process environment.
	pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
		let mut layer = ConfigLayer::default();
		if let Some(path) = path {
			layer.merge(ConfigLayer::from_file(path)?);
		}
		layer.merge(ConfigLayer::from_env_vars(std::env::vars())?);
		Self::from_layer(layer)
	}

	/// Applies a merged layer on top of the defaults and validates the result.
	pub fn from_layer(layer: ConfigLayer) -> Result<Self, ConfigError> {
		let mut config = Self::default();

		let session = layer.session;
		if let Some(rate) = session.sample_rate {
			config.session.sample_rate = rate;
		}
		if let Some(secs) = session.timeout_secs {
			config.session.timeout = Duration::from_secs(secs);
		}
		if let Some(secs) = session.max_length_secs {
			config.session.max_length = Duration::from_secs(secs);
		}

		let storage = layer.storage;
		if let Some(dir) = storage.dir {
			config.storage.dir = Some(dir);
		}
		if let Some(namespace) = storage.namespace {
			config.storage.namespace = namespace;
		}
		if let Some(capacity) = storage.history_capacity {
			config.storage.history_capacity = capacity;
		}
		if let Some(secs) = storage.history_lifetime_secs {
			config.storage.history_lifetime = Duration::from_secs(secs);
		}

		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		self.session.validate()?;
		self.storage.validate()
	}
}

/// A partial configuration as read from one source.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
	#[serde(default)]
	pub session: SessionLayer,
	#[serde(default)]
	pub storage: StorageLayer,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionLayer {
	pub sample_rate: Option<f64>,
	pub timeout_secs: Option<u64>,
	pub max_length_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageLayer {
	pub dir: Option<PathBuf>,
	pub namespace: Option<String>,
	pub history_capacity: Option<usize>,
	pub history_lifetime_secs: Option<u64>,
}

impl ConfigLayer {
	/// Reads a TOML layer. A missing file yields an empty layer.
	pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
		if !path.exists() {
			debug!(path = %path.display(), "config file not found, skipping");
			return Ok(Self::default());
		}

		debug!(path = %path.display(), "loading config file");
		let content = std::fs::read_to_string(path)?;
		toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: path.to_path_buf(),
			source: e,
		})
	}

	/// Builds a layer from `LOOM_RUM_*` variables; other variables are ignored.
	pub fn from_env_vars(
		vars: impl IntoIterator<Item = (String, String)>,
	) -> Result<Self, ConfigError> {
		let mut layer = Self::default();

		for (name, value) in vars {
			let Some(key) = name.strip_prefix(ENV_PREFIX) else {
				continue;
			};

			match key {
				"SESSION__SAMPLE_RATE" => layer.session.sample_rate = Some(parse_env(&name, &value)?),
				"SESSION__TIMEOUT_SECS" => layer.session.timeout_secs = Some(parse_env(&name, &value)?),
				"SESSION__MAX_LENGTH_SECS" => {
					layer.session.max_length_secs = Some(parse_env(&name, &value)?)
				}
				"STORAGE__DIR" => layer.storage.dir = Some(PathBuf::from(value)),
				"STORAGE__NAMESPACE" => layer.storage.namespace = Some(value),
				"STORAGE__HISTORY_CAPACITY" => {
					layer.storage.history_capacity = Some(parse_env(&name, &value)?)
				}
				"STORAGE__HISTORY_LIFETIME_SECS" => {
					layer.storage.history_lifetime_secs = Some(parse_env(&name, &value)?)
				}
				_ => warn!(variable = %name, "ignoring unknown RUM environment variable"),
			}
		}

		Ok(layer)
	}

	/// Overlays `other` on top of `self`; set fields in `other` win.
	pub fn merge(&mut self, other: ConfigLayer) {
		let session = other.session;
		self.session.sample_rate = session.sample_rate.or(self.session.sample_rate);
		self.session.timeout_secs = session.timeout_secs.or(self.session.timeout_secs);
		self.session.max_length_secs = session.max_length_secs.or(self.session.max_length_secs);

		let storage = other.storage;
		self.storage.dir = storage.dir.or(self.storage.dir.take());
		self.storage.namespace = storage.namespace.or(self.storage.namespace.take());
		self.storage.history_capacity = storage.history_capacity.or(self.storage.history_capacity);
		self.storage.history_lifetime_secs = storage
			.history_lifetime_secs
			.or(self.storage.history_lifetime_secs);
	}
}

fn parse_env<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
	T: std::str::FromStr,
	T::Err: std::fmt::Display,
{
	value
		.trim()
		.parse()
		.map_err(|e| ConfigError::Env(format!("{name}={value}: {e}")))
}
