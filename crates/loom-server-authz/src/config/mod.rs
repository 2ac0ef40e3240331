// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for relational authorization.
//!
//! Precedence (highest to lowest):
//! 1. Environment variables (`LOOM_SERVER_AUTHZ_*`, `LOOM_SERVER_ENV`)
//! 2. Config file (`/etc/loom/authz.toml`)
//! 3. Built-in defaults
//!
//! ```toml
//! debug = false
//! environment = "production"
//!
//! [rules]
//! retrieve = [["owner__id", "user__id"]]
//! update = [["is_not_super", ["created__gte", "last_week"]]]
//! ```

pub mod error;
pub mod layer;
pub mod rules;
pub mod sources;

pub use error::ConfigError;
pub use layer::AuthzConfigLayer;
pub use rules::{RuleEntry, RulesConfig, RulesConfigLayer};
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved authorization configuration.
#[derive(Debug, Clone)]
pub struct AuthzConfig {
	/// Enables the debug fallback identity for unresolved users.
	pub debug: bool,
	pub environment: String,
	/// Identity key looked up when `debug` is set and no user is found.
	pub debug_fallback_user: Option<String>,
	pub rules: RulesConfig,
}

impl Default for AuthzConfig {
	fn default() -> Self {
		Self {
			debug: false,
			environment: "development".to_string(),
			debug_fallback_user: None,
			rules: RulesConfig::default(),
		}
	}
}

/// Load configuration from all sources with standard precedence.
pub fn load_config() -> Result<AuthzConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	];
	load_from(sources)
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<AuthzConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	];
	load_from(sources)
}

fn load_from(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<AuthzConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = AuthzConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: AuthzConfigLayer) -> Result<AuthzConfig, ConfigError> {
	let config = layer.finalize();
	validate_config(&config)?;

	info!(
		environment = %config.environment,
		debug = config.debug,
		debug_fallback_configured = config.debug_fallback_user.is_some(),
		retrieve_rules = config.rules.retrieve.len(),
		create_rules = config.rules.create.len(),
		update_rules = config.rules.update.len(),
		delete_rules = config.rules.delete.len(),
		"Authorization configuration loaded"
	);

	Ok(config)
}

/// Validate cross-field configuration rules.
fn validate_config(config: &AuthzConfig) -> Result<(), ConfigError> {
	if config.debug && config.environment == "production" {
		return Err(ConfigError::Validation(
			"LOOM_SERVER_AUTHZ_DEBUG=1 is set while LOOM_SERVER_ENV=production. \
			 This is a security risk. Remove LOOM_SERVER_AUTHZ_DEBUG or set LOOM_SERVER_ENV \
			 to a non-production value."
				.to_string(),
		));
	}

	Ok(())
}
