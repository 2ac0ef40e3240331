// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration layer for merging from multiple sources.

use serde::Deserialize;

use super::rules::RulesConfigLayer;
use super::AuthzConfig;

/// Authorization configuration layer - all fields are Option for merging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthzConfigLayer {
	#[serde(default)]
	pub debug: Option<bool>,
	#[serde(default)]
	pub environment: Option<String>,
	#[serde(default)]
	pub debug_fallback_user: Option<String>,
	#[serde(default)]
	pub rules: Option<RulesConfigLayer>,
}

impl AuthzConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: AuthzConfigLayer) {
		if other.debug.is_some() {
			self.debug = other.debug;
		}
		if other.environment.is_some() {
			self.environment = other.environment;
		}
		if other.debug_fallback_user.is_some() {
			self.debug_fallback_user = other.debug_fallback_user;
		}
		merge_option(&mut self.rules, other.rules, RulesConfigLayer::merge);
	}

	pub fn finalize(self) -> AuthzConfig {
		AuthzConfig {
			debug: self.debug.unwrap_or(false),
			environment: self
				.environment
				.unwrap_or_else(|| "development".to_string()),
			debug_fallback_user: self.debug_fallback_user,
			rules: self.rules.unwrap_or_default().finalize(),
		}
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}
