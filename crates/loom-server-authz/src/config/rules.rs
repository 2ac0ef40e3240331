// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Rule sets declared in configuration files.
//!
//! ```toml
//! [rules]
//! retrieve = [["owner__id", "user__id"]]
//! update = [
//!     ["owner__id", "user__id"],
//!     ["is_not_super", ["created__gte", "last_week"]],
//!     { sentinel = "is_super", lhs = "status__in", rhs = "settings__statuses" },
//! ]
//! ```

use serde::Deserialize;

use super::error::ConfigError;
use crate::path::LookupPath;
use crate::rules::{Operation, Rule, RuleBook, RuleSet, SentinelRegistry};

/// One rule as written in a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RuleEntry {
	/// `["lhs", "rhs"]`
	Naked(LookupPath, LookupPath),
	/// `["sentinel", ["lhs", "rhs"]]`
	Gated(String, (LookupPath, LookupPath)),
	/// `{ sentinel = "...", lhs = "...", rhs = "..." }`, sentinel optional.
	Table {
		#[serde(default)]
		sentinel: Option<String>,
		lhs: LookupPath,
		rhs: LookupPath,
	},
}

impl RuleEntry {
	fn parts(&self) -> (Option<&str>, &LookupPath, &LookupPath) {
		match self {
			RuleEntry::Naked(lhs, rhs) => (None, lhs, rhs),
			RuleEntry::Gated(sentinel, (lhs, rhs)) => (Some(sentinel), lhs, rhs),
			RuleEntry::Table { sentinel, lhs, rhs } => (sentinel.as_deref(), lhs, rhs),
		}
	}

	/// Resolves the sentinel name and validates both paths.
	pub fn to_rule(
		&self,
		operation: Operation,
		sentinels: &SentinelRegistry,
	) -> Result<Rule, ConfigError> {
		let (sentinel, lhs, rhs) = self.parts();
		for path in [lhs, rhs] {
			if path.has_empty_segment() {
				return Err(ConfigError::InvalidPath {
					operation: operation.to_string(),
					path: path.to_string(),
				});
			}
		}
		match sentinel {
			None => Ok(Rule::naked(lhs.clone(), rhs.clone())),
			Some(name) => {
				let sentinel =
					sentinels
						.get(name)
						.cloned()
						.ok_or_else(|| ConfigError::UnknownSentinel {
							operation: operation.to_string(),
							sentinel: name.to_string(),
						})?;
				Ok(Rule::gated(sentinel, (lhs.clone(), rhs.clone())))
			}
		}
	}
}

/// Fully resolved rule configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RulesConfig {
	pub retrieve: Vec<RuleEntry>,
	pub create: Vec<RuleEntry>,
	pub update: Vec<RuleEntry>,
	pub delete: Vec<RuleEntry>,
}

impl RulesConfig {
	pub fn entries(&self, operation: Operation) -> &[RuleEntry] {
		match operation {
			Operation::Retrieve => &self.retrieve,
			Operation::Create => &self.create,
			Operation::Update => &self.update,
			Operation::Delete => &self.delete,
		}
	}

	/// Builds a [`RuleBook`], resolving sentinel names against `sentinels`.
	pub fn to_rule_book(&self, sentinels: &SentinelRegistry) -> Result<RuleBook, ConfigError> {
		let mut book = RuleBook::new();
		for &operation in Operation::all() {
			let rules = self
				.entries(operation)
				.iter()
				.map(|entry| entry.to_rule(operation, sentinels))
				.collect::<Result<RuleSet, _>>()?;
			book.insert(operation, rules);
		}
		Ok(book)
	}
}

/// Rule configuration layer (partial, for merging).
///
/// A layer that sets an operation replaces that operation's rules entirely.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RulesConfigLayer {
	#[serde(default)]
	pub retrieve: Option<Vec<RuleEntry>>,
	#[serde(default)]
	pub create: Option<Vec<RuleEntry>>,
	#[serde(default)]
	pub update: Option<Vec<RuleEntry>>,
	#[serde(default)]
	pub delete: Option<Vec<RuleEntry>>,
}

impl RulesConfigLayer {
	pub fn merge(&mut self, other: RulesConfigLayer) {
		if other.retrieve.is_some() {
			self.retrieve = other.retrieve;
		}
		if other.create.is_some() {
			self.create = other.create;
		}
		if other.update.is_some() {
			self.update = other.update;
		}
		if other.delete.is_some() {
			self.delete = other.delete;
		}
	}

	pub fn finalize(self) -> RulesConfig {
		RulesConfig {
			retrieve: self.retrieve.unwrap_or_default(),
			create: self.create.unwrap_or_default(),
			update: self.update.unwrap_or_default(),
			delete: self.delete.unwrap_or_default(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::rules::Sentinel;

	fn parse(toml_str: &str) -> RulesConfig {
		toml::from_str::<RulesConfigLayer>(toml_str)
			.unwrap()
			.finalize()
	}

	#[test]
	fn parses_every_entry_shape() {
		let config = parse(
			r#"
			update = [
				["owner__id", "user__id"],
				["is_not_super", ["created__gte", "last_week"]],
				{ sentinel = "is_super", lhs = "status__in", rhs = "request__statuses" },
				{ lhs = "team__id", rhs = "user__team__id" },
			]
			"#,
		);
		assert_eq!(
			config.update,
			vec![
				RuleEntry::Naked("owner__id".into(), "user__id".into()),
				RuleEntry::Gated(
					"is_not_super".to_string(),
					("created__gte".into(), "last_week".into())
				),
				RuleEntry::Table {
					sentinel: Some("is_super".to_string()),
					lhs: "status__in".into(),
					rhs: "request__statuses".into(),
				},
				RuleEntry::Table {
					sentinel: None,
					lhs: "team__id".into(),
					rhs: "user__team__id".into(),
				},
			]
		);
		assert!(config.retrieve.is_empty());
	}

	#[test]
	fn builds_rule_book_with_sentinels() {
		let config = parse(
			r#"
			retrieve = [["owner__id", "user__id"]]
			update = [["is_super", ["secret", "user__id"]]]
			"#,
		);
		let book = config.to_rule_book(&SentinelRegistry::new()).unwrap();
		assert_eq!(book.rules_for(Operation::Retrieve).len(), 1);
		let update = book.rules_for(Operation::Update);
		assert_eq!(update[0].sentinel().map(Sentinel::name), Some("is_super"));
		assert!(book.rules_for(Operation::Delete).is_empty());
	}

	#[test]
	fn unknown_sentinel_is_rejected() {
		let config = parse(r#"delete = [["is_wizard", ["a", "user__id"]]]"#);
		let err = config.to_rule_book(&SentinelRegistry::new()).unwrap_err();
		assert!(matches!(
			err,
			ConfigError::UnknownSentinel { ref operation, ref sentinel }
				if operation == "delete" && sentinel == "is_wizard"
		));
	}

	#[test]
	fn custom_sentinels_resolve_by_name() {
		let config = parse(r#"delete = [["is_staff", ["a", "user__id"]]]"#);
		let mut sentinels = SentinelRegistry::new();
		sentinels.register(Sentinel::new("is_staff", |_| true));
		assert!(config.to_rule_book(&sentinels).is_ok());
	}

	#[test]
	fn empty_segments_are_rejected() {
		for path in ["", "owner____id", "owner__"] {
			let config = RulesConfig {
				create: vec![RuleEntry::Naked(path.into(), "user__id".into())],
				..Default::default()
			};
			let err = config.to_rule_book(&SentinelRegistry::new()).unwrap_err();
			assert!(matches!(err, ConfigError::InvalidPath { .. }), "{path:?}");
		}
	}

	#[test]
	fn later_layer_replaces_operation_rules() {
		let mut base: RulesConfigLayer =
			toml::from_str(r#"update = [["a", "user__a"], ["b", "user__b"]]"#).unwrap();
		let overlay: RulesConfigLayer = toml::from_str(r#"update = [["c", "user__c"]]"#).unwrap();
		base.merge(overlay);
		base.merge(RulesConfigLayer::default());
		assert_eq!(base.finalize().update.len(), 1);
	}
}
