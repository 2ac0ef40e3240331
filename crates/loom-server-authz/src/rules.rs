// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Rule definitions.
//!
//! A rule pairs a left-hand path (into the candidate object) with a
//! right-hand path (into a primitive):
//!
//! ```text
//! naked:    ("owner__id",  "user__id")
//! sentinel: (is_not_super, ("created__gte", "last_week"))
//! ```
//!
//! A sentinel rule only applies when its predicate accepts the current user.
//! Rules are grouped into a [`RuleSet`] per [`Operation`], and the sets into
//! a [`RuleBook`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::path::LookupPath;
use crate::value::Value;

/// The CRUD operation a rule set governs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
	Retrieve,
	Create,
	Update,
	Delete,
}

impl Operation {
	pub fn all() -> &'static [Operation] {
		&[
			Operation::Retrieve,
			Operation::Create,
			Operation::Update,
			Operation::Delete,
		]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Operation::Retrieve => "retrieve",
			Operation::Create => "create",
			Operation::Update => "update",
			Operation::Delete => "delete",
		}
	}
}

impl fmt::Display for Operation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Operation {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"retrieve" => Ok(Operation::Retrieve),
			"create" => Ok(Operation::Create),
			"update" => Ok(Operation::Update),
			"delete" => Ok(Operation::Delete),
			other => Err(format!("unknown operation: {other}")),
		}
	}
}

/// A named predicate over the current user gating a rule.
#[derive(Clone)]
pub struct Sentinel {
	name: String,
	predicate: Arc<dyn Fn(&Value) -> bool + Send + Sync>,
}

impl Sentinel {
	pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
	where
		F: Fn(&Value) -> bool + Send + Sync + 'static,
	{
		Self {
			name: name.into(),
			predicate: Arc::new(predicate),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// True if the gated rule applies to `user`.
	pub fn admits(&self, user: &Value) -> bool {
		(self.predicate)(user)
	}

	/// Admits users whose `is_super` attribute is truthy.
	pub fn is_super() -> Self {
		Sentinel::new("is_super", |user| {
			user.attribute("is_super")
				.map(|flag| flag.force().is_truthy())
				.unwrap_or(false)
		})
	}

	/// Admits users whose `is_super` attribute is exactly `false`.
	pub fn is_not_super() -> Self {
		Sentinel::new("is_not_super", |user| {
			user.attribute("is_super")
				.map(|flag| flag.force() == Value::Bool(false))
				.unwrap_or(false)
		})
	}

	/// Admits any non-null user.
	pub fn is_authenticated() -> Self {
		Sentinel::new("is_authenticated", |user| !matches!(user, Value::Null))
	}
}

impl fmt::Debug for Sentinel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Sentinel").field(&self.name).finish()
	}
}

/// Sentinels addressable by name from rule configuration files.
#[derive(Debug, Clone)]
pub struct SentinelRegistry {
	sentinels: HashMap<String, Sentinel>,
}

impl SentinelRegistry {
	/// Registry holding `is_super`, `is_not_super` and `is_authenticated`.
	pub fn new() -> Self {
		let mut registry = Self {
			sentinels: HashMap::new(),
		};
		registry.register(Sentinel::is_super());
		registry.register(Sentinel::is_not_super());
		registry.register(Sentinel::is_authenticated());
		registry
	}

	/// Adds `sentinel` under its own name, replacing any earlier one.
	pub fn register(&mut self, sentinel: Sentinel) -> &mut Self {
		self.sentinels.insert(sentinel.name.clone(), sentinel);
		self
	}

	pub fn get(&self, name: &str) -> Option<&Sentinel> {
		self.sentinels.get(name)
	}
}

impl Default for SentinelRegistry {
	fn default() -> Self {
		Self::new()
	}
}

/// A single authorization rule.
#[derive(Debug, Clone)]
pub enum Rule {
	/// Always applies.
	Naked { lhs: LookupPath, rhs: LookupPath },
	/// Applies only when the sentinel admits the current user.
	Sentinel {
		sentinel: Sentinel,
		lhs: LookupPath,
		rhs: LookupPath,
	},
}

impl Rule {
	pub fn naked(lhs: impl Into<LookupPath>, rhs: impl Into<LookupPath>) -> Self {
		Rule::Naked {
			lhs: lhs.into(),
			rhs: rhs.into(),
		}
	}

	pub fn gated(
		sentinel: Sentinel,
		(lhs, rhs): (impl Into<LookupPath>, impl Into<LookupPath>),
	) -> Self {
		Rule::Sentinel {
			sentinel,
			lhs: lhs.into(),
			rhs: rhs.into(),
		}
	}

	pub fn lhs(&self) -> &LookupPath {
		match self {
			Rule::Naked { lhs, .. } | Rule::Sentinel { lhs, .. } => lhs,
		}
	}

	pub fn rhs(&self) -> &LookupPath {
		match self {
			Rule::Naked { rhs, .. } | Rule::Sentinel { rhs, .. } => rhs,
		}
	}

	pub fn sentinel(&self) -> Option<&Sentinel> {
		match self {
			Rule::Naked { .. } => None,
			Rule::Sentinel { sentinel, .. } => Some(sentinel),
		}
	}

	/// True if the rule applies to `user`. Naked rules always apply.
	pub fn applies_to(&self, user: &Value) -> bool {
		self.sentinel().map_or(true, |s| s.admits(user))
	}
}

/// Ordered rules for one operation.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
	rules: Vec<Rule>,
}

impl RuleSet {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder: append a naked rule.
	pub fn rule(mut self, lhs: impl Into<LookupPath>, rhs: impl Into<LookupPath>) -> Self {
		self.rules.push(Rule::naked(lhs, rhs));
		self
	}

	/// Builder: append a sentinel rule.
	pub fn gated(
		mut self,
		sentinel: Sentinel,
		pair: (impl Into<LookupPath>, impl Into<LookupPath>),
	) -> Self {
		self.rules.push(Rule::gated(sentinel, pair));
		self
	}

	pub fn push(&mut self, rule: Rule) {
		self.rules.push(rule);
	}

	pub fn rules(&self) -> &[Rule] {
		&self.rules
	}

	pub fn len(&self) -> usize {
		self.rules.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rules.is_empty()
	}
}

impl FromIterator<Rule> for RuleSet {
	fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
		Self {
			rules: iter.into_iter().collect(),
		}
	}
}

/// Rule sets keyed by operation.
#[derive(Debug, Clone, Default)]
pub struct RuleBook {
	sets: HashMap<Operation, RuleSet>,
}

impl RuleBook {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder: set the rules for `operation`, replacing any earlier set.
	pub fn with(mut self, operation: Operation, rules: RuleSet) -> Self {
		self.sets.insert(operation, rules);
		self
	}

	pub fn insert(&mut self, operation: Operation, rules: RuleSet) {
		self.sets.insert(operation, rules);
	}

	/// The rules for `operation`. Operations without rules have none.
	pub fn rules_for(&self, operation: Operation) -> &[Rule] {
		self.sets
			.get(&operation)
			.map(RuleSet::rules)
			.unwrap_or_default()
	}
}
