// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Rule normalization.
//!
//! Turns a rule set into concrete [`Obligation`]s for one call:
//!
//! 1. Drop sentinel rules whose sentinel rejects the current user.
//! 2. Keep one rule per left-hand path. A later rule replaces an earlier rule
//!    with the same left-hand path but keeps the earlier rule's position.
//! 3. Resolve every right-hand path: the head names a primitive, the tail is
//!    traversed with deferred invocation.
//!
//! Any resolution failure aborts the whole call; no obligation is silently
//! dropped.

use indexmap::IndexMap;
use tracing::debug;

use crate::context::AuthzContext;
use crate::error::Result;
use crate::path::{self, LookupPath};
use crate::primitives::PrimitiveRegistry;
use crate::rules::Rule;
use crate::value::Value;

/// A left-hand path paired with the concrete value it is checked against.
#[derive(Debug, Clone, PartialEq)]
pub struct Obligation {
	path: LookupPath,
	value: Value,
}

impl Obligation {
	pub fn new(path: LookupPath, value: Value) -> Self {
		Self { path, value }
	}

	pub fn path(&self) -> &LookupPath {
		&self.path
	}

	pub fn value(&self) -> &Value {
		&self.value
	}
}

/// Normalizes `rules` for the call described by `ctx`.
pub fn normalize(
	rules: &[Rule],
	primitives: &PrimitiveRegistry,
	ctx: &AuthzContext,
) -> Result<Vec<Obligation>> {
	let mut selected: IndexMap<&LookupPath, &LookupPath> = IndexMap::with_capacity(rules.len());

	for rule in rules {
		if !rule.applies_to(ctx.user()) {
			debug!(
				lhs = %rule.lhs(),
				sentinel = rule.sentinel().map(|s| s.name()).unwrap_or_default(),
				"sentinel rejected user, skipping rule"
			);
			continue;
		}
		if let Some(replaced) = selected.insert(rule.lhs(), rule.rhs()) {
			debug!(
				lhs = %rule.lhs(),
				replaced = %replaced,
				rhs = %rule.rhs(),
				"later rule replaces earlier rule with the same left-hand path"
			);
		}
	}

	selected
		.into_iter()
		.map(|(lhs, rhs)| {
			let root = primitives.resolve(rhs.head(), ctx)?;
			let value = path::resolve(root, rhs.tail())?;
			Ok(Obligation::new(lhs.clone(), value))
		})
		.collect()
}
