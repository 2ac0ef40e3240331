// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Comparator dispatch for left-hand paths.
//!
//! The final segment of a left-hand path decides how the candidate is checked
//! against an obligation's value. Given `L`, the value reached by the leading
//! segments:
//!
//! 1. If `L` has a truthy attribute named by the final segment, that
//!    attribute must equal the value.
//! 2. Else, if the final segment is `in`, `L` must be a member of the value.
//! 3. Else, the final segment names a comparator (`eq`, `ne`, `gt`, `ge`,
//!    `gte`, `lt`, `le`, `lte`, `contains`) applied as `L <op> value`.
//!
//! A present but falsy attribute (`0`, `""`, `false`, `null`, `[]`) is treated
//! like a missing one and falls through to steps 2 and 3. A rule such as
//! `("status", ...)` against a candidate whose `status` is `0` therefore fails
//! with [`AuthzError::ComparatorNotFound`] rather than comparing `0`.

use std::cmp::Ordering;
use std::fmt;

use tracing::trace;

use crate::error::{AuthzError, Result};
use crate::normalize::Obligation;
use crate::path;
use crate::value::Value;

/// Final segment requesting a membership test.
pub const MEMBERSHIP: &str = "in";

/// Lookup aliases rewritten before comparator lookup.
const ALIASES: &[(&str, &str)] = &[("gte", "ge"), ("lte", "le")];

/// Comparator names after alias rewriting.
const COMPARATORS: &[(&str, Comparator)] = &[
	("eq", Comparator::Eq),
	("ne", Comparator::Ne),
	("gt", Comparator::Gt),
	("ge", Comparator::Ge),
	("lt", Comparator::Lt),
	("le", Comparator::Le),
	("contains", Comparator::Contains),
];

/// A named binary comparison with the candidate value on the left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
	Eq,
	Ne,
	Gt,
	Ge,
	Lt,
	Le,
	Contains,
}

impl Comparator {
	/// Looks up a comparator by lookup name, applying `gte`/`lte` aliases.
	pub fn from_lookup(name: &str) -> Option<Comparator> {
		let name = ALIASES
			.iter()
			.find(|(alias, _)| *alias == name)
			.map_or(name, |(_, target)| *target);
		COMPARATORS
			.iter()
			.find(|(candidate, _)| *candidate == name)
			.map(|(_, comparator)| *comparator)
	}

	pub fn name(&self) -> &'static str {
		match self {
			Comparator::Eq => "eq",
			Comparator::Ne => "ne",
			Comparator::Gt => "gt",
			Comparator::Ge => "ge",
			Comparator::Lt => "lt",
			Comparator::Le => "le",
			Comparator::Contains => "contains",
		}
	}

	/// Applies `lhs <op> rhs`.
	///
	/// Returns `None` if `lhs`'s kind does not support this comparator.
	/// Supported but incomparable operands (`"a" < 1`) are `Some(false)`.
	pub fn apply(&self, lhs: &Value, rhs: &Value) -> Option<bool> {
		match self {
			Comparator::Eq => Some(lhs == rhs),
			Comparator::Ne => Some(lhs != rhs),
			Comparator::Gt => ordered(lhs, rhs, Ordering::is_gt),
			Comparator::Ge => ordered(lhs, rhs, Ordering::is_ge),
			Comparator::Lt => ordered(lhs, rhs, Ordering::is_lt),
			Comparator::Le => ordered(lhs, rhs, Ordering::is_le),
			Comparator::Contains => lhs.contains(rhs),
		}
	}
}

impl fmt::Display for Comparator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

fn ordered(lhs: &Value, rhs: &Value, accept: fn(Ordering) -> bool) -> Option<bool> {
	if !lhs.is_orderable() {
		return None;
	}
	Some(lhs.partial_cmp(rhs).is_some_and(accept))
}

/// `needle in haystack`.
fn membership(needle: &Value, haystack: &Value) -> Result<bool> {
	haystack
		.contains(needle)
		.ok_or_else(|| AuthzError::comparator_not_found(MEMBERSHIP, haystack.type_name()))
}

/// Checks `candidate` against one obligation.
///
/// # Errors
///
/// - [`AuthzError::PathNotFound`] if a leading segment is missing.
/// - [`AuthzError::ComparatorNotFound`] if the final segment is neither a
///   truthy attribute, `in`, nor a comparator supported by `L`.
pub fn satisfies(candidate: &Value, obligation: &Obligation) -> Result<bool> {
	let (leading, last) = obligation.path().split_last();
	let lhs = path::traverse(candidate, leading)?;
	let rhs = obligation.value();

	if let Some(attr) = lhs.attribute(last) {
		if attr.is_truthy() {
			trace!(path = %obligation.path(), "comparing attribute for equality");
			return Ok(attr == *rhs);
		}
	}

	if last == MEMBERSHIP {
		return membership(&lhs, rhs);
	}

	let comparator = Comparator::from_lookup(last)
		.ok_or_else(|| AuthzError::comparator_not_found(last, lhs.type_name()))?;
	trace!(path = %obligation.path(), comparator = %comparator, "applying comparator");
	comparator
		.apply(&lhs, rhs)
		.ok_or_else(|| AuthzError::comparator_not_found(last, lhs.type_name()))
}
