// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Collection filtering for `read_list`.
//!
//! The engine hands the normalized `retrieve` obligations to a
//! [`CollectionFilter`] as field constraints. Hosts with a query layer
//! translate them into a query; [`InMemoryFilter`] evaluates them directly
//! over the candidates.

use async_trait::async_trait;
use tracing::trace;

use crate::comparator::{Comparator, MEMBERSHIP};
use crate::error::{AuthzError, Result};
use crate::normalize::Obligation;
use crate::value::Value;

/// Returns the subset of a collection matching every constraint.
#[async_trait]
pub trait CollectionFilter: Send + Sync {
	/// Filters `collection` by `constraints`, preserving order.
	async fn filter(&self, collection: Vec<Value>, constraints: &[Obligation])
		-> Result<Vec<Value>>;
}

/// ORM-style filter over in-memory values.
///
/// Each constraint path is walked attribute by attribute, invoking deferred
/// members. When the final segment is not an attribute but names a lookup
/// (`in`, `gte`, `contains`, ...) that lookup is applied; otherwise the value
/// reached must equal the constraint value. Unlike the detail checks, a falsy
/// attribute is compared like any other.
#[derive(Debug, Clone, Copy, Default)]
pub struct InMemoryFilter;

impl InMemoryFilter {
	pub fn new() -> Self {
		Self
	}

	/// Whether `candidate` matches one constraint.
	pub fn matches(&self, candidate: &Value, constraint: &Obligation) -> Result<bool> {
		let segments = constraint.path().segments();
		let expected = constraint.value();
		let mut current = candidate.clone();

		for (index, segment) in segments.iter().enumerate() {
			if let Some(member) = current.attribute(segment) {
				current = member.force();
				continue;
			}
			if index + 1 != segments.len() {
				return Err(AuthzError::path_not_found(segment, current.type_name()));
			}
			return apply_lookup(segment, &current, expected);
		}

		Ok(current == *expected)
	}
}

fn apply_lookup(lookup: &str, current: &Value, expected: &Value) -> Result<bool> {
	if lookup == MEMBERSHIP {
		return expected
			.contains(current)
			.ok_or_else(|| AuthzError::comparator_not_found(MEMBERSHIP, expected.type_name()));
	}
	let comparator = Comparator::from_lookup(lookup)
		.ok_or_else(|| AuthzError::path_not_found(lookup, current.type_name()))?;
	comparator
		.apply(current, expected)
		.ok_or_else(|| AuthzError::comparator_not_found(lookup, current.type_name()))
}

#[async_trait]
impl CollectionFilter for InMemoryFilter {
	async fn filter(
		&self,
		collection: Vec<Value>,
		constraints: &[Obligation],
	) -> Result<Vec<Value>> {
		let total = collection.len();
		let mut kept = Vec::with_capacity(total);
		for candidate in collection {
			let mut matched = true;
			for constraint in constraints {
				if !self.matches(&candidate, constraint)? {
					matched = false;
					break;
				}
			}
			if matched {
				kept.push(candidate);
			}
		}
		trace!(total, kept = kept.len(), "filtered collection in memory");
		Ok(kept)
	}
}
